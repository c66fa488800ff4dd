//! Process configuration.
//!
//! Loaded once at startup from the path in `$XRPCORE_CONFIG` (default
//! `config.toml`) and passed by reference into the constructors of the
//! venue clients, strategy, and executor — no process-wide singleton
//! accessor (spec.md §9, "Replacing the singleton configuration with
//! explicit passing"). Hot reload, where needed, is a copy-and-swap of this
//! struct behind an `ArcSwap` under a short writer lock.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::venue::Venue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub ws_url: String,
    pub rest_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub per_second_limit: u32,
    pub per_minute_limit: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub min_entry_premium_pct: f64,
    pub max_entry_premium_pct: f64,
    pub stop_loss_pct: f64,
    pub min_order_quantity: f64,
    pub max_order_quantity: f64,
    pub slippage_cap_pct: f64,
    pub order_timeout_secs: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_entry_premium_pct: 1.0,
            max_entry_premium_pct: 15.0,
            stop_loss_pct: 2.0,
            min_order_quantity: 10.0,
            max_order_quantity: 5_000.0,
            slippage_cap_pct: 0.5,
            order_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub daily_loss_limit_krw: f64,
    pub max_transfer_amount: f64,
    pub max_concurrent_orders: u32,
    pub kill_switch: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_krw: 1_000_000.0,
            max_transfer_amount: 10_000.0,
            max_concurrent_orders: 4,
            kill_switch: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Physical core index to pin the strategy thread to (spec.md:
    /// "strategy and executor -> dedicated physical cores with the
    /// highest practical priority"). Optional; pinning is skipped when
    /// unset or when the index is out of range for the host.
    #[serde(default)]
    pub strategy_core: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9100,
            strategy_core: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlertConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMapping {
    pub unified: String,
    pub per_venue: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBookEntry {
    pub venue: Venue,
    pub address: String,
    pub destination_tag: Option<String>,
    pub whitelisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub exchanges: HashMap<String, ExchangeConfig>,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolMapping>,
    #[serde(default)]
    pub address_book: Vec<AddressBookEntry>,
}

impl Config {
    pub fn load_from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CoreError::config_error(format!("reading {}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> CoreResult<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CoreResult<()> {
        for venue in ["upbit", "bithumb", "binance", "mexc"] {
            if !self.exchanges.contains_key(venue) {
                return Err(CoreError::config_error(format!(
                    "missing exchange config section for {venue}"
                )));
            }
        }
        if self.strategy.min_entry_premium_pct >= self.strategy.max_entry_premium_pct {
            return Err(CoreError::config_error(
                "strategy.min_entry_premium_pct must be < max_entry_premium_pct",
            ));
        }
        Ok(())
    }

    /// Load the path named by `$XRPCORE_CONFIG`, defaulting to
    /// `config.toml` in the working directory.
    pub fn load_from_env() -> CoreResult<Self> {
        let path = std::env::var("XRPCORE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
[exchanges.upbit]
ws_url = "wss://api.upbit.com/websocket/v1"
rest_url = "https://api.upbit.com"
api_key = "k"
api_secret = "s"
per_second_limit = 8
per_minute_limit = 200
enabled = true

[exchanges.bithumb]
ws_url = "wss://ws-api.bithumb.com/websocket/v1"
rest_url = "https://api.bithumb.com"
api_key = "k"
api_secret = "s"
per_second_limit = 10
per_minute_limit = 200
enabled = true

[exchanges.binance]
ws_url = "wss://stream.binance.com:9443"
rest_url = "https://api.binance.com"
api_key = "k"
api_secret = "s"
per_second_limit = 20
per_minute_limit = 1200
enabled = true

[exchanges.mexc]
ws_url = "wss://wbs.mexc.com/ws"
rest_url = "https://api.mexc.com"
api_key = "k"
api_secret = "s"
per_second_limit = 20
per_minute_limit = 1200
enabled = true

[strategy]
min_entry_premium_pct = 1.0
max_entry_premium_pct = 15.0
stop_loss_pct = 2.0
min_order_quantity = 10.0
max_order_quantity = 5000.0
slippage_cap_pct = 0.5
order_timeout_secs = 3

[risk]
daily_loss_limit_krw = 1000000.0
max_transfer_amount = 10000.0
max_concurrent_orders = 4
kill_switch = false
"#
        .to_string()
    }

    #[test]
    fn parses_a_complete_config() {
        let cfg = Config::parse(&sample_toml()).unwrap();
        assert_eq!(cfg.exchanges.len(), 4);
        assert!(cfg.exchanges["upbit"].enabled);
    }

    #[test]
    fn rejects_missing_exchange_section() {
        let mut text = sample_toml();
        text = text.replace("[exchanges.mexc]", "[exchanges.mexc_renamed]");
        let err = Config::parse(&text).unwrap_err();
        assert!(err.message.contains("mexc"));
    }

    #[test]
    fn rejects_inverted_premium_bounds() {
        let text = sample_toml().replace(
            "min_entry_premium_pct = 1.0",
            "min_entry_premium_pct = 99.0",
        );
        assert!(Config::parse(&text).is_err());
    }
}
