//! Unified-to-venue-native symbol mapping (spec.md §4.5).
//!
//! A unified short symbol like `XRP` maps to a different wire form per
//! venue. This table is static for the coin this core trades; a general
//! multi-asset mapping (driven by `config::SymbolMapping`) is exposed too,
//! for completeness, but XRP's mapping is hardcoded as the common case.

use std::collections::HashMap;

use crate::config::SymbolMapping;
use crate::venue::Venue;

pub fn native_symbol(unified: &str, venue: Venue) -> String {
    if unified.eq_ignore_ascii_case("XRP") {
        return match venue {
            Venue::Upbit => "KRW-XRP".to_string(),
            Venue::Bithumb => "KRW-XRP".to_string(),
            Venue::Binance => "XRPUSDT".to_string(),
            Venue::Mexc => "XRPUSDT".to_string(),
        };
    }
    unified.to_string()
}

/// Lookup table built from the configured `[[symbols]]` entries, for assets
/// beyond the hardcoded XRP mapping above.
pub struct SymbolMaster {
    table: HashMap<(String, Venue), String>,
}

impl SymbolMaster {
    pub fn from_config(mappings: &[SymbolMapping]) -> Self {
        let mut table = HashMap::new();
        for mapping in mappings {
            for (venue_name, native) in &mapping.per_venue {
                if let Some(venue) = Venue::from_str_loose(venue_name) {
                    table.insert((mapping.unified.clone(), venue), native.clone());
                }
            }
        }
        Self { table }
    }

    /// Falls back to [`native_symbol`] if the unified symbol has no
    /// explicit configured mapping.
    pub fn resolve(&self, unified: &str, venue: Venue) -> String {
        self.table
            .get(&(unified.to_string(), venue))
            .cloned()
            .unwrap_or_else(|| native_symbol(unified, venue))
    }
}
