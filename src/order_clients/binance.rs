//! Binance REST order client (`https://api.binance.com`).

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::binance_signature;
use crate::config::ExchangeConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{OrderRequest, OrderResult, OrderType, Side};
use crate::order_clients::{http_client, normalize_status, OrderClient};
use crate::rate_limit::{ApiClass, RateLimiterRegistry};
use crate::venue::Venue;

pub struct BinanceOrderClient {
    config: ExchangeConfig,
    rate_limiter: Arc<RateLimiterRegistry>,
    http: reqwest::Client,
}

impl BinanceOrderClient {
    pub fn new(config: ExchangeConfig, rate_limiter: Arc<RateLimiterRegistry>) -> Self {
        Self {
            config,
            rate_limiter,
            http: http_client(),
        }
    }

    fn signed_query(&self, mut params: Vec<(String, String)>) -> CoreResult<Vec<(String, String)>> {
        params.push(("timestamp".to_string(), now_ms().to_string()));
        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let signature = binance_signature(&self.config.api_secret, &query_string)?;
        params.push(("signature".to_string(), signature));
        Ok(params)
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl OrderClient for BinanceOrderClient {
    async fn place_order(&self, request: &OrderRequest) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Binance, ApiClass::Order)?;
        let symbol = crate::order_clients::symbol_master::native_symbol("XRP", Venue::Binance);

        let mut params = vec![
            ("symbol".to_string(), symbol),
            ("side".to_string(), side_param(request.side).to_string()),
            ("type".to_string(), order_type_param(request.order_type).to_string()),
            ("quantity".to_string(), request.quantity.to_string()),
        ];
        if request.order_type == OrderType::Limit {
            params.push(("price".to_string(), request.price.to_string()));
            params.push(("timeInForce".to_string(), "GTC".to_string()));
        }
        let params = self.signed_query(params)?;

        let url = format!("{}/api/v3/order", self.config.rest_url);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&params)
            .send()
            .await
            .map_err(CoreError::from)?;

        decode_response(resp).await
    }

    async fn cancel_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Binance, ApiClass::Order)?;
        let symbol = crate::order_clients::symbol_master::native_symbol("XRP", Venue::Binance);
        let params = self.signed_query(vec![
            ("symbol".to_string(), symbol),
            ("orderId".to_string(), exchange_order_id.to_string()),
        ])?;
        let url = format!("{}/api/v3/order", self.config.rest_url);
        let resp = self
            .http
            .delete(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&params)
            .send()
            .await
            .map_err(CoreError::from)?;
        decode_response(resp).await
    }

    async fn get_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Binance, ApiClass::Query)?;
        let symbol = crate::order_clients::symbol_master::native_symbol("XRP", Venue::Binance);
        let params = self.signed_query(vec![
            ("symbol".to_string(), symbol),
            ("orderId".to_string(), exchange_order_id.to_string()),
        ])?;
        let url = format!("{}/api/v3/order", self.config.rest_url);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&params)
            .send()
            .await
            .map_err(CoreError::from)?;
        decode_response(resp).await
    }

    async fn get_balance(&self, currency: &str) -> CoreResult<f64> {
        self.rate_limiter.try_acquire(Venue::Binance, ApiClass::Query)?;
        let params = self.signed_query(vec![])?;
        let url = format!("{}/api/v3/account", self.config.rest_url);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&params)
            .send()
            .await
            .map_err(CoreError::from)?;

        let account: BinanceAccount = resp.json().await.map_err(CoreError::from)?;
        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(currency))
            .and_then(|b| b.free.parse().ok())
            .unwrap_or(0.0))
    }
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "BUY",
        Side::Sell => "SELL",
    }
}

fn order_type_param(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "MARKET",
        OrderType::Limit => "LIMIT",
    }
}

#[derive(serde::Deserialize)]
struct BinanceOrderResponse {
    #[serde(rename = "orderId")]
    order_id: i64,
    status: String,
    #[serde(rename = "executedQty", default)]
    executed_qty: String,
    #[serde(default)]
    price: String,
}

#[derive(serde::Deserialize)]
struct BinanceAccount {
    balances: Vec<BinanceBalance>,
}

#[derive(serde::Deserialize)]
struct BinanceBalance {
    asset: String,
    free: String,
}

async fn decode_response(resp: reqwest::Response) -> CoreResult<OrderResult> {
    let status_ok = resp.status().is_success();
    let body: serde_json::Value = resp.json().await.map_err(CoreError::from)?;
    if !status_ok {
        let message = body
            .get("msg")
            .and_then(|m| m.as_str())
            .unwrap_or("binance order call failed")
            .to_string();
        return Ok(OrderResult::failed(message));
    }

    let parsed: BinanceOrderResponse =
        serde_json::from_value(body).map_err(|e| CoreError::parse_error(e.to_string()))?;

    Ok(OrderResult {
        exchange_order_id: parsed.order_id.to_string(),
        status: normalize_status(&parsed.status),
        filled_quantity: parsed.executed_qty.parse().unwrap_or(0.0),
        avg_fill_price: parsed.price.parse().unwrap_or(0.0),
        commission: 0.0,
        timestamp_us: 0,
        message: String::new(),
    })
}
