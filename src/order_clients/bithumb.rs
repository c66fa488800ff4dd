//! Bithumb REST order client (`https://api.bithumb.com`, v2 API).

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::bithumb_signature;
use crate::config::ExchangeConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{OrderRequest, OrderResult, OrderType, Side};
use crate::order_clients::{http_client, normalize_status, OrderClient};
use crate::rate_limit::{ApiClass, RateLimiterRegistry};
use crate::venue::Venue;

pub struct BithumbOrderClient {
    config: ExchangeConfig,
    rate_limiter: Arc<RateLimiterRegistry>,
    http: reqwest::Client,
}

impl BithumbOrderClient {
    pub fn new(config: ExchangeConfig, rate_limiter: Arc<RateLimiterRegistry>) -> Self {
        Self {
            config,
            rate_limiter,
            http: http_client(),
        }
    }

    async fn signed_call(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        params: &[(String, String)],
    ) -> CoreResult<reqwest::Response> {
        let param_string = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let (signature, nonce) = bithumb_signature(&self.config.api_secret, endpoint, &param_string)?;
        let url = format!("{}{endpoint}", self.config.rest_url);

        self.http
            .request(method, &url)
            .header("Api-Key", &self.config.api_key)
            .header("Api-Sign", signature)
            .header("Api-Nonce", nonce)
            .query(params)
            .send()
            .await
            .map_err(CoreError::from)
    }
}

#[async_trait]
impl OrderClient for BithumbOrderClient {
    async fn place_order(&self, request: &OrderRequest) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Bithumb, ApiClass::Order)?;
        let symbol = crate::order_clients::symbol_master::native_symbol("XRP", Venue::Bithumb);

        let mut params = vec![
            ("market".to_string(), symbol),
            ("side".to_string(), side_param(request.side).to_string()),
            ("ord_type".to_string(), order_type_param(request.order_type).to_string()),
            ("volume".to_string(), request.quantity.to_string()),
        ];
        if request.order_type == OrderType::Limit {
            params.push(("price".to_string(), request.price.to_string()));
        }

        let resp = self
            .signed_call(reqwest::Method::POST, "/v1/orders", &params)
            .await?;
        decode_response(resp).await
    }

    async fn cancel_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Bithumb, ApiClass::Order)?;
        let params = vec![("uuid".to_string(), exchange_order_id.to_string())];
        let resp = self
            .signed_call(reqwest::Method::DELETE, "/v1/order", &params)
            .await?;
        decode_response(resp).await
    }

    async fn get_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult> {
        self.rate_limiter.try_acquire(Venue::Bithumb, ApiClass::Query)?;
        let params = vec![("uuid".to_string(), exchange_order_id.to_string())];
        let resp = self
            .signed_call(reqwest::Method::GET, "/v1/order", &params)
            .await?;
        decode_response(resp).await
    }

    async fn get_balance(&self, currency: &str) -> CoreResult<f64> {
        self.rate_limiter.try_acquire(Venue::Bithumb, ApiClass::Query)?;
        let resp = self
            .signed_call(reqwest::Method::GET, "/v1/accounts", &[])
            .await?;
        let accounts: Vec<BithumbAccount> = resp.json().await.map_err(CoreError::from)?;
        Ok(accounts
            .into_iter()
            .find(|a| a.currency.eq_ignore_ascii_case(currency))
            .and_then(|a| a.balance.parse().ok())
            .unwrap_or(0.0))
    }
}

fn side_param(side: Side) -> &'static str {
    match side {
        Side::Buy => "bid",
        Side::Sell => "ask",
    }
}

fn order_type_param(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
    }
}

#[derive(serde::Deserialize)]
struct BithumbOrderResponse {
    uuid: String,
    state: String,
    #[serde(default)]
    executed_volume: String,
    #[serde(default)]
    price: Option<String>,
}

#[derive(serde::Deserialize)]
struct BithumbAccount {
    currency: String,
    balance: String,
}

async fn decode_response(resp: reqwest::Response) -> CoreResult<OrderResult> {
    let status_ok = resp.status().is_success();
    let body: serde_json::Value = resp.json().await.map_err(CoreError::from)?;
    if !status_ok {
        let message = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("bithumb order call failed")
            .to_string();
        return Ok(OrderResult::failed(message));
    }

    let parsed: BithumbOrderResponse =
        serde_json::from_value(body).map_err(|e| CoreError::parse_error(e.to_string()))?;

    Ok(OrderResult {
        exchange_order_id: parsed.uuid,
        status: normalize_status(&parsed.state),
        filled_quantity: parsed.executed_volume.parse().unwrap_or(0.0),
        avg_fill_price: parsed.price.and_then(|p| p.parse().ok()).unwrap_or(0.0),
        commission: 0.0,
        timestamp_us: 0,
        message: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_and_type_params_match_bithumb_vocabulary() {
        assert_eq!(side_param(Side::Buy), "bid");
        assert_eq!(order_type_param(OrderType::Market), "market");
    }
}
