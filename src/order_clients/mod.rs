//! Per-venue REST order clients.
//!
//! Each client implements [`OrderClient`] and normalizes the venue's raw
//! status strings into the shared [`OrderStatus`] table (spec.md §4.5).
//! Every call enforces the venue's rate limiter before the transport call,
//! never after — a refused acquire is a `RateLimited` error, not a silent
//! delay (spec.md §4.7).

pub mod binance;
pub mod bithumb;
pub mod mexc;
pub mod symbol_master;
pub mod upbit;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::model::{OrderRequest, OrderResult, OrderStatus};

#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> CoreResult<OrderResult>;
    async fn cancel_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult>;
    async fn get_order(&self, exchange_order_id: &str) -> CoreResult<OrderResult>;
    async fn get_balance(&self, currency: &str) -> CoreResult<f64>;
}

/// Status normalization table shared by every venue client (spec.md §4.5).
pub fn normalize_status(raw: &str) -> OrderStatus {
    match raw {
        "NEW" | "Pending" | "wait" | "watch" => OrderStatus::Open,
        "FILLED" | "done" => OrderStatus::Filled,
        "PARTIALLY_FILLED" | "trade" => OrderStatus::PartiallyFilled,
        "CANCELED" | "CANCELLED" | "cancel" => OrderStatus::Canceled,
        _ => OrderStatus::Failed,
    }
}

const DEFAULT_TRANSPORT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TRANSPORT_TIMEOUT)
        .build()
        .expect("building the shared reqwest client cannot fail with no invalid options set")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_every_documented_raw_status() {
        assert_eq!(normalize_status("NEW"), OrderStatus::Open);
        assert_eq!(normalize_status("wait"), OrderStatus::Open);
        assert_eq!(normalize_status("FILLED"), OrderStatus::Filled);
        assert_eq!(normalize_status("done"), OrderStatus::Filled);
        assert_eq!(normalize_status("PARTIALLY_FILLED"), OrderStatus::PartiallyFilled);
        assert_eq!(normalize_status("trade"), OrderStatus::PartiallyFilled);
        assert_eq!(normalize_status("CANCELED"), OrderStatus::Canceled);
        assert_eq!(normalize_status("cancel"), OrderStatus::Canceled);
        assert_eq!(normalize_status("REJECTED"), OrderStatus::Failed);
        assert_eq!(normalize_status("anything else"), OrderStatus::Failed);
    }
}
