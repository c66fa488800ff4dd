//! Recovery planning and execution for a partial-fill dual-leg outcome.
//!
//! A partial fill leaves the book one-sided: exactly one leg holds or owes
//! inventory. `RecoveryManager` turns that into a single remedial market
//! order, retries it up to a bound, and escalates to the operator (via the
//! optional callback) if every attempt fails (spec.md §4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::model::{
    DualOrderRequest, DualOrderResult, OrderRequest, OrderResult, RecoveryAction, RecoveryPlan,
    RecoveryResult, Side,
};
use crate::order_clients::OrderClient;
use crate::venue::Venue;

type RecoveryCallback = Box<dyn Fn(&RecoveryResult) + Send + Sync>;

pub struct RecoveryManager {
    clients: HashMap<Venue, Arc<dyn OrderClient>>,
    max_retries: u32,
    retry_delay: Duration,
    dry_run: bool,
    on_recovery: Option<RecoveryCallback>,
    attempts: AtomicU64,
    successes: AtomicU64,
    manual_interventions: AtomicU32,
}

impl RecoveryManager {
    pub fn new(
        clients: HashMap<Venue, Arc<dyn OrderClient>>,
        max_retries: u32,
        retry_delay: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            clients,
            max_retries,
            retry_delay,
            dry_run,
            on_recovery: None,
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            manual_interventions: AtomicU32::new(0),
        }
    }

    pub fn with_callback(mut self, callback: RecoveryCallback) -> Self {
        self.on_recovery = Some(callback);
        self
    }

    /// Builds the remedial order for a partial-fill outcome. Returns
    /// `RecoveryPlan::none` for the two terminal (non-partial) quadrants.
    pub fn plan(&self, request: &DualOrderRequest, result: &DualOrderResult) -> RecoveryPlan {
        let buy_ok = result.buy_result.is_fill_success();
        let sell_ok = result.sell_result.is_fill_success();

        match (buy_ok, sell_ok) {
            (true, true) | (false, false) => RecoveryPlan::none("no partial fill to recover"),
            (true, false) => RecoveryPlan {
                action: RecoveryAction::SellBought,
                order: Some(OrderRequest::market(
                    request.buy_leg.venue,
                    request.buy_leg.symbol.clone(),
                    Side::Sell,
                    result.buy_result.filled_quantity,
                )),
                reason: "buy leg filled, sell leg failed".to_string(),
                max_retries: self.max_retries,
                retry_delay_ms: self.retry_delay.as_millis() as u64,
            },
            (false, true) => RecoveryPlan {
                action: RecoveryAction::BuySold,
                order: Some(OrderRequest::market(
                    request.sell_leg.venue,
                    request.sell_leg.symbol.clone(),
                    Side::Buy,
                    result.sell_result.filled_quantity,
                )),
                reason: "sell leg filled, buy leg failed".to_string(),
                max_retries: self.max_retries,
                retry_delay_ms: self.retry_delay.as_millis() as u64,
            },
        }
    }

    /// Executes `plan`, retrying up to `max_retries` times. Exhaustion
    /// fires the callback with `action = ManualIntervention`.
    pub async fn execute(&self, plan: &RecoveryPlan) -> RecoveryResult {
        if plan.action == RecoveryAction::None {
            let result = RecoveryResult {
                action: RecoveryAction::None,
                order_result: None,
                success: true,
                retry_count: 0,
            };
            return result;
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        let order = plan.order.as_ref().expect("non-None action always carries an order");

        let mut last_result = None;
        let mut retry_count = 0;
        for attempt in 0..=self.max_retries {
            let outcome = self.submit(order).await;
            let success = outcome.is_fill_success();
            last_result = Some(outcome);
            if success {
                self.successes.fetch_add(1, Ordering::Relaxed);
                let result = RecoveryResult {
                    action: plan.action,
                    order_result: last_result,
                    success: true,
                    retry_count: attempt,
                };
                self.notify(&result);
                return result;
            }
            retry_count = attempt;
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        self.manual_interventions.fetch_add(1, Ordering::Relaxed);
        let result = RecoveryResult {
            action: RecoveryAction::ManualIntervention,
            order_result: last_result,
            success: false,
            retry_count,
        };
        self.notify(&result);
        result
    }

    async fn submit(&self, order: &OrderRequest) -> OrderResult {
        if self.dry_run {
            return OrderResult {
                exchange_order_id: format!("dryrun-recovery-{}", uuid::Uuid::new_v4()),
                status: crate::model::OrderStatus::Filled,
                filled_quantity: order.quantity,
                avg_fill_price: order.price,
                commission: 0.0,
                timestamp_us: 0,
                message: "dry run".to_string(),
            };
        }
        match self.clients.get(&order.venue) {
            Some(client) => client
                .place_order(order)
                .await
                .unwrap_or_else(|e| OrderResult::failed(e.to_string())),
            None => OrderResult::failed(format!("no order client configured for {}", order.venue)),
        }
    }

    fn notify(&self, result: &RecoveryResult) {
        if let Some(cb) = &self.on_recovery {
            cb(result);
        }
    }

    pub fn stats(&self) -> RecoveryStats {
        RecoveryStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            manual_interventions: self.manual_interventions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryStats {
    pub attempts: u64,
    pub successes: u64,
    pub manual_interventions: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderStatus, OrderType};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockClient {
        responses: Mutex<Vec<OrderResult>>,
    }

    #[async_trait]
    impl OrderClient for MockClient {
        async fn place_order(&self, request: &OrderRequest) -> crate::error::CoreResult<OrderResult> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(OrderResult::failed("exhausted"));
            }
            let mut result = responses.remove(0);
            result.filled_quantity = request.quantity;
            Ok(result)
        }
        async fn cancel_order(&self, _: &str) -> crate::error::CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_order(&self, _: &str) -> crate::error::CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_balance(&self, _: &str) -> crate::error::CoreResult<f64> {
            unimplemented!()
        }
    }

    fn dual_request() -> DualOrderRequest {
        DualOrderRequest::new(
            OrderRequest::market(Venue::Binance, "XRP", Side::Buy, 100.0),
            OrderRequest::market(Venue::Upbit, "XRP", Side::Sell, 100.0),
            3.0,
        )
    }

    fn filled(qty: f64) -> OrderResult {
        OrderResult {
            status: OrderStatus::Filled,
            filled_quantity: qty,
            ..OrderResult::failed("")
        }
    }

    #[tokio::test]
    async fn buy_success_sell_fail_plans_sell_bought() {
        let mgr = RecoveryManager::new(HashMap::new(), 2, Duration::from_millis(1), true);
        let req = dual_request();
        let result = DualOrderResult {
            buy_result: filled(100.0),
            sell_result: OrderResult::failed("timeout"),
            start_timestamp_us: 0,
            end_timestamp_us: 0,
        };
        let plan = mgr.plan(&req, &result);
        assert_eq!(plan.action, RecoveryAction::SellBought);
        let order = plan.order.unwrap();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.venue, Venue::Binance);
        assert_eq!(order.quantity, 100.0);
    }

    #[tokio::test]
    async fn sell_success_buy_fail_plans_buy_sold() {
        let mgr = RecoveryManager::new(HashMap::new(), 2, Duration::from_millis(1), true);
        let req = dual_request();
        let result = DualOrderResult {
            buy_result: OrderResult::failed("timeout"),
            sell_result: filled(100.0),
            start_timestamp_us: 0,
            end_timestamp_us: 0,
        };
        let plan = mgr.plan(&req, &result);
        assert_eq!(plan.action, RecoveryAction::BuySold);
        let order = plan.order.unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.venue, Venue::Upbit);
    }

    #[tokio::test]
    async fn no_partial_fill_plans_none() {
        let mgr = RecoveryManager::new(HashMap::new(), 2, Duration::from_millis(1), true);
        let req = dual_request();
        let result = DualOrderResult {
            buy_result: filled(100.0),
            sell_result: filled(100.0),
            start_timestamp_us: 0,
            end_timestamp_us: 0,
        };
        let plan = mgr.plan(&req, &result);
        assert_eq!(plan.action, RecoveryAction::None);
    }

    #[tokio::test]
    async fn retries_until_max_then_succeeds_reports_retry_count() {
        let mut clients: HashMap<Venue, Arc<dyn OrderClient>> = HashMap::new();
        clients.insert(
            Venue::Binance,
            Arc::new(MockClient {
                responses: Mutex::new(vec![
                    OrderResult::failed("rejected"),
                    OrderResult::failed("rejected"),
                    filled(0.0),
                ]),
            }),
        );
        let mgr = RecoveryManager::new(clients, 5, Duration::from_millis(1), false);
        let plan = RecoveryPlan {
            action: RecoveryAction::SellBought,
            order: Some(OrderRequest::market(Venue::Binance, "XRP", Side::Sell, 100.0)),
            reason: "test".to_string(),
            max_retries: 5,
            retry_delay_ms: 1,
        };
        let result = mgr.execute(&plan).await;
        assert!(result.success);
        assert_eq!(result.retry_count, 2);
        assert_eq!(mgr.stats().successes, 1);
    }

    #[tokio::test]
    async fn exhausting_retries_triggers_manual_intervention() {
        let mut clients: HashMap<Venue, Arc<dyn OrderClient>> = HashMap::new();
        clients.insert(
            Venue::Binance,
            Arc::new(MockClient {
                responses: Mutex::new(vec![
                    OrderResult::failed("rejected"),
                    OrderResult::failed("rejected"),
                ]),
            }),
        );
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let f2 = fired.clone();
        let mgr = RecoveryManager::new(clients, 1, Duration::from_millis(1), false)
            .with_callback(Box::new(move |r| {
                if r.action == RecoveryAction::ManualIntervention {
                    f2.store(true, Ordering::Relaxed);
                }
            }));
        let plan = RecoveryPlan {
            action: RecoveryAction::SellBought,
            order: Some(OrderRequest::market(Venue::Binance, "XRP", Side::Sell, 100.0)),
            reason: "test".to_string(),
            max_retries: 1,
            retry_delay_ms: 1,
        };
        let result = mgr.execute(&plan).await;
        assert!(!result.success);
        assert_eq!(result.action, RecoveryAction::ManualIntervention);
        assert!(fired.load(Ordering::Relaxed));
        assert_eq!(mgr.stats().manual_interventions, 1);
    }
}
