//! Dual-leg executor: submits both legs of a pair trade in parallel and
//! drives recovery on a partial fill (spec.md §4.4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CoreError;
use crate::model::{DualOrderRequest, DualOrderResult, OrderRequest, OrderResult};
use crate::order_clients::OrderClient;
use crate::recovery::RecoveryManager;
use crate::venue::Venue;

#[derive(Debug, Default)]
pub struct ExecutorStatsSnapshot {
    pub total_requests: u64,
    pub both_success: u64,
    pub partial_success: u64,
    pub total_failures: u64,
    pub cumulative_latency_us: u64,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
}

#[derive(Default)]
struct Stats {
    total_requests: AtomicU64,
    both_success: AtomicU64,
    partial_success: AtomicU64,
    total_failures: AtomicU64,
    cumulative_latency_us: AtomicU64,
}

pub struct DualLegExecutor {
    clients: HashMap<Venue, Arc<dyn OrderClient>>,
    recovery: Arc<RecoveryManager>,
    dry_run: bool,
    order_timeout: Duration,
    stats: Stats,
}

impl DualLegExecutor {
    pub fn new(
        clients: HashMap<Venue, Arc<dyn OrderClient>>,
        recovery: Arc<RecoveryManager>,
        dry_run: bool,
        order_timeout: Duration,
    ) -> Self {
        Self {
            clients,
            recovery,
            dry_run,
            order_timeout,
            stats: Stats::default(),
        }
    }

    pub async fn execute(&self, request: DualOrderRequest) -> DualOrderResult {
        self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
        let start = now_us();

        let (buy_result, sell_result) = tokio::join!(
            self.submit_leg(&request.buy_leg, request.buy_leg_delay_ms),
            self.submit_leg(&request.sell_leg, request.sell_leg_delay_ms),
        );

        let end = now_us();
        let result = DualOrderResult {
            buy_result,
            sell_result,
            start_timestamp_us: start,
            end_timestamp_us: end,
        };

        self.stats
            .cumulative_latency_us
            .fetch_add((end - start).max(0) as u64, Ordering::Relaxed);

        if result.both_success() {
            self.stats.both_success.fetch_add(1, Ordering::Relaxed);
        } else if result.both_failed() {
            self.stats.total_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.partial_success.fetch_add(1, Ordering::Relaxed);
            let plan = self.recovery.plan(&request, &result);
            // `plan` is `None` only for the two terminal quadrants already
            // excluded by the `else` branch above, so this always recovers.
            self.recovery.execute(&plan).await;
        }

        result
    }

    async fn submit_leg(&self, order: &OrderRequest, delay_ms: u64) -> OrderResult {
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        if self.dry_run {
            return OrderResult {
                exchange_order_id: format!("dryrun-{}", uuid::Uuid::new_v4()),
                status: crate::model::OrderStatus::Filled,
                filled_quantity: order.quantity,
                avg_fill_price: order.price,
                commission: 0.0,
                timestamp_us: now_us(),
                message: "dry run".to_string(),
            };
        }

        let client = match self.clients.get(&order.venue) {
            Some(c) => c,
            None => {
                return OrderResult::failed(
                    CoreError::invalid_request(format!("no order client configured for {}", order.venue))
                        .to_string(),
                )
            }
        };

        match tokio::time::timeout(self.order_timeout, client.place_order(order)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => OrderResult::failed(e.to_string()),
            Err(_) => OrderResult::failed("order submission timed out"),
        }
    }

    pub fn stats(&self) -> ExecutorStatsSnapshot {
        let recovery = self.recovery.stats();
        ExecutorStatsSnapshot {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            both_success: self.stats.both_success.load(Ordering::Relaxed),
            partial_success: self.stats.partial_success.load(Ordering::Relaxed),
            total_failures: self.stats.total_failures.load(Ordering::Relaxed),
            cumulative_latency_us: self.stats.cumulative_latency_us.load(Ordering::Relaxed),
            recovery_attempts: recovery.attempts,
            recovery_successes: recovery.successes,
        }
    }
}

fn now_us() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
