//! Risk gates consulted before every dual-leg submission and transfer
//! (spec.md §4.4, §4.6): a daily KRW loss limit, a max transfer amount, a
//! cap on concurrent open orders, and an operator kill-switch.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use crate::config::RiskConfig;

/// PnL is tracked in minor KRW units (won * 100) so the running total stays
/// an exact integer under concurrent `fetch_add`.
const KRW_SCALE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskRejection {
    KillSwitchActive,
    DailyLossLimitExceeded,
    TooManyConcurrentOrders,
    TransferAmountExceedsLimit,
}

impl std::fmt::Display for RiskRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RiskRejection::KillSwitchActive => "kill switch is active",
            RiskRejection::DailyLossLimitExceeded => "daily loss limit exceeded",
            RiskRejection::TooManyConcurrentOrders => "too many concurrent orders",
            RiskRejection::TransferAmountExceedsLimit => "transfer amount exceeds configured limit",
        };
        write!(f, "{msg}")
    }
}

pub struct RiskGate {
    daily_loss_limit_minor: i64,
    max_transfer_amount: f64,
    max_concurrent_orders: u32,
    kill_switch: AtomicBool,
    daily_pnl_minor: AtomicI64,
    open_orders: AtomicU32,
}

impl RiskGate {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            daily_loss_limit_minor: (config.daily_loss_limit_krw * KRW_SCALE as f64) as i64,
            max_transfer_amount: config.max_transfer_amount,
            max_concurrent_orders: config.max_concurrent_orders,
            kill_switch: AtomicBool::new(config.kill_switch),
            daily_pnl_minor: AtomicI64::new(0),
            open_orders: AtomicU32::new(0),
        }
    }

    /// Consulted immediately before a dual-leg submission. Does not itself
    /// reserve a concurrency slot; pair with `order_opened`/`order_closed`.
    pub fn check_order_gate(&self) -> Result<(), RiskRejection> {
        if self.kill_switch.load(Ordering::Acquire) {
            return Err(RiskRejection::KillSwitchActive);
        }
        if self.daily_pnl_minor.load(Ordering::Relaxed) <= -self.daily_loss_limit_minor {
            return Err(RiskRejection::DailyLossLimitExceeded);
        }
        if self.open_orders.load(Ordering::Relaxed) >= self.max_concurrent_orders {
            return Err(RiskRejection::TooManyConcurrentOrders);
        }
        Ok(())
    }

    pub fn check_transfer_gate(&self, amount: f64) -> Result<(), RiskRejection> {
        if self.kill_switch.load(Ordering::Acquire) {
            return Err(RiskRejection::KillSwitchActive);
        }
        if amount > self.max_transfer_amount {
            return Err(RiskRejection::TransferAmountExceedsLimit);
        }
        Ok(())
    }

    pub fn order_opened(&self) {
        self.open_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn order_closed(&self) {
        self.open_orders.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_pnl(&self, pnl_krw: f64) {
        self.daily_pnl_minor
            .fetch_add((pnl_krw * KRW_SCALE as f64) as i64, Ordering::Relaxed);
    }

    /// Resets the running daily PnL counter; call at venue midnight KST.
    pub fn reset_daily_pnl(&self) {
        self.daily_pnl_minor.store(0, Ordering::Relaxed);
    }

    pub fn trip_kill_switch(&self) {
        self.kill_switch.store(true, Ordering::Release);
    }

    pub fn reset_kill_switch(&self) {
        self.kill_switch.store(false, Ordering::Release);
    }

    pub fn is_kill_switch_active(&self) -> bool {
        self.kill_switch.load(Ordering::Acquire)
    }

    pub fn daily_pnl_krw(&self) -> f64 {
        self.daily_pnl_minor.load(Ordering::Relaxed) as f64 / KRW_SCALE as f64
    }

    pub fn open_order_count(&self) -> u32 {
        self.open_orders.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RiskConfig {
        RiskConfig {
            daily_loss_limit_krw: 1_000_000.0,
            max_transfer_amount: 500.0,
            max_concurrent_orders: 2,
            kill_switch: false,
        }
    }

    #[test]
    fn kill_switch_blocks_both_gates() {
        let gate = RiskGate::new(&config());
        gate.trip_kill_switch();
        assert_eq!(gate.check_order_gate(), Err(RiskRejection::KillSwitchActive));
        assert_eq!(gate.check_transfer_gate(10.0), Err(RiskRejection::KillSwitchActive));
    }

    #[test]
    fn daily_loss_limit_trips_once_exceeded() {
        let gate = RiskGate::new(&config());
        gate.record_pnl(-1_000_001.0);
        assert_eq!(gate.check_order_gate(), Err(RiskRejection::DailyLossLimitExceeded));
    }

    #[test]
    fn profitable_day_never_trips_the_loss_limit() {
        let gate = RiskGate::new(&config());
        gate.record_pnl(50_000.0);
        assert!(gate.check_order_gate().is_ok());
    }

    #[test]
    fn concurrent_order_cap_is_enforced() {
        let gate = RiskGate::new(&config());
        gate.order_opened();
        gate.order_opened();
        assert_eq!(gate.check_order_gate(), Err(RiskRejection::TooManyConcurrentOrders));
        gate.order_closed();
        assert!(gate.check_order_gate().is_ok());
    }

    #[test]
    fn transfer_amount_over_limit_is_rejected() {
        let gate = RiskGate::new(&config());
        assert_eq!(
            gate.check_transfer_gate(501.0),
            Err(RiskRejection::TransferAmountExceedsLimit)
        );
        assert!(gate.check_transfer_gate(500.0).is_ok());
    }

    #[test]
    fn reset_daily_pnl_clears_the_running_total() {
        let gate = RiskGate::new(&config());
        gate.record_pnl(-1_000_001.0);
        gate.reset_daily_pnl();
        assert!(gate.check_order_gate().is_ok());
    }
}
