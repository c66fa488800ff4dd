//! Decision engine: turns a premium-matrix opportunity into a `DualOrderRequest`,
//! or explains why it won't (spec.md's pipeline diagram, "Decision Engine"
//! stage between the premium calculator and the dual-leg executor).

use crate::config::StrategyConfig;
use crate::model::{DualOrderRequest, OrderRequest, Side};
use crate::premium::Opportunity;
use crate::risk::{RiskGate, RiskRejection};
use crate::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoTradeReason {
    PremiumBelowMinimum,
    PremiumAboveMaximum,
    Risk(RiskRejection),
}

impl std::fmt::Display for NoTradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoTradeReason::PremiumBelowMinimum => write!(f, "premium below minimum entry threshold"),
            NoTradeReason::PremiumAboveMaximum => {
                write!(f, "premium above maximum entry threshold (likely a stale or bad quote)")
            }
            NoTradeReason::Risk(r) => write!(f, "{r}"),
        }
    }
}

pub struct DecisionEngine<'a> {
    strategy: &'a StrategyConfig,
    risk: &'a RiskGate,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(strategy: &'a StrategyConfig, risk: &'a RiskGate) -> Self {
        Self { strategy, risk }
    }

    /// Converts a premium-matrix opportunity into the dual-leg order the
    /// executor should submit, sized to the venue's quantity bounds, or
    /// explains why the engine is declining to trade.
    pub fn evaluate(&self, opportunity: &Opportunity, symbol: &str) -> Result<DualOrderRequest, NoTradeReason> {
        if opportunity.premium_pct < self.strategy.min_entry_premium_pct {
            return Err(NoTradeReason::PremiumBelowMinimum);
        }
        if opportunity.premium_pct > self.strategy.max_entry_premium_pct {
            return Err(NoTradeReason::PremiumAboveMaximum);
        }
        self.risk.check_order_gate().map_err(NoTradeReason::Risk)?;

        let quantity = self.sized_quantity(opportunity.premium_pct);
        let buy_leg = OrderRequest::market(opportunity.buy, symbol, Side::Buy, quantity);
        let sell_leg = OrderRequest::market(opportunity.sell, symbol, Side::Sell, quantity);

        Ok(DualOrderRequest::new(buy_leg, sell_leg, opportunity.premium_pct))
    }

    /// Scales linearly from `min_order_quantity` at the entry floor to
    /// `max_order_quantity` at the entry ceiling, so a stronger premium
    /// sizes a larger order within the configured band.
    fn sized_quantity(&self, premium_pct: f64) -> f64 {
        let band = (self.strategy.max_entry_premium_pct - self.strategy.min_entry_premium_pct).max(f64::EPSILON);
        let strength = ((premium_pct - self.strategy.min_entry_premium_pct) / band).clamp(0.0, 1.0);
        self.strategy.min_order_quantity
            + strength * (self.strategy.max_order_quantity - self.strategy.min_order_quantity)
    }
}
