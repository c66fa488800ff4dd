//! End-to-end wiring tests across module boundaries: feed events in, a
//! trade decision and dual-leg execution out. Each module already has its
//! own focused unit tests; these exercise the seams between them the way
//! `main.rs` wires them at startup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use xrpcore::config::{Config, RiskConfig, StrategyConfig};
use xrpcore::decision::{DecisionEngine, NoTradeReason};
use xrpcore::executor::DualLegExecutor;
use xrpcore::fanin;
use xrpcore::model::{FeedEventKind, Ticker};
use xrpcore::premium::PremiumCalculator;
use xrpcore::recovery::RecoveryManager;
use xrpcore::risk::RiskGate;
use xrpcore::venue::Venue;

fn strategy() -> StrategyConfig {
    StrategyConfig {
        min_entry_premium_pct: 1.0,
        max_entry_premium_pct: 15.0,
        stop_loss_pct: 2.0,
        min_order_quantity: 50.0,
        max_order_quantity: 50.0,
        slippage_cap_pct: 0.5,
        order_timeout_secs: 3,
    }
}

fn ticker_event(venue: Venue, price: f64) -> xrpcore::model::FeedEvent {
    xrpcore::model::FeedEvent {
        venue,
        kind: FeedEventKind::Ticker(Ticker::new(venue, "XRP", price, price, price)),
        timestamp_us: 0,
    }
}

/// Feed events land in the fan-in queues, the strategy thread drains them
/// into the premium matrix, and a real premium gap produces a dual-leg
/// request the dry-run executor completes successfully end to end.
#[tokio::test]
async fn premium_gap_from_feed_events_drives_a_dry_run_trade() {
    let (mut fanin, queues) = fanin::build(16);
    queues[Venue::Upbit.index()].push(ticker_event(Venue::Upbit, 3300.0));
    queues[Venue::Binance.index()].push(ticker_event(Venue::Binance, 2.0));

    let premium = PremiumCalculator::new(1.0);
    premium.update_fx(1500.0);
    for _ in 0..2 {
        if let FeedEventKind::Ticker(t) = fanin.next_blocking().kind {
            premium.update_price(t.venue, t.last_price);
        }
    }

    let opportunity = premium.get_best_opportunity().expect("a premium gap exists");
    assert_eq!(opportunity.buy, Venue::Binance);
    assert_eq!(opportunity.sell, Venue::Upbit);

    let strategy_cfg = strategy();
    let risk = RiskGate::new(&RiskConfig::default());
    let engine = DecisionEngine::new(&strategy_cfg, &risk);
    let request = engine
        .evaluate(&opportunity, "XRP")
        .expect("premium is within the entry band");

    let executor = DualLegExecutor::new(
        HashMap::new(),
        Arc::new(RecoveryManager::new(HashMap::new(), 1, Duration::from_millis(1), true)),
        true,
        Duration::from_secs(3),
    );
    let result = executor.execute(request).await;
    assert!(result.both_success());
    assert_eq!(executor.stats().both_success, 1);
}

/// The same pipeline declines to trade once the decision engine's risk gate
/// is tripped, even though the premium matrix still shows a wide gap.
#[tokio::test]
async fn kill_switch_blocks_a_trade_even_with_a_wide_premium_gap() {
    let premium = PremiumCalculator::new(1.0);
    premium.update_fx(1500.0);
    premium.update_price(Venue::Upbit, 3300.0);
    premium.update_price(Venue::Binance, 2.0);
    let opportunity = premium.get_best_opportunity().unwrap();

    let strategy_cfg = strategy();
    let mut risk_cfg = RiskConfig::default();
    risk_cfg.kill_switch = true;
    let risk = RiskGate::new(&risk_cfg);
    let engine = DecisionEngine::new(&strategy_cfg, &risk);

    match engine.evaluate(&opportunity, "XRP") {
        Err(NoTradeReason::Risk(_)) => {}
        other => panic!("expected a risk rejection, got {other:?}"),
    }
}

/// A partial fill produced by the real dry-run-disabled code path (mock
/// order clients standing in for the network) is carried through the
/// executor into a recovery attempt, observable via the executor's own
/// stats rather than by calling `RecoveryManager` directly.
#[tokio::test]
async fn executor_hands_a_partial_fill_to_recovery_and_counts_it() {
    use async_trait::async_trait;
    use xrpcore::error::CoreResult;
    use xrpcore::model::{OrderRequest, OrderResult, OrderStatus, Side};
    use xrpcore::order_clients::OrderClient;

    struct AlwaysFails;
    #[async_trait]
    impl OrderClient for AlwaysFails {
        async fn place_order(&self, _: &OrderRequest) -> CoreResult<OrderResult> {
            Ok(OrderResult::failed("simulated rejection"))
        }
        async fn cancel_order(&self, _: &str) -> CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_order(&self, _: &str) -> CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_balance(&self, _: &str) -> CoreResult<f64> {
            unimplemented!()
        }
    }

    struct AlwaysFills;
    #[async_trait]
    impl OrderClient for AlwaysFills {
        async fn place_order(&self, request: &OrderRequest) -> CoreResult<OrderResult> {
            Ok(OrderResult {
                exchange_order_id: "x".to_string(),
                status: OrderStatus::Filled,
                filled_quantity: request.quantity,
                avg_fill_price: request.price,
                commission: 0.0,
                timestamp_us: 0,
                message: String::new(),
            })
        }
        async fn cancel_order(&self, _: &str) -> CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_order(&self, _: &str) -> CoreResult<OrderResult> {
            unimplemented!()
        }
        async fn get_balance(&self, _: &str) -> CoreResult<f64> {
            unimplemented!()
        }
    }

    let mut order_clients: HashMap<Venue, Arc<dyn OrderClient>> = HashMap::new();
    order_clients.insert(Venue::Binance, Arc::new(AlwaysFills));
    order_clients.insert(Venue::Upbit, Arc::new(AlwaysFails));

    let mut recovery_clients: HashMap<Venue, Arc<dyn OrderClient>> = HashMap::new();
    recovery_clients.insert(Venue::Binance, Arc::new(AlwaysFills));

    let recovery = Arc::new(RecoveryManager::new(
        recovery_clients,
        2,
        Duration::from_millis(1),
        false,
    ));
    let executor = DualLegExecutor::new(order_clients, recovery, false, Duration::from_secs(3));

    let request = xrpcore::model::DualOrderRequest::new(
        OrderRequest::market(Venue::Binance, "XRP", Side::Buy, 50.0),
        OrderRequest::market(Venue::Upbit, "XRP", Side::Sell, 50.0),
        3.0,
    );
    let result = executor.execute(request).await;

    assert!(result.partial_fill());
    let stats = executor.stats();
    assert_eq!(stats.partial_success, 1);
    // The recovery order sells the filled buy-leg quantity back on Binance,
    // which is configured to fill, so the remedial leg succeeds too.
    assert_eq!(stats.recovery_attempts, 1);
    assert_eq!(stats.recovery_successes, 1);
}

/// A config loaded from disk round-trips through an `ArcSwap` the way
/// `main.rs`'s hot-reload handler does: the strategy thread's next `load()`
/// after a `store()` observes the new thresholds immediately.
#[test]
fn config_hot_reload_swap_is_visible_to_the_next_load() {
    let base = sample_config_text(1.0, 15.0);
    let config = Config::parse(&base).unwrap();
    let swap = arc_swap::ArcSwap::new(Arc::new(config));

    assert_eq!(swap.load().strategy.min_entry_premium_pct, 1.0);

    let reloaded = sample_config_text(2.5, 15.0);
    let new_config = Config::parse(&reloaded).unwrap();
    swap.store(Arc::new(new_config));

    assert_eq!(swap.load().strategy.min_entry_premium_pct, 2.5);
}

/// A reload attempt that fails to parse must never clobber the live
/// snapshot -- the handler in `main.rs` only calls `store` after a
/// successful `Config::load_from_env`, so the old snapshot stays active.
#[test]
fn config_reload_failure_leaves_the_prior_snapshot_in_place() {
    let base = sample_config_text(1.0, 15.0);
    let config = Config::parse(&base).unwrap();
    let swap = arc_swap::ArcSwap::new(Arc::new(config));

    let broken = "not valid toml at all {{{";
    assert!(Config::parse(broken).is_err());
    assert_eq!(swap.load().strategy.min_entry_premium_pct, 1.0);
}

fn sample_config_text(min_premium: f64, max_premium: f64) -> String {
    format!(
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
min_entry_premium_pct = {min_premium}
max_entry_premium_pct = {max_premium}
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
    )
}

/// Rate limiting holds across clients contending for the same venue bucket,
/// the way two legs of a dual-leg request or an order-plus-transfer pair
/// would (spec.md's rate-limit property stated per-bucket, exercised here
/// with real concurrent tokio tasks instead of a single-threaded loop).
#[tokio::test]
async fn concurrent_acquires_against_one_bucket_are_never_over_granted() {
    use xrpcore::rate_limit::{ApiClass, RateLimiterRegistry};

    let registry = Arc::new(RateLimiterRegistry::new());
    registry.configure(Venue::Upbit, ApiClass::Order, 1000.0, 3.0);

    let granted = Arc::new(AtomicU32::new(0));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let registry = registry.clone();
        let granted = granted.clone();
        handles.push(tokio::spawn(async move {
            if registry.try_acquire(Venue::Upbit, ApiClass::Order).is_ok() {
                granted.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    // Burst capacity is 3; a flood of 10 immediate acquires cannot all
    // succeed even though the refill rate is fast, since they all land
    // before any refill tick elapses.
    assert!(granted.load(Ordering::Relaxed) <= 3);
    assert!(granted.load(Ordering::Relaxed) >= 1);
}
