//! XRP cross-venue arbitrage core: market-data fan-in, premium detection,
//! dual-leg execution, and settlement transfer, across Upbit, Bithumb,
//! Binance, and MEXC.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arc_swap::ArcSwap;
use dotenv::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xrpcore::config::Config;
use xrpcore::decision::DecisionEngine;
use xrpcore::executor::DualLegExecutor;
use xrpcore::fanin;
use xrpcore::feeds::binance::BinanceProtocol;
use xrpcore::feeds::bithumb::BithumbProtocol;
use xrpcore::feeds::mexc::MexcProtocol;
use xrpcore::feeds::upbit::UpbitProtocol;
use xrpcore::feeds::{FeedSession, VenueProtocol};
use xrpcore::fx_feed::FxFeed;
use xrpcore::lockfree::SpscQueue;
use xrpcore::model::{FeedEvent, FeedEventKind};
use xrpcore::monitor::{MonitorFrame, MonitorPublisher};
use xrpcore::order_clients::binance::BinanceOrderClient;
use xrpcore::order_clients::bithumb::BithumbOrderClient;
use xrpcore::order_clients::mexc::MexcOrderClient;
use xrpcore::order_clients::upbit::UpbitOrderClient;
use xrpcore::order_clients::OrderClient;
use xrpcore::premium::PremiumCalculator;
use xrpcore::rate_limit::{ApiClass, RateLimiterRegistry};
use xrpcore::recovery::RecoveryManager;
use xrpcore::risk::RiskGate;
use xrpcore::transfer::{AddressBook, TransferManager, VenueWithdrawClient, WithdrawClient};
use xrpcore::venue::{Venue, ALL_VENUES, VENUE_COUNT};

const FEED_QUEUE_CAPACITY: usize = 4096;
const SYMBOL: &str = "XRP";
const MAX_RECOVERY_RETRIES: u32 = 3;
const RECOVERY_RETRY_DELAY: Duration = Duration::from_millis(500);
const TRANSFER_POLL_INTERVAL: Duration = Duration::from_secs(2);
const TRANSFER_OVERALL_TIMEOUT: Duration = Duration::from_secs(600);
const ORDER_TIMEOUT: Duration = Duration::from_secs(3);
const MONITOR_PUBLISH_INTERVAL: Duration = Duration::from_secs(1);
const FX_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Process exit codes (spec.md §6): 0 clean shutdown, 1 config failure,
/// anything else a fatal internal error.
const EXIT_CONFIG_FAILURE: i32 = 1;
const EXIT_FATAL: i32 = 2;

#[tokio::main]
async fn main() {
    let _ = dotenv();
    init_tracing();

    let config = match Config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(EXIT_CONFIG_FAILURE);
        }
    };

    match run(config).await {
        Ok(()) => {
            info!("shutdown complete");
            std::process::exit(0);
        }
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xrpcore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn dry_run_enabled() -> bool {
    std::env::var("XRPCORE_DRY_RUN")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

async fn run(config: Config) -> Result<()> {
    let config = Arc::new(ArcSwap::new(Arc::new(config)));
    spawn_config_reload_handler(config.clone());
    let dry_run = dry_run_enabled();
    if dry_run {
        warn!("XRPCORE_DRY_RUN set: orders and transfers are synthetic, no exchange calls will be made");
    }

    let startup = config.load_full();
    let rate_limiter = Arc::new(build_rate_limiter(&startup));
    let order_clients = build_order_clients(&startup, &rate_limiter);
    let withdraw_clients = build_withdraw_clients(&startup, &rate_limiter);

    let risk = Arc::new(RiskGate::new(&startup.risk));
    let recovery = Arc::new(
        RecoveryManager::new(order_clients.clone(), MAX_RECOVERY_RETRIES, RECOVERY_RETRY_DELAY, dry_run)
            .with_callback(Box::new(|result| {
                warn!(?result, "recovery action completed");
            })),
    );
    let executor = Arc::new(DualLegExecutor::new(order_clients, recovery, dry_run, ORDER_TIMEOUT));

    let address_book = AddressBook::new(startup.address_book.clone());
    let transfer_manager = Arc::new(
        TransferManager::new(
            withdraw_clients,
            address_book,
            TRANSFER_POLL_INTERVAL,
            TRANSFER_OVERALL_TIMEOUT,
            dry_run,
        )
        .with_transition_callback(Box::new(|result| {
            info!(status = ?result.status, "transfer status transition");
        })),
    );

    let premium = Arc::new(PremiumCalculator::new(startup.strategy.min_entry_premium_pct));
    let fx_feed = Arc::new(FxFeed::new(
        FxFeed::default_path(),
        "https://api.exchangerate.host/latest?base=USD&symbols=KRW",
    ));
    let monitor = Arc::new(MonitorPublisher::new(format!(
        "{}:{}",
        startup.server.bind_address, startup.server.port
    )));

    let (fanin, queues) = fanin::build(FEED_QUEUE_CAPACITY);

    let feed_handles = vec![
        tokio::spawn(run_feed(UpbitProtocol, queues[Venue::Upbit.index()].clone())),
        tokio::spawn(run_feed(BithumbProtocol, queues[Venue::Bithumb.index()].clone())),
        tokio::spawn(run_feed(BinanceProtocol, queues[Venue::Binance.index()].clone())),
        tokio::spawn(run_feed(MexcProtocol, queues[Venue::Mexc.index()].clone())),
    ];

    let fx_task = tokio::spawn(run_fx_refresh(fx_feed.clone(), premium.clone()));
    let monitor_task = tokio::spawn(run_monitor_publisher(monitor.clone(), premium.clone(), queues));

    let strategy_config = config.clone();
    let risk_for_strategy = risk.clone();
    let premium_for_strategy = premium.clone();
    let executor_for_strategy = executor.clone();
    let strategy_task = tokio::task::spawn_blocking(move || {
        run_strategy_loop(
            fanin,
            &premium_for_strategy,
            strategy_config,
            &risk_for_strategy,
            &executor_for_strategy,
        )
    });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining in-flight work");

    for handle in feed_handles {
        handle.abort();
    }
    fx_task.abort();
    monitor_task.abort();
    strategy_task.abort();

    info!(
        transfer_stats = ?transfer_manager.stats(),
        executor_stats = ?executor.stats(),
        "final stats at shutdown"
    );

    Ok(())
}

async fn run_feed<P: VenueProtocol>(protocol: P, queue: Arc<SpscQueue<FeedEvent>>) {
    let mut session = FeedSession::new(protocol, vec![SYMBOL.to_string()], queue);
    session.run().await;
}

async fn run_fx_refresh(fx_feed: Arc<FxFeed>, premium: Arc<PremiumCalculator>) {
    let mut ticker = tokio::time::interval(FX_REFRESH_INTERVAL);
    loop {
        ticker.tick().await;
        let rate = fx_feed.get_rate().await;
        if rate.is_valid() {
            premium.update_fx(rate.rate);
        }
    }
}

async fn run_monitor_publisher(
    monitor: Arc<MonitorPublisher>,
    premium: Arc<PremiumCalculator>,
    queues: [Arc<SpscQueue<FeedEvent>>; VENUE_COUNT],
) {
    let mut ticker = tokio::time::interval(MONITOR_PUBLISH_INTERVAL);
    loop {
        ticker.tick().await;

        for venue in ALL_VENUES {
            let queue = &queues[venue.index()];
            let frame = MonitorFrame::QueueSnapshot {
                venue,
                depth: queue.len(),
                capacity: queue.capacity(),
            };
            if let Err(e) = monitor.publish(&frame).await {
                warn!(error = %e, "failed to publish queue snapshot");
            }
        }

        let matrix = premium.get_matrix();
        let best = premium.get_best_opportunity();
        let frame = MonitorFrame::PremiumSnapshot {
            matrix,
            best_buy: best.map(|o| o.buy),
            best_sell: best.map(|o| o.sell),
            best_premium_pct: best.map(|o| o.premium_pct).unwrap_or(0.0),
        };
        if let Err(e) = monitor.publish(&frame).await {
            warn!(error = %e, "failed to publish premium snapshot");
        }
    }
}

/// Consumes fan-in events on a dedicated OS thread (spec.md §4.3: the
/// strategy loop runs hot and should not yield to the async runtime between
/// polls), driving the decision engine's output onto the executor via a
/// blocking handle into the current tokio runtime. Pins itself to a
/// physical core when one is configured (spec.md: "strategy and executor
/// -> dedicated physical cores"), matching `edge/receiver.rs`'s use of
/// `core_affinity`; pinning is best-effort and skipped silently if the
/// requested core index doesn't exist.
fn run_strategy_loop(
    mut fanin: fanin::FanIn,
    premium: &PremiumCalculator,
    config: Arc<ArcSwap<Config>>,
    risk: &RiskGate,
    executor: &DualLegExecutor,
) {
    pin_current_thread_to_core(config.load().server.strategy_core);

    let handle = tokio::runtime::Handle::current();
    loop {
        let event = fanin.next_blocking();
        match event.kind {
            FeedEventKind::Ticker(ticker) => {
                premium.update_price(event.venue, ticker.last_price);

                let snapshot = config.load();
                let engine = DecisionEngine::new(&snapshot.strategy, risk);
                if let Some(opportunity) = premium.get_best_opportunity() {
                    match engine.evaluate(&opportunity, SYMBOL) {
                        Ok(request) => {
                            let result = handle.block_on(executor.execute(request));
                            info!(?result, "dual-leg execution completed");
                        }
                        Err(reason) => {
                            tracing::trace!(%reason, "no trade");
                        }
                    }
                }
            }
            FeedEventKind::Connected => info!(venue = %event.venue, "feed connected"),
            FeedEventKind::Disconnected => warn!(venue = %event.venue, "feed disconnected"),
            FeedEventKind::OrderBook(_) => {}
            FeedEventKind::Error => warn!(venue = %event.venue, "feed reported an error"),
        }
    }
}

fn build_rate_limiter(config: &Config) -> RateLimiterRegistry {
    let registry = RateLimiterRegistry::new();
    for venue in ALL_VENUES {
        if let Some(exchange) = config.exchanges.get(venue.as_str()) {
            registry.configure(
                venue,
                ApiClass::Order,
                exchange.per_second_limit as f64,
                exchange.per_second_limit as f64,
            );
            registry.configure(
                venue,
                ApiClass::Query,
                exchange.per_minute_limit as f64 / 60.0,
                exchange.per_minute_limit as f64 / 60.0,
            );
        }
    }
    registry
}

fn build_order_clients(
    config: &Config,
    rate_limiter: &Arc<RateLimiterRegistry>,
) -> HashMap<Venue, Arc<dyn OrderClient>> {
    let mut clients: HashMap<Venue, Arc<dyn OrderClient>> = HashMap::new();
    for venue in ALL_VENUES {
        let Some(exchange) = config.exchanges.get(venue.as_str()) else {
            continue;
        };
        if !exchange.enabled {
            continue;
        }
        let client: Arc<dyn OrderClient> = match venue {
            Venue::Upbit => Arc::new(UpbitOrderClient::new(exchange.clone(), rate_limiter.clone())),
            Venue::Bithumb => Arc::new(BithumbOrderClient::new(exchange.clone(), rate_limiter.clone())),
            Venue::Binance => Arc::new(BinanceOrderClient::new(exchange.clone(), rate_limiter.clone())),
            Venue::Mexc => Arc::new(MexcOrderClient::new(exchange.clone(), rate_limiter.clone())),
        };
        clients.insert(venue, client);
    }
    clients
}

fn build_withdraw_clients(
    config: &Config,
    rate_limiter: &Arc<RateLimiterRegistry>,
) -> HashMap<Venue, Arc<dyn WithdrawClient>> {
    let mut clients: HashMap<Venue, Arc<dyn WithdrawClient>> = HashMap::new();
    for venue in ALL_VENUES {
        let Some(exchange) = config.exchanges.get(venue.as_str()) else {
            continue;
        };
        if !exchange.enabled {
            continue;
        }
        clients.insert(
            venue,
            Arc::new(VenueWithdrawClient::new(venue, exchange.clone(), rate_limiter.clone())),
        );
    }
    clients
}

/// Best-effort core pinning for the strategy thread (Linux only, matching
/// `edge/receiver.rs`'s use of the `core_affinity` crate). A missing or
/// out-of-range index leaves the thread unpinned rather than failing.
#[cfg(target_os = "linux")]
fn pin_current_thread_to_core(core: Option<usize>) {
    let Some(core) = core else { return };
    match core_affinity::get_core_ids() {
        Some(core_ids) if core < core_ids.len() => {
            core_affinity::set_for_current(core_ids[core]);
            info!(core, "strategy thread pinned to core");
        }
        _ => warn!(core, "requested core index out of range, running unpinned"),
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread_to_core(_core: Option<usize>) {}

/// Reloads `Config` from the same path on SIGHUP (spec.md §9: hot reload as
/// a copy-and-swap of the shared configuration under a short writer lock,
/// here the `arc-swap` store). Venue clients, the rate limiter, and the
/// executor/recovery wiring are built once at startup and are not
/// reconstructed on reload; only the strategy thresholds and risk limits
/// the decision engine reads per-iteration pick up the new snapshot.
#[cfg(unix)]
fn spawn_config_reload_handler(config: Arc<ArcSwap<Config>>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let Ok(mut sighup) = signal(SignalKind::hangup()) else {
            warn!("failed to install SIGHUP handler, config hot reload disabled");
            return;
        };
        loop {
            sighup.recv().await;
            match Config::load_from_env() {
                Ok(new_config) => {
                    config.store(Arc::new(new_config));
                    info!("configuration reloaded from SIGHUP");
                }
                Err(e) => error!(error = %e, "config reload failed, keeping previous configuration"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_config_reload_handler(_config: Arc<ArcSwap<Config>>) {}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
