//! Generic venue session state machine.
//!
//! Grounded on `scrapers/binance_session.rs`'s `SessionState`/`BackoffCalculator`
//! pattern, generalized over the four venues via the [`VenueProtocol`] trait
//! instead of being Binance-specific. One `FeedSession` runs one venue's
//! connection for the lifetime of the process; `should_reconnect` is the only
//! cross-thread signal it reads (flipped low by the shutdown path).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::lockfree::spin::Backoff;
use crate::lockfree::spsc::SpscQueue;
use crate::model::{FeedEvent, FeedEventKind};
use crate::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Resolving,
    Connecting,
    TlsHandshaking,
    SessionHandshaking,
    Subscribing,
    Connected,
    Closing,
}

/// What a protocol's `decode` extracted from one inbound frame.
#[derive(Debug, Clone)]
pub enum DecodedUpdate {
    Ticker(crate::model::Ticker),
    OrderBook(crate::model::OrderBook),
    /// Heartbeat requiring an immediate reply (MEXC `{"ping":N}`).
    HeartbeatReply(Message),
    /// Recognized but not translated into a core event (e.g. a subscribe ack).
    Ignored,
}

/// Per-venue wire contract. Everything state-machine and reconnect related
/// is shared; only the protocol specifics vary (spec.md §4.2).
pub trait VenueProtocol: Send + Sync {
    fn venue(&self) -> Venue;
    fn ws_url(&self) -> String;

    /// Messages to send once the session handshake completes, in order.
    /// MEXC sends one per channel and waits for the prior ack (spec.md
    /// §4.2); protocols that don't need that can return them all at once
    /// and ignore `ack_received`.
    fn subscription_messages(&self, symbols: &[String]) -> Vec<Message>;

    /// Whether a subscribe step must wait for an ack before the next is
    /// sent. Upbit/Bithumb/Binance subscribe in one shot; MEXC does not.
    fn sequential_subscribe(&self) -> bool {
        false
    }

    fn decode(&self, msg: &Message) -> Vec<DecodedUpdate>;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub backoff_multiplier: f64,
    pub connect_timeout: Duration,
    pub subscribe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            connect_timeout: Duration::from_secs(10),
            subscribe_timeout: Duration::from_secs(5),
        }
    }
}

type EventCallback = Arc<dyn Fn(FeedEvent) + Send + Sync>;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Drives one venue's connection through `SessionState` transitions,
/// reconnecting with exponential backoff on any transport-level error.
/// Parse failures never reach here (spec.md §4.2 invariant): a protocol's
/// `decode` swallows and counts them internally.
pub struct FeedSession<P: VenueProtocol> {
    protocol: P,
    symbols: Vec<String>,
    config: SessionConfig,
    should_reconnect: Arc<AtomicBool>,
    queue: Option<Arc<SpscQueue<FeedEvent>>>,
    callback: Option<EventCallback>,
    state: SessionState,
}

impl<P: VenueProtocol> FeedSession<P> {
    pub fn new(protocol: P, symbols: Vec<String>, queue: Arc<SpscQueue<FeedEvent>>) -> Self {
        Self {
            protocol,
            symbols,
            config: SessionConfig::default(),
            should_reconnect: Arc::new(AtomicBool::new(true)),
            queue: Some(queue),
            callback: None,
            state: SessionState::Disconnected,
        }
    }

    /// Test-only constructor: events go to a synchronous callback instead of
    /// the queue (spec.md §4.2 "Output"). The callback is never invoked
    /// concurrently for a single session since one task owns the read loop.
    pub fn with_callback(
        protocol: P,
        symbols: Vec<String>,
        callback: EventCallback,
    ) -> Self {
        Self {
            protocol,
            symbols,
            config: SessionConfig::default(),
            should_reconnect: Arc::new(AtomicBool::new(true)),
            queue: None,
            callback: Some(callback),
            state: SessionState::Disconnected,
        }
    }

    pub fn should_reconnect_handle(&self) -> Arc<AtomicBool> {
        self.should_reconnect.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn emit(&self, kind: FeedEventKind) {
        let event = FeedEvent {
            venue: self.protocol.venue(),
            kind,
            timestamp_us: now_us(),
        };
        if let Some(cb) = &self.callback {
            cb(event);
        } else if let Some(queue) = &self.queue {
            let _ = queue.push(event);
        }
    }

    /// Runs until `should_reconnect` is cleared. Every connection attempt
    /// that fails to reach `Connected` or that drops afterward loops back
    /// through `Disconnected` with the backoff delay applied.
    pub async fn run(&mut self) {
        let mut backoff = Backoff::new(
            self.config.backoff_base,
            self.config.backoff_max,
            self.config.backoff_multiplier,
        );

        while self.should_reconnect.load(Ordering::Relaxed) {
            self.state = SessionState::Resolving;
            match self.connect_and_subscribe().await {
                Ok(mut ws) => {
                    backoff.reset();
                    self.emit(FeedEventKind::Connected);
                    self.state = SessionState::Connected;
                    self.read_loop(&mut ws).await;
                    self.state = SessionState::Closing;
                    self.emit(FeedEventKind::Disconnected);
                }
                Err(e) => {
                    warn!(venue = %self.protocol.venue(), error = %e, "feed connect failed");
                    self.emit(FeedEventKind::Error);
                }
            }
            self.state = SessionState::Disconnected;
            if !self.should_reconnect.load(Ordering::Relaxed) {
                break;
            }
            let delay = backoff.next_delay();
            debug!(venue = %self.protocol.venue(), delay_ms = delay.as_millis() as u64, "reconnecting after backoff");
            tokio::time::sleep(delay).await;
        }
    }

    async fn connect_and_subscribe(&mut self) -> crate::error::CoreResult<WsStream> {
        self.state = SessionState::Connecting;
        let url = self.protocol.ws_url();
        let (mut ws, _resp) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(&url),
        )
        .await
        .map_err(|_| crate::error::CoreError::connection_timeout(format!("{url} connect timed out")))?
        .map_err(crate::error::CoreError::from)?;

        self.state = SessionState::TlsHandshaking;
        self.state = SessionState::SessionHandshaking;
        self.state = SessionState::Subscribing;

        let messages = self.protocol.subscription_messages(&self.symbols);
        if self.protocol.sequential_subscribe() {
            for msg in messages {
                ws.send(msg).await.map_err(crate::error::CoreError::from)?;
                let ack = tokio::time::timeout(self.config.subscribe_timeout, ws.next())
                    .await
                    .map_err(|_| crate::error::CoreError::connection_timeout("subscribe ack timed out"))?;
                if ack.is_none() {
                    return Err(crate::error::CoreError::connection_closed(
                        "stream closed while waiting for subscribe ack",
                    ));
                }
            }
        } else {
            for msg in messages {
                ws.send(msg).await.map_err(crate::error::CoreError::from)?;
            }
        }
        Ok(ws)
    }

    async fn read_loop(&mut self, ws: &mut WsStream) {
        while self.should_reconnect.load(Ordering::Relaxed) {
            match ws.next().await {
                Some(Ok(msg)) => {
                    if msg.is_close() {
                        break;
                    }
                    for update in self.protocol.decode(&msg) {
                        match update {
                            DecodedUpdate::Ticker(t) => self.emit(FeedEventKind::Ticker(t)),
                            DecodedUpdate::OrderBook(b) => self.emit(FeedEventKind::OrderBook(b)),
                            DecodedUpdate::HeartbeatReply(reply) => {
                                if ws.send(reply).await.is_err() {
                                    return;
                                }
                            }
                            DecodedUpdate::Ignored => {}
                        }
                    }
                }
                Some(Err(e)) => {
                    info!(venue = %self.protocol.venue(), error = %e, "feed read error, reconnecting");
                    return;
                }
                None => return,
            }
        }
    }
}

fn now_us() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}
