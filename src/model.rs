//! Core data model: quote/book snapshots, order intent/outcome, dual-leg
//! and recovery records, and transfer records.
//!
//! Hot-path records (`Ticker`, `OrderBook`) are small, `Copy`-friendly, and
//! designed to move through the pool-backed queues in `lockfree` without
//! per-message heap allocation on the steady-state path.

use serde::{Deserialize, Serialize};

use crate::venue::Venue;

pub const MAX_SYMBOL_LEN: usize = 16;
pub const MAX_BOOK_LEVELS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Failed,
}

/// A quote snapshot. `bid <= ask` whenever both sides are nonzero; a record
/// with either side zero is valid (e.g. a one-sided book burst) but is
/// excluded from premium math by `PremiumCalculator`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub venue: Venue,
    pub symbol: [u8; MAX_SYMBOL_LEN],
    pub symbol_len: u8,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume_24h: f64,
    pub timestamp_us: i64,
}

impl Ticker {
    pub fn new(venue: Venue, symbol: &str, last_price: f64, bid: f64, ask: f64) -> Self {
        let mut buf = [0u8; MAX_SYMBOL_LEN];
        let bytes = symbol.as_bytes();
        let n = bytes.len().min(MAX_SYMBOL_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            venue,
            symbol: buf,
            symbol_len: n as u8,
            last_price,
            bid,
            ask,
            volume_24h: 0.0,
            timestamp_us: 0,
        }
    }

    pub fn symbol_str(&self) -> &str {
        std::str::from_utf8(&self.symbol[..self.symbol_len as usize]).unwrap_or("")
    }

    pub fn with_volume(mut self, volume_24h: f64) -> Self {
        self.volume_24h = volume_24h;
        self
    }

    pub fn with_timestamp(mut self, timestamp_us: i64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Whether this record carries usable data for spread math: both sides
    /// present and internally consistent.
    pub fn is_valid_for_spread(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid <= self.ask
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self {
            venue: Venue::Upbit,
            symbol: [0; MAX_SYMBOL_LEN],
            symbol_len: 0,
            last_price: 0.0,
            bid: 0.0,
            ask: 0.0,
            volume_24h: 0.0,
            timestamp_us: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// A bounded order book snapshot. Produced by a single venue thread and
/// consumed by the strategy thread; never shared for mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderBook {
    pub venue: Venue,
    pub symbol: [u8; MAX_SYMBOL_LEN],
    pub symbol_len: u8,
    pub bids: [PriceLevel; MAX_BOOK_LEVELS],
    pub bid_count: u8,
    pub asks: [PriceLevel; MAX_BOOK_LEVELS],
    pub ask_count: u8,
    pub timestamp_us: i64,
}

impl OrderBook {
    pub fn new(venue: Venue, symbol: &str) -> Self {
        let mut buf = [0u8; MAX_SYMBOL_LEN];
        let bytes = symbol.as_bytes();
        let n = bytes.len().min(MAX_SYMBOL_LEN);
        buf[..n].copy_from_slice(&bytes[..n]);
        Self {
            venue,
            symbol: buf,
            symbol_len: n as u8,
            bids: [PriceLevel { price: 0.0, quantity: 0.0 }; MAX_BOOK_LEVELS],
            bid_count: 0,
            asks: [PriceLevel { price: 0.0, quantity: 0.0 }; MAX_BOOK_LEVELS],
            ask_count: 0,
            timestamp_us: 0,
        }
    }

    pub fn push_bid(&mut self, price: f64, quantity: f64) -> bool {
        let i = self.bid_count as usize;
        if i >= MAX_BOOK_LEVELS || quantity <= 0.0 {
            return false;
        }
        self.bids[i] = PriceLevel { price, quantity };
        self.bid_count += 1;
        true
    }

    pub fn push_ask(&mut self, price: f64, quantity: f64) -> bool {
        let i = self.ask_count as usize;
        if i >= MAX_BOOK_LEVELS || quantity <= 0.0 {
            return false;
        }
        self.asks[i] = PriceLevel { price, quantity };
        self.ask_count += 1;
        true
    }

    pub fn best_bid(&self) -> Option<f64> {
        (self.bid_count > 0).then_some(self.bids[0].price)
    }

    pub fn best_ask(&self) -> Option<f64> {
        (self.ask_count > 0).then_some(self.asks[0].price)
    }

    /// Levels monotonic (bids descending, asks ascending), quantities
    /// strictly positive, and `best_bid < best_ask`.
    pub fn is_valid(&self) -> bool {
        let bids = &self.bids[..self.bid_count as usize];
        let asks = &self.asks[..self.ask_count as usize];

        if bids.iter().any(|l| l.quantity <= 0.0) || asks.iter().any(|l| l.quantity <= 0.0) {
            return false;
        }
        if !bids.windows(2).all(|w| w[0].price >= w[1].price) {
            return false;
        }
        if !asks.windows(2).all(|w| w[0].price <= w[1].price) {
            return false;
        }
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b < a,
            _ => true,
        }
    }
}

/// Event kind emitted by a venue feed client onto its SPSC queue.
#[derive(Debug, Clone, Copy)]
pub enum FeedEventKind {
    Connected,
    Disconnected,
    Ticker(Ticker),
    OrderBook(OrderBook),
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedEvent {
    pub venue: Venue,
    pub kind: FeedEventKind,
    pub timestamp_us: i64,
}

/// Intent to place an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub venue: Venue,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    /// 0 = market order.
    pub price: f64,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn market(venue: Venue, symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: 0.0,
            client_order_id: None,
        }
    }

    pub fn limit(
        venue: Venue,
        symbol: impl Into<String>,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price,
            client_order_id: None,
        }
    }
}

/// Outcome of an order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub exchange_order_id: String,
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub avg_fill_price: f64,
    pub commission: f64,
    pub timestamp_us: i64,
    pub message: String,
}

impl OrderResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            exchange_order_id: String::new(),
            status: OrderStatus::Failed,
            filled_quantity: 0.0,
            avg_fill_price: 0.0,
            commission: 0.0,
            timestamp_us: 0,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OrderStatus::Filled | OrderStatus::PartiallyFilled | OrderStatus::Open)
    }

    pub fn is_fill_success(&self) -> bool {
        matches!(self.status, OrderStatus::Filled | OrderStatus::PartiallyFilled) && self.filled_quantity > 0.0
    }
}

/// A correlated pair of order legs, submitted in parallel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualOrderRequest {
    pub buy_leg: OrderRequest,
    pub sell_leg: OrderRequest,
    pub expected_premium_pct: f64,
    /// Artificial send delay applied before each leg, used in tests to
    /// compensate for differential venue RTT and to exercise parallelism.
    pub buy_leg_delay_ms: u64,
    pub sell_leg_delay_ms: u64,
}

impl DualOrderRequest {
    pub fn new(buy_leg: OrderRequest, sell_leg: OrderRequest, expected_premium_pct: f64) -> Self {
        Self {
            buy_leg,
            sell_leg,
            expected_premium_pct,
            buy_leg_delay_ms: 0,
            sell_leg_delay_ms: 0,
        }
    }

    pub fn with_delays(mut self, buy_delay_ms: u64, sell_delay_ms: u64) -> Self {
        self.buy_leg_delay_ms = buy_delay_ms;
        self.sell_leg_delay_ms = sell_delay_ms;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualOrderResult {
    pub buy_result: OrderResult,
    pub sell_result: OrderResult,
    pub start_timestamp_us: i64,
    pub end_timestamp_us: i64,
}

impl DualOrderResult {
    pub fn both_success(&self) -> bool {
        self.buy_result.is_fill_success() && self.sell_result.is_fill_success()
    }

    pub fn both_failed(&self) -> bool {
        !self.buy_result.is_fill_success() && !self.sell_result.is_fill_success()
    }

    pub fn partial_fill(&self) -> bool {
        self.buy_result.is_fill_success() != self.sell_result.is_fill_success()
    }

    pub fn total_latency_ms(&self) -> f64 {
        (self.end_timestamp_us - self.start_timestamp_us) as f64 / 1000.0
    }
}

/// A remedial action chosen when exactly one leg of a dual-order filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    None,
    SellBought,
    BuySold,
    CancelBoth,
    ManualIntervention,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub action: RecoveryAction,
    pub order: Option<OrderRequest>,
    pub reason: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl RecoveryPlan {
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            action: RecoveryAction::None,
            order: None,
            reason: reason.into(),
            max_retries: 0,
            retry_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub action: RecoveryAction,
    pub order_result: Option<OrderResult>,
    pub success: bool,
    pub retry_count: u32,
}

/// Transfer lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Venue,
    pub to: Venue,
    pub coin: String,
    pub amount: f64,
    pub to_address: String,
    /// Required for XRP; request is invalid without it.
    pub destination_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer_id: String,
    pub txhash: Option<String>,
    pub status: TransferStatus,
    pub elapsed_ms: u64,
    pub fee: f64,
    pub error: Option<String>,
}

impl TransferResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            transfer_id: String::new(),
            txhash: None,
            status: TransferStatus::Failed,
            elapsed_ms: 0,
            fee: 0.0,
            error: Some(reason.into()),
        }
    }
}

/// USD->KRW mid rate with a freshness flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FxRate {
    pub rate: f64,
    pub timestamp_unix: f64,
    pub is_fresh: bool,
}

impl FxRate {
    pub fn is_valid(&self) -> bool {
        self.rate > 0.0
    }
}
