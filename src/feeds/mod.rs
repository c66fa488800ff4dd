//! Venue feed clients: one TLS-secured streaming session per venue, each an
//! async state machine over [`session::FeedSession`].
//!
//! Wire-format specifics (subscription payload, symbol casing, heartbeat
//! handling, decode) live behind the [`VenueProtocol`] trait implemented in
//! `upbit.rs`/`bithumb.rs`/`binance.rs`/`mexc.rs`; everything else (connect,
//! backoff, reconnect, event emission) is shared by `session.rs`.

pub mod binance;
pub mod bithumb;
pub mod json_decode;
pub mod mexc;
pub mod mexc_proto;
pub mod session;
pub mod upbit;

pub use session::{DecodedUpdate, FeedSession, SessionConfig, SessionState, VenueProtocol};
