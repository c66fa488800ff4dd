//! Core library for the XRP cross-venue arbitrage engine.
//!
//! Exposes the venue feed clients, fan-in, premium calculator, decision
//! engine, dual-leg executor, transfer manager, and their supporting
//! modules for use by the `xrpcore` binary and the integration tests.

pub mod auth;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod fanin;
pub mod feeds;
pub mod fees;
pub mod fx_feed;
pub mod lockfree;
pub mod model;
pub mod monitor;
pub mod order_clients;
pub mod premium;
pub mod rate_limit;
pub mod recovery;
pub mod risk;
pub mod transfer;
pub mod venue;
