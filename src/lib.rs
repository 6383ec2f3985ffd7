//! Cross-venue arbitrage executor library.
//!
//! Exposes the trading-engine components so the binary and integration tests
//! can wire them together without re-implementing the Coordinator.

pub mod book;
pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod datalog;
pub mod latency;
pub mod notify;
pub mod pending;
pub mod position;
pub mod risk;
pub mod signal;
pub mod types;
pub mod venue_l;
