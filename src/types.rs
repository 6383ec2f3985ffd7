//! Shared value types for the trading engine.
//!
//! Every price, size, and spread on the decision path is a `Decimal`. Floating
//! point is reserved for latency statistics and diagnostics only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which venue a piece of state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    F,
    L,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::F => write!(f, "F"),
            Venue::L => write!(f, "L"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A top-of-book quote on one venue at one point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Decimal,
    pub ask: Decimal,
    pub bid_size: Option<Decimal>,
    pub ask_size: Option<Decimal>,
    pub ts: DateTime<Utc>,
}

impl Quote {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid,
            ask,
            bid_size: None,
            ask_size: None,
            ts: Utc::now(),
        }
    }

    /// Top-of-book invariant: a crossed or locked quote is never valid.
    pub fn is_valid(&self) -> bool {
        self.bid < self.ask
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Round a price down to the nearest tick, idempotently.
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    (price / tick_size).floor() * tick_size
}

/// Generate a unique, time-ordered client order id: `arb_{direction}_{epoch_ms}`.
pub fn generate_client_order_id(direction: Direction, now: DateTime<Utc>) -> String {
    let tag = match direction {
        Direction::Long => "long",
        Direction::Short => "short",
    };
    format!("arb_{}_{}", tag, now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_rejects_crossed_book() {
        let q = Quote::new(dec!(100.0), dec!(100.0));
        assert!(!q.is_valid());
        let q = Quote::new(dec!(100.0), dec!(100.1));
        assert!(q.is_valid());
    }

    #[test]
    fn round_to_tick_is_idempotent() {
        let t = dec!(0.1);
        let once = round_to_tick(dec!(100.27), t);
        let twice = round_to_tick(once, t);
        assert_eq!(once, twice);
        assert_eq!(once, dec!(100.2));
    }

    #[test]
    fn client_order_ids_are_time_ordered() {
        let a = Utc::now();
        let b = a + chrono::Duration::milliseconds(1);
        let id_a = generate_client_order_id(Direction::Long, a);
        let id_b = generate_client_order_id(Direction::Long, b);
        assert_ne!(id_a, id_b);
    }
}
