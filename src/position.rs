//! Position Ledger: signed per-venue position and derived net exposure.

use crate::types::Venue;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use thiserror::Error;

const HISTORY_CAPACITY: usize = 200;

#[derive(Debug, Error)]
pub enum PositionSyncError {
    #[error("venue L account query failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct PositionChange {
    pub venue: Venue,
    pub delta: Decimal,
    pub resulting: Decimal,
    pub ts: DateTime<Utc>,
}

struct Inner {
    f: Decimal,
    l: Decimal,
    history: VecDeque<PositionChange>,
}

pub struct PositionLedger {
    inner: Mutex<Inner>,
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                f: Decimal::ZERO,
                l: Decimal::ZERO,
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
            }),
        }
    }

    fn record(inner: &mut Inner, venue: Venue, delta: Decimal, resulting: Decimal) {
        if inner.history.len() >= HISTORY_CAPACITY {
            inner.history.pop_front();
        }
        inner.history.push_back(PositionChange {
            venue,
            delta,
            resulting,
            ts: Utc::now(),
        });
    }

    pub fn apply(&self, venue: Venue, signed_delta: Decimal) {
        let mut inner = self.inner.lock();
        let resulting = match venue {
            Venue::F => {
                inner.f += signed_delta;
                inner.f
            }
            Venue::L => {
                inner.l += signed_delta;
                inner.l
            }
        };
        Self::record(&mut inner, venue, signed_delta, resulting);
    }

    pub fn set(&self, venue: Venue, signed_size: Decimal) {
        let mut inner = self.inner.lock();
        let delta = match venue {
            Venue::F => signed_size - inner.f,
            Venue::L => signed_size - inner.l,
        };
        match venue {
            Venue::F => inner.f = signed_size,
            Venue::L => inner.l = signed_size,
        }
        Self::record(&mut inner, venue, delta, signed_size);
    }

    pub fn get(&self, venue: Venue) -> Decimal {
        let inner = self.inner.lock();
        match venue {
            Venue::F => inner.f,
            Venue::L => inner.l,
        }
    }

    pub fn net(&self) -> Decimal {
        let inner = self.inner.lock();
        inner.f + inner.l
    }

    pub fn imbalance(&self) -> Decimal {
        self.net().abs()
    }

    pub fn exposure(&self) -> Decimal {
        let inner = self.inner.lock();
        (inner.f.abs() + inner.l.abs()) / Decimal::TWO
    }

    pub fn recent_history(&self, n: usize) -> Vec<PositionChange> {
        let inner = self.inner.lock();
        inner.history.iter().rev().take(n).cloned().collect()
    }

    /// Replace the cached venue-L position from a REST account query.
    ///
    /// On transport failure the cached value is retained and the error is
    /// surfaced to the caller rather than swallowed.
    pub async fn sync_from_venue_l<F, Fut>(&self, fetch: F) -> Result<(), PositionSyncError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Decimal, PositionSyncError>>,
    {
        let size = fetch().await?;
        self.set(Venue::L, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn net_position_neutralizes_after_equal_hedge() {
        let ledger = PositionLedger::new();
        ledger.apply(Venue::F, dec!(0.001));
        assert_eq!(ledger.net(), dec!(0.001));
        ledger.apply(Venue::L, dec!(-0.001));
        assert_eq!(ledger.net(), dec!(0));
        assert_eq!(ledger.imbalance(), dec!(0));
    }

    #[test]
    fn exposure_is_average_of_absolute_positions() {
        let ledger = PositionLedger::new();
        ledger.set(Venue::F, dec!(0.01));
        ledger.set(Venue::L, dec!(-0.01));
        assert_eq!(ledger.exposure(), dec!(0.01));
    }

    #[tokio::test]
    async fn sync_failure_retains_cached_value() {
        let ledger = PositionLedger::new();
        ledger.set(Venue::L, dec!(0.005));
        let result = ledger
            .sync_from_venue_l(|| async { Err(PositionSyncError::Transport("timeout".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(ledger.get(Venue::L), dec!(0.005));
    }
}
