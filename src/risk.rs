//! Risk Gate: stateful admission control plus a rolling-window circuit breaker.

use crate::position::PositionLedger;
use crate::signal::Signal;
use crate::types::{Direction, Venue};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;

const CIRCUIT_BREAKER_WINDOW_SECS: i64 = 60;
const CIRCUIT_BREAKER_THRESHOLD: usize = 10;
const CIRCUIT_BREAKER_COOLDOWN_SECS: i64 = 300;
const ERROR_RATE_MIN_TRADES: u64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct RiskLimits {
    pub max_position: Decimal,
    pub max_imbalance: Decimal,
    pub max_daily_loss: Decimal,
    pub max_error_rate: f64,
}

struct Inner {
    daily_pnl: Decimal,
    trade_count: u64,
    error_count: u64,
    error_times: VecDeque<DateTime<Utc>>,
    circuit_breaker_tripped: bool,
    circuit_breaker_tripped_at: Option<DateTime<Utc>>,
}

/// Why a signal failed admission, for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    CircuitBreaker,
    PositionLimit,
    Imbalance,
    DailyLoss,
    ErrorRate,
}

pub struct RiskGate {
    limits: RiskLimits,
    inner: Mutex<Inner>,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner {
                daily_pnl: Decimal::ZERO,
                trade_count: 0,
                error_count: 0,
                error_times: VecDeque::new(),
                circuit_breaker_tripped: false,
                circuit_breaker_tripped_at: None,
            }),
        }
    }

    /// Runs the five-step admission ladder in order, short-circuiting on the
    /// first failure. Returns `Ok(())` if the signal may proceed.
    pub fn admit(&self, signal: &Signal, ledger: &PositionLedger) -> Result<(), RejectReason> {
        let mut inner = self.inner.lock();

        // 1. Circuit breaker.
        if inner.circuit_breaker_tripped {
            let tripped_at = inner.circuit_breaker_tripped_at.unwrap_or_else(Utc::now);
            if (Utc::now() - tripped_at).num_seconds() <= CIRCUIT_BREAKER_COOLDOWN_SECS {
                return Err(RejectReason::CircuitBreaker);
            }
            inner.circuit_breaker_tripped = false;
            inner.circuit_breaker_tripped_at = None;
        }

        // 2. Position limit (post-trade F position).
        let current_f = ledger.get(Venue::F);
        let post = match signal.direction {
            Direction::Long => current_f + signal.quantity,
            Direction::Short => current_f - signal.quantity,
        };
        if post > self.limits.max_position || post < -self.limits.max_position {
            return Err(RejectReason::PositionLimit);
        }

        // 3. Imbalance.
        if ledger.imbalance() > self.limits.max_imbalance {
            return Err(RejectReason::Imbalance);
        }

        // 4. Daily loss.
        if inner.daily_pnl < -self.limits.max_daily_loss {
            return Err(RejectReason::DailyLoss);
        }

        // 5. Error rate (only once enough trades have happened to be meaningful).
        if inner.trade_count > ERROR_RATE_MIN_TRADES {
            let rate = inner.error_count as f64 / inner.trade_count as f64;
            if rate > self.limits.max_error_rate {
                return Err(RejectReason::ErrorRate);
            }
        }

        Ok(())
    }

    pub fn record_trade(&self, success: bool, pnl: Decimal) {
        let mut inner = self.inner.lock();
        inner.trade_count += 1;
        inner.daily_pnl += pnl;
        if !success {
            Self::note_error(&mut inner);
        }
    }

    pub fn record_error(&self, kind: &str) {
        tracing::warn!(kind, "risk error recorded");
        let mut inner = self.inner.lock();
        Self::note_error(&mut inner);
    }

    fn note_error(inner: &mut Inner) {
        inner.error_count += 1;
        let now = Utc::now();
        inner.error_times.push_back(now);
        let cutoff = now - Duration::seconds(CIRCUIT_BREAKER_WINDOW_SECS);
        while inner
            .error_times
            .front()
            .map(|t| *t < cutoff)
            .unwrap_or(false)
        {
            inner.error_times.pop_front();
        }
        if inner.error_times.len() >= CIRCUIT_BREAKER_THRESHOLD && !inner.circuit_breaker_tripped {
            inner.circuit_breaker_tripped = true;
            inner.circuit_breaker_tripped_at = Some(now);
            tracing::error!(
                count = inner.error_times.len(),
                window_secs = CIRCUIT_BREAKER_WINDOW_SECS,
                "circuit breaker tripped"
            );
        }
    }

    pub fn circuit_breaker_tripped(&self) -> bool {
        self.inner.lock().circuit_breaker_tripped
    }

    /// Externally-updatable running daily PnL. Trade recording itself never
    /// computes a non-zero delta here; a real PnL source would call this.
    pub fn adjust_daily_pnl(&self, delta: Decimal) {
        self.inner.lock().daily_pnl += delta;
    }

    pub fn daily_pnl(&self) -> Decimal {
        self.inner.lock().daily_pnl
    }

    pub fn status(&self) -> RiskStatus {
        let inner = self.inner.lock();
        RiskStatus {
            daily_pnl: inner.daily_pnl,
            trade_count: inner.trade_count,
            error_count: inner.error_count,
            circuit_breaker_tripped: inner.circuit_breaker_tripped,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct RiskStatus {
    pub daily_pnl: Decimal,
    pub trade_count: u64,
    pub error_count: u64,
    pub circuit_breaker_tripped: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use rust_decimal_macros::dec;

    fn limits() -> RiskLimits {
        RiskLimits {
            max_position: dec!(0.01),
            max_imbalance: dec!(0.005),
            max_daily_loss: dec!(100),
            max_error_rate: 0.1,
        }
    }

    fn signal(direction: Direction, qty: Decimal) -> Signal {
        Signal {
            direction,
            client_order_id: "arb_test_1".to_string(),
            quantity: qty,
            f_price: dec!(100.0),
            l_reference_price: dec!(110.0),
            spread: dec!(10.0),
            confidence: 0.5,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_when_position_limit_would_be_exceeded() {
        let gate = RiskGate::new(limits());
        let ledger = PositionLedger::new();
        ledger.set(Venue::F, dec!(0.01));
        let sig = signal(Direction::Long, dec!(0.001));
        assert_eq!(gate.admit(&sig, &ledger), Err(RejectReason::PositionLimit));
    }

    #[test]
    fn circuit_breaker_trips_after_threshold_errors_and_cools_down() {
        let gate = RiskGate::new(limits());
        let ledger = PositionLedger::new();
        for _ in 0..10 {
            gate.record_error("test");
        }
        assert!(gate.circuit_breaker_tripped());
        let sig = signal(Direction::Long, dec!(0.001));
        assert_eq!(gate.admit(&sig, &ledger), Err(RejectReason::CircuitBreaker));
    }

    #[test]
    fn admits_well_formed_signal_under_all_limits() {
        let gate = RiskGate::new(limits());
        let ledger = PositionLedger::new();
        let sig = signal(Direction::Long, dec!(0.001));
        assert_eq!(gate.admit(&sig, &ledger), Ok(()));
    }
}
