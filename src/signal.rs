//! Signal Engine: adaptive-threshold sampler and LONG/SHORT signal generator.

use crate::book::BookStore;
use crate::config::StrategyConfig;
use crate::position::PositionLedger;
use crate::types::{generate_client_order_id, round_to_tick, Direction, Quote, Venue};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Signal {
    pub direction: Direction,
    pub client_order_id: String,
    pub quantity: Decimal,
    pub f_price: Decimal,
    pub l_reference_price: Decimal,
    pub spread: Decimal,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    pub is_running: bool,
    pub is_sampling: bool,
    pub samples_collected: usize,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
    pub signal_count: u64,
}

struct State {
    history_long: VecDeque<Decimal>,
    history_short: VecDeque<Decimal>,
    is_sampling: bool,
    running: bool,
    paused: bool,
    long_threshold: Decimal,
    short_threshold: Decimal,
    last_signal_at: Option<DateTime<Utc>>,
    signal_count: u64,
}

/// Samples dual-venue spreads, learns adaptive thresholds, and emits signals.
pub struct SignalEngine {
    cfg: StrategyConfig,
    state: Mutex<State>,
}

impl SignalEngine {
    pub fn new(cfg: StrategyConfig) -> Self {
        let base_long = cfg.long_threshold;
        let base_short = cfg.short_threshold;
        let min_samples = cfg.min_samples;
        Self {
            cfg,
            state: Mutex::new(State {
                history_long: VecDeque::with_capacity(min_samples * 2),
                history_short: VecDeque::with_capacity(min_samples * 2),
                is_sampling: min_samples > 0,
                running: false,
                paused: false,
                long_threshold: base_long,
                short_threshold: base_short,
                last_signal_at: None,
                signal_count: 0,
            }),
        }
    }

    pub fn start(&self) {
        self.state.lock().running = true;
    }

    pub fn stop(&self) {
        self.state.lock().running = false;
    }

    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
    }

    pub fn reset_sampling(&self) {
        let mut state = self.state.lock();
        state.history_long.clear();
        state.history_short.clear();
        state.is_sampling = self.cfg.min_samples > 0;
        state.long_threshold = self.cfg.long_threshold;
        state.short_threshold = self.cfg.short_threshold;
    }

    fn recompute_thresholds(state: &mut State, cfg: &StrategyConfig) {
        if !state.history_long.is_empty() {
            let mean: Decimal =
                state.history_long.iter().sum::<Decimal>() / Decimal::from(state.history_long.len());
            state.long_threshold = mean + cfg.threshold_offset;
        }
        if !state.history_short.is_empty() {
            let mean: Decimal = state.history_short.iter().sum::<Decimal>()
                / Decimal::from(state.history_short.len());
            state.short_threshold = mean + cfg.threshold_offset;
        }
    }

    /// Adaptive threshold with an integer-floor latency penalty, preserved
    /// bit-for-bit from the source this behavior was ported from: the
    /// division by 50 is integer division before the tick multiplication.
    fn latency_adjusted(base: Decimal, latency_ms: u64, tick_size: Decimal) -> Decimal {
        let steps = latency_ms / 50;
        base + Decimal::from(steps) * tick_size
    }

    /// One sampling/signal cycle. Returns `None` during sampling, while
    /// paused, while the minimum signal interval hasn't elapsed, or when no
    /// spread currently exceeds its adaptive threshold.
    pub fn check(&self, book: &BookStore, ledger: &PositionLedger, latency_ms: u64) -> Option<Signal> {
        let mut state = self.state.lock();
        if state.paused || !state.running {
            return None;
        }

        let (long_spread, short_spread) = book.spreads()?;

        if state.is_sampling {
            state.history_long.push_back(long_spread);
            state.history_short.push_back(short_spread);
            if state.history_long.len() as u64 >= self.cfg.min_samples as u64 {
                Self::recompute_thresholds(&mut state, &self.cfg);
                state.is_sampling = false;
            }
            return None;
        }

        let sample_idx = state.history_long.len();
        state.history_long.push_back(long_spread);
        state.history_short.push_back(short_spread);
        if state.history_long.len() > self.cfg.min_samples * 2 {
            state.history_long.pop_front();
        }
        if state.history_short.len() > self.cfg.min_samples * 2 {
            state.history_short.pop_front();
        }
        if sample_idx % 10 == 0 {
            Self::recompute_thresholds(&mut state, &self.cfg);
        }

        if let Some(last) = state.last_signal_at {
            if (Utc::now() - last) < Duration::milliseconds((self.cfg.min_signal_interval_secs * 1000.0) as i64)
            {
                return None;
            }
        }

        let adaptive_long =
            Self::latency_adjusted(state.long_threshold, latency_ms, self.cfg.tick_size);
        let adaptive_short =
            Self::latency_adjusted(state.short_threshold, latency_ms, self.cfg.tick_size);

        let f_top: Quote = book.top(Venue::F)?;
        let f_position = ledger.get(Venue::F);

        let signal = if long_spread > adaptive_long && f_position < self.cfg.max_position {
            let f_price = round_to_tick(f_top.ask - self.cfg.tick_size, self.cfg.tick_size);
            let excess = (long_spread - adaptive_long) / Decimal::TEN;
            Some((Direction::Long, f_price, long_spread, excess))
        } else if short_spread > adaptive_short && f_position > -self.cfg.max_position {
            let f_price = round_to_tick(f_top.bid + self.cfg.tick_size, self.cfg.tick_size);
            let excess = (short_spread - adaptive_short) / Decimal::TEN;
            Some((Direction::Short, f_price, short_spread, excess))
        } else {
            None
        };

        let (direction, f_price, spread, excess) = signal?;
        let l_top = book.top(Venue::L)?;
        let l_reference_price = match direction {
            Direction::Long => l_top.bid,
            Direction::Short => l_top.ask,
        };

        let now = Utc::now();
        state.last_signal_at = Some(now);
        state.signal_count += 1;
        let confidence = excess
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        Some(Signal {
            direction,
            client_order_id: generate_client_order_id(direction, now),
            quantity: self.cfg.order_quantity,
            f_price,
            l_reference_price,
            spread,
            confidence,
            created_at: now,
        })
    }

    pub fn status(&self) -> EngineStatus {
        let state = self.state.lock();
        EngineStatus {
            is_running: state.running,
            is_sampling: state.is_sampling,
            samples_collected: state.history_long.len(),
            long_threshold: state.long_threshold,
            short_threshold: state.short_threshold,
            signal_count: state.signal_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg() -> StrategyConfig {
        StrategyConfig {
            ticker: "BTC".to_string(),
            order_quantity: dec!(0.001),
            max_position: dec!(0.01),
            long_threshold: dec!(10),
            short_threshold: dec!(10),
            threshold_offset: dec!(10),
            min_samples: 3,
            min_signal_interval_secs: 0.0,
            tick_size: dec!(0.1),
            hedge_slippage_pct: dec!(0.005),
        }
    }

    fn feed(book: &BookStore, f_bid: Decimal, f_ask: Decimal, l_bid: Decimal, l_ask: Decimal) {
        book.apply_top(Venue::F, Quote::new(f_bid, f_ask));
        book.apply_top(Venue::L, Quote::new(l_bid, l_ask));
    }

    #[test]
    fn no_signal_while_sampling() {
        let engine = SignalEngine::new(cfg());
        engine.start();
        let book = BookStore::new();
        let ledger = PositionLedger::new();
        for _ in 0..2 {
            feed(&book, dec!(100.0), dec!(100.2), dec!(100.1), dec!(100.3));
            assert!(engine.check(&book, &ledger, 0).is_none());
        }
        assert!(engine.status().is_sampling);
    }

    #[test]
    fn emits_long_signal_after_sampling_completes() {
        let engine = SignalEngine::new(cfg());
        engine.start();
        let book = BookStore::new();
        let ledger = PositionLedger::new();
        for _ in 0..3 {
            feed(&book, dec!(100.0), dec!(100.2), dec!(100.1), dec!(100.3));
            engine.check(&book, &ledger, 0);
        }
        assert!(!engine.status().is_sampling);
        feed(&book, dec!(100.0), dec!(100.1), dec!(110.2), dec!(110.3));
        let sig = engine.check(&book, &ledger, 0).expect("signal expected");
        assert_eq!(sig.direction, Direction::Long);
        assert_eq!(sig.f_price, dec!(100.0));
        assert_eq!(sig.l_reference_price, dec!(110.2));
    }

    #[test]
    fn latency_penalty_can_suppress_a_signal() {
        let engine = SignalEngine::new(cfg());
        engine.start();
        let book = BookStore::new();
        let ledger = PositionLedger::new();
        for _ in 0..3 {
            feed(&book, dec!(100.0), dec!(100.2), dec!(100.1), dec!(100.3));
            engine.check(&book, &ledger, 0);
        }
        feed(&book, dec!(100.0), dec!(100.1), dec!(110.0), dec!(110.1));
        assert!(engine.check(&book, &ledger, 500).is_none());
    }
}
