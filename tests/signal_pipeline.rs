//! End-to-end pipeline test: book updates feed the signal engine, and an
//! emitted signal is checked against the risk gate the way the coordinator's
//! trading tick does it.

use arbxbot::book::BookStore;
use arbxbot::config::StrategyConfig;
use arbxbot::position::PositionLedger;
use arbxbot::risk::{RiskGate, RiskLimits};
use arbxbot::signal::SignalEngine;
use arbxbot::types::{Direction, Quote, Venue};
use rust_decimal_macros::dec;

fn strategy_cfg() -> StrategyConfig {
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

fn risk_limits() -> RiskLimits {
    RiskLimits {
        max_position: dec!(0.01),
        max_imbalance: dec!(0.005),
        max_daily_loss: dec!(100),
        max_error_rate: 0.1,
    }
}

#[test]
fn book_updates_flow_through_signal_engine_into_an_admitted_trade() {
    let book = BookStore::new();
    let ledger = PositionLedger::new();
    let risk = RiskGate::new(risk_limits());
    let engine = SignalEngine::new(strategy_cfg());
    engine.start();

    for _ in 0..3 {
        book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.2)));
        book.apply_top(Venue::L, Quote::new(dec!(100.1), dec!(100.3)));
        assert!(engine.check(&book, &ledger, 0).is_none());
    }
    assert!(!engine.status().is_sampling);

    book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.1)));
    book.apply_top(Venue::L, Quote::new(dec!(110.2), dec!(110.3)));
    let signal = engine
        .check(&book, &ledger, 0)
        .expect("spread should clear the learned threshold");
    assert_eq!(signal.direction, Direction::Long);

    risk.admit(&signal, &ledger)
        .expect("well-formed signal under all limits should be admitted");

    ledger.apply(Venue::F, signal.quantity);
    risk.record_trade(true, dec!(0));
    assert_eq!(ledger.get(Venue::F), dec!(0.001));
    assert_eq!(risk.status().trade_count, 1);
}

#[test]
fn position_limit_breach_blocks_an_otherwise_valid_signal() {
    let book = BookStore::new();
    let ledger = PositionLedger::new();
    let risk = RiskGate::new(risk_limits());
    let engine = SignalEngine::new(strategy_cfg());
    engine.start();

    for _ in 0..3 {
        book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.2)));
        book.apply_top(Venue::L, Quote::new(dec!(100.1), dec!(100.3)));
        engine.check(&book, &ledger, 0);
    }

    ledger.set(Venue::F, dec!(0.01));
    book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.1)));
    book.apply_top(Venue::L, Quote::new(dec!(110.2), dec!(110.3)));

    match engine.check(&book, &ledger, 0) {
        Some(signal) => {
            assert!(risk.admit(&signal, &ledger).is_err());
        }
        None => {
            // Signal engine itself already refuses to emit a long signal when
            // the post-trade position would clear max_position.
        }
    }
}

#[test]
fn circuit_breaker_blocks_admission_after_repeated_errors() {
    let ledger = PositionLedger::new();
    let risk = RiskGate::new(risk_limits());
    for _ in 0..10 {
        risk.record_error("bridge_timeout");
    }

    let engine = SignalEngine::new(strategy_cfg());
    engine.start();
    let book = BookStore::new();
    for _ in 0..3 {
        book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.2)));
        book.apply_top(Venue::L, Quote::new(dec!(100.1), dec!(100.3)));
        engine.check(&book, &ledger, 0);
    }
    book.apply_top(Venue::F, Quote::new(dec!(100.0), dec!(100.1)));
    book.apply_top(Venue::L, Quote::new(dec!(110.2), dec!(110.3)));
    let signal = engine.check(&book, &ledger, 0).expect("signal expected");

    assert!(risk.circuit_breaker_tripped());
    assert!(risk.admit(&signal, &ledger).is_err());
}
