//! Coordinator: top-level driver wiring the Bridge Server, Venue-L Client,
//! Signal Engine, Risk Gate, Position Ledger, and Latency Meter into one
//! trading loop.

use crate::bridge::{BridgeEvent, BridgeServer};
use crate::config::{Config, StrategyConfig};
use crate::datalog::{BboRecord, SessionLogger, SnapshotRecord, TradeRecord};
use crate::latency::LatencyMeter;
use crate::notify::{Notifier, StatusSnapshot};
use crate::pending::{PendingOrder, PendingStatus};
use crate::position::PositionLedger;
use crate::risk::RiskGate;
use crate::signal::SignalEngine;
use crate::types::{Quote, Side, Venue};
use crate::venue_l::{VenueLClient, VenueLEvent};
use chrono::Utc;
use parking_lot::Mutex as SyncMutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Coordinator {
    cfg: StrategyConfig,
    hedge_slippage_pct: Decimal,
    book: Arc<crate::book::BookStore>,
    ledger: Arc<PositionLedger>,
    risk: Arc<RiskGate>,
    latency: Arc<LatencyMeter>,
    signal_engine: Arc<SignalEngine>,
    venue_l: Arc<VenueLClient>,
    bridge: Arc<BridgeServer>,
    notifier: Arc<Notifier>,
    logger: Arc<SessionLogger>,
    pending: SyncMutex<HashMap<String, PendingOrder>>,
    f_ready: AtomicBool,
    shutdown: AtomicBool,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        book: Arc<crate::book::BookStore>,
        ledger: Arc<PositionLedger>,
        risk: Arc<RiskGate>,
        latency: Arc<LatencyMeter>,
        signal_engine: Arc<SignalEngine>,
        venue_l: Arc<VenueLClient>,
        bridge: Arc<BridgeServer>,
        notifier: Arc<Notifier>,
        logger: Arc<SessionLogger>,
    ) -> Self {
        Self {
            cfg: config.strategy.clone(),
            hedge_slippage_pct: config.strategy.hedge_slippage_pct,
            book,
            ledger,
            risk,
            latency,
            signal_engine,
            venue_l,
            bridge,
            notifier,
            logger,
            pending: SyncMutex::new(HashMap::new()),
            f_ready: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    pub async fn run(
        &self,
        mut bridge_events: mpsc::Receiver<BridgeEvent>,
        mut venue_l_events: mpsc::Receiver<VenueLEvent>,
    ) {
        self.notifier.startup(&self.cfg.ticker);
        self.logger.log_event("startup", serde_json::json!({}));

        self.await_venue_l_subscription().await;

        let mut shutdown_poll = tokio::time::interval(Duration::from_millis(250));
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                self.shutdown_sequence().await;
                return;
            }
            tokio::select! {
                Some(event) = bridge_events.recv() => {
                    let is_frontend_ready = matches!(event, BridgeEvent::FrontendReady(_));
                    self.handle_bridge_event(event).await;
                    if is_frontend_ready {
                        break;
                    }
                }
                _ = shutdown_poll.tick() => {}
            }
        }

        let venue_l = self.venue_l.clone();
        if let Err(err) = self
            .ledger
            .sync_from_venue_l(|| async move { Ok::<Decimal, crate::position::PositionSyncError>(venue_l.get_position().await) })
            .await
        {
            tracing::warn!(error = %err, "initial venue-L position sync failed, starting from cached value");
        }

        self.signal_engine.start();

        let mut main_tick = tokio::time::interval(Duration::from_secs(1));
        let mut snapshot_tick = tokio::time::interval(Duration::from_secs(60));
        let mut status_tick = tokio::time::interval(Duration::from_secs(30));
        let mut sampling_notified = false;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            tokio::select! {
                Some(event) = bridge_events.recv() => {
                    self.handle_bridge_event(event).await;
                }
                Some(event) = venue_l_events.recv() => {
                    self.handle_venue_l_event(event).await;
                }
                _ = main_tick.tick() => {
                    self.trading_tick(&mut sampling_notified).await;
                }
                _ = snapshot_tick.tick() => {
                    self.emit_snapshot();
                }
                _ = status_tick.tick() => {
                    self.notifier.status_report(&self.status_snapshot());
                }
                else => break,
            }
        }

        self.shutdown_sequence().await;
    }

    /// Poll the venue-L client's subscription readiness at 100ms intervals,
    /// capped at 5 seconds, before proceeding with startup.
    async fn await_venue_l_subscription(&self) {
        for _ in 0..50 {
            if self.venue_l.is_connected() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tracing::warn!("venue-L subscription not ready after 5s, proceeding anyway");
    }

    async fn handle_venue_l_event(&self, event: VenueLEvent) {
        match event {
            VenueLEvent::OrderUpdate(update) => {
                if update.status == "FILLED" {
                    let filled: Decimal = update
                        .filled_size
                        .as_deref()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(Decimal::ZERO);
                    let delta = if update.side == "buy" { filled } else { -filled };
                    self.ledger.apply(Venue::L, delta);
                    self.logger.log_event(
                        "lighter_fill",
                        serde_json::json!({
                            "side": update.side,
                            "filled_size": filled.to_string(),
                        }),
                    );
                }
            }
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn trading_tick(&self, sampling_notified: &mut bool) {
        if !self.f_ready.load(Ordering::Relaxed) || !self.book.ready() {
            return;
        }

        let status = self.signal_engine.status();
        if !status.is_sampling && !*sampling_notified {
            *sampling_notified = true;
            self.notifier.sampling_complete();
        }

        if let Some((long_spread, short_spread)) = self.book.spreads() {
            if let (Some(f), Some(l)) = (self.book.top(Venue::F), self.book.top(Venue::L)) {
                self.logger.log_bbo(BboRecord {
                    timestamp: Utc::now().timestamp_millis(),
                    edgex_bid: f.bid,
                    edgex_ask: f.ask,
                    lighter_bid: l.bid,
                    lighter_ask: l.ask,
                    long_spread,
                    short_spread,
                    long_threshold: status.long_threshold,
                    short_threshold: status.short_threshold,
                });
            }
        }

        let latency_ms = self.latency.estimate_frontend_latency() as u64;
        let signal = match self.signal_engine.check(&self.book, &self.ledger, latency_ms) {
            Some(s) => s,
            None => return,
        };

        if let Err(reason) = self.risk.admit(&signal, &self.ledger) {
            tracing::debug!(?reason, "signal rejected by risk gate");
            return;
        }

        self.dispatch_signal(signal).await;
    }

    async fn dispatch_signal(&self, signal: crate::signal::Signal) {
        let client_order_id = signal.client_order_id.clone();
        self.latency.start(&client_order_id);
        self.logger.log_event(
            "signal",
            serde_json::json!({
                "direction": signal.direction.to_string(),
                "client_order_id": client_order_id,
                "spread": signal.spread.to_string(),
            }),
        );

        let f_side = match signal.direction {
            crate::types::Direction::Long => Side::Buy,
            crate::types::Direction::Short => Side::Sell,
        };

        self.pending
            .lock()
            .insert(client_order_id.clone(), PendingOrder::new(signal.clone()));

        self.bridge
            .execute_order(&f_side.to_string(), signal.quantity, signal.f_price, &client_order_id)
            .await;
    }

    async fn handle_bridge_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::FrontendReady(_) => {
                self.f_ready.store(true, Ordering::Relaxed);
                self.notifier.frontend_connected();
                self.logger.log_event("frontend_ready", serde_json::json!({}));
            }
            BridgeEvent::Disconnected => {
                self.f_ready.store(false, Ordering::Relaxed);
                self.signal_engine.pause();
                self.risk.record_error("frontend_disconnect");
                self.notifier.frontend_disconnected();
                self.logger.log_event("frontend_disconnect", serde_json::json!({}));
            }
            BridgeEvent::MarketData(md) => {
                let mut quote = Quote::new(md.best_bid, md.best_ask);
                quote.bid_size = md.bid_size;
                quote.ask_size = md.ask_size;
                self.book.apply_top(Venue::F, quote);
            }
            BridgeEvent::OrderPlaced(placed) => {
                if let Some(ms) = self.latency.stop(&placed.client_order_id, "edgex_order") {
                    tracing::debug!(ms, client_order_id = %placed.client_order_id, "F-leg placement latency");
                }
                if placed.success {
                    let mut pending = self.pending.lock();
                    if let Some(order) = pending.get_mut(&placed.client_order_id) {
                        order.status = PendingStatus::Placed;
                        order.f_order_id = placed.order_id.clone();
                    }
                } else {
                    self.risk.record_error("order_failed");
                    self.pending.lock().remove(&placed.client_order_id);
                    self.notifier.error("order_failed", &placed.error.unwrap_or_default());
                }
            }
            BridgeEvent::OrderUpdate(update) => {
                self.handle_order_update(update).await;
            }
        }
    }

    async fn handle_order_update(&self, update: crate::bridge::wire::OrderUpdate) {
        use crate::bridge::wire::OrderStatus;

        let pending = self.pending.lock().remove(&update.client_order_id);
        let Some(order) = pending else { return };

        match update.status {
            OrderStatus::Filled => {
                let filled = update.filled_size.unwrap_or(order.signal.quantity);
                let f_side = match order.signal.direction {
                    crate::types::Direction::Long => Side::Buy,
                    crate::types::Direction::Short => Side::Sell,
                };
                let delta = match f_side {
                    Side::Buy => filled,
                    Side::Sell => -filled,
                };
                self.ledger.apply(Venue::F, delta);

                let hedge_result = self.hedge(f_side, filled).await;
                let success = hedge_result.is_ok();
                self.risk.record_trade(success, Decimal::ZERO);

                self.notifier
                    .trade(&order.signal.direction.to_string(), filled, order.signal.spread);

                self.logger.log_trade(TradeRecord {
                    timestamp: Utc::now().timestamp_millis(),
                    direction: order.signal.direction.to_string(),
                    edgex_side: f_side.to_string(),
                    lighter_side: f_side.opposite().to_string(),
                    quantity: filled,
                    edgex_price: update.price.unwrap_or(order.signal.f_price),
                    lighter_price: order.signal.l_reference_price,
                    spread: order.signal.spread,
                    threshold: Decimal::ZERO,
                    edgex_order_id: order.f_order_id.clone().unwrap_or_default(),
                    lighter_order_id: hedge_result.as_ref().ok().cloned().unwrap_or_default(),
                    edgex_fill_time_ms: 0.0,
                    lighter_fill_time_ms: 0.0,
                    total_latency_ms: 0.0,
                    pnl_estimate: Decimal::ZERO,
                    edgex_position_after: self.ledger.get(Venue::F),
                    lighter_position_after: self.ledger.get(Venue::L),
                    net_position_after: self.ledger.net(),
                    status: if success { "filled".to_string() } else { "partial".to_string() },
                });
            }
            OrderStatus::Canceled => {
                self.logger.log_event(
                    "order_canceled",
                    serde_json::json!({"client_order_id": update.client_order_id}),
                );
            }
            _ => {}
        }
    }

    /// Place the opposite-side aggressive order on venue L and start/stop the
    /// `lighter_order` latency timer around it.
    async fn hedge(&self, f_side: Side, quantity: Decimal) -> Result<String, ()> {
        let l_side = f_side.opposite();
        let timer_id = format!("hedge-{}", Utc::now().timestamp_millis());
        self.latency.start(&timer_id);
        let result = self
            .venue_l
            .place_aggressive(l_side, quantity, None, self.hedge_slippage_pct)
            .await;
        self.latency.stop(&timer_id, "lighter_order");

        match result {
            Ok(placement) => {
                self.ledger.apply(
                    Venue::L,
                    match l_side {
                        Side::Buy => quantity,
                        Side::Sell => -quantity,
                    },
                );
                Ok(placement.order_index.map(|i| i.to_string()).unwrap_or_default())
            }
            Err(err) => {
                self.risk.record_error("hedge_failed");
                self.notifier.error("hedge_failed", &err.to_string());
                Err(())
            }
        }
    }

    fn emit_snapshot(&self) {
        let status = self.signal_engine.status();
        let risk_status = self.risk.status();
        let (long_spread, short_spread) = self.book.spreads().unwrap_or((Decimal::ZERO, Decimal::ZERO));
        let latency_stats = self.latency.stats("edgex_order");
        self.logger.log_snapshot(SnapshotRecord {
            timestamp: Utc::now().timestamp_millis(),
            is_running: status.is_running,
            is_sampling: status.is_sampling,
            samples_collected: status.samples_collected,
            long_threshold: status.long_threshold,
            short_threshold: status.short_threshold,
            current_long_spread: long_spread,
            current_short_spread: short_spread,
            edgex_position: self.ledger.get(Venue::F),
            lighter_position: self.ledger.get(Venue::L),
            net_position: self.ledger.net(),
            signal_count: status.signal_count,
            trade_count: risk_status.trade_count,
            success_count: risk_status.trade_count.saturating_sub(risk_status.error_count),
            error_count: risk_status.error_count,
            daily_pnl: risk_status.daily_pnl,
            avg_latency_ms: latency_stats.avg_ms,
            latency_p95_ms: latency_stats.p95_ms,
        });
    }

    fn status_snapshot(&self) -> StatusSnapshot {
        let status = self.signal_engine.status();
        let risk_status = self.risk.status();
        StatusSnapshot {
            is_running: status.is_running,
            is_sampling: status.is_sampling,
            signal_count: status.signal_count,
            trade_count: risk_status.trade_count,
            edgex_position: self.ledger.get(Venue::F),
            lighter_position: self.ledger.get(Venue::L),
            net_position: self.ledger.net(),
            daily_pnl: risk_status.daily_pnl,
            avg_latency_ms: self.latency.stats("edgex_order").avg_ms,
        }
    }

    /// Best-effort flatten of both venues' positions.
    async fn emergency_flatten(&self) {
        let f_pos = self.ledger.get(Venue::F);
        if !f_pos.is_zero() {
            let side = if f_pos > Decimal::ZERO { Side::Sell } else { Side::Buy };
            self.bridge.emergency_close(&side.to_string(), f_pos.abs()).await;
        }
        if !self.ledger.get(Venue::L).is_zero() {
            if let Err(err) = self.venue_l.flatten_position(self.hedge_slippage_pct).await {
                tracing::warn!(error = %err, "failed to flatten venue-L position during shutdown");
            }
        }
    }

    async fn shutdown_sequence(&self) {
        self.signal_engine.stop();
        self.emergency_flatten().await;
        self.notifier.shutdown();
        self.logger.log_event("shutdown", serde_json::json!({}));
        self.logger.close();
    }
}
