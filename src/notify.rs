//! Operator notification channel.
//!
//! Pushed to, never pulled from: callers hand this a `StatusSnapshot` or an
//! event description and the notifier queues a message. It never holds a
//! reference back to the coordinator.

use crate::config::NotifierConfig;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 256;
const MIN_SEND_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub is_sampling: bool,
    pub signal_count: u64,
    pub trade_count: u64,
    pub edgex_position: Decimal,
    pub lighter_position: Decimal,
    pub net_position: Decimal,
    pub daily_pnl: Decimal,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
}

/// Rate-limited, queue-backed sender to an external chat endpoint.
pub struct Notifier {
    tx: mpsc::Sender<Outbound>,
    enabled: bool,
    account_label: String,
}

impl Notifier {
    pub fn new(cfg: NotifierConfig, http: reqwest::Client) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let enabled = cfg.enabled;
        let label = cfg.account_label.clone();
        if enabled {
            tokio::spawn(Self::sender_task(cfg, http, rx));
        } else {
            drop(rx);
        }
        Self {
            tx,
            enabled,
            account_label: label,
        }
    }

    async fn sender_task(cfg: NotifierConfig, http: reqwest::Client, mut rx: mpsc::Receiver<Outbound>) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", cfg.bot_token);
        while let Some(Outbound::Text(text)) = rx.recv().await {
            let body = serde_json::json!({ "chat_id": cfg.group_id, "text": text });
            if let Err(err) = http.post(&url).json(&body).send().await {
                tracing::warn!(error = %err, "failed to deliver operator notification");
            }
            tokio::time::sleep(Duration::from_millis(MIN_SEND_INTERVAL_MS)).await;
        }
    }

    fn enqueue(&self, text: String) {
        if !self.enabled {
            return;
        }
        if self.tx.try_send(Outbound::Text(text)).is_err() {
            tracing::warn!("operator notification queue full, dropping message");
        }
    }

    pub fn startup(&self, ticker: &str) {
        self.enqueue(format!("[{}] {} engine started", self.account_label, ticker));
    }

    pub fn shutdown(&self) {
        self.enqueue(format!("[{}] engine stopped", self.account_label));
    }

    pub fn frontend_connected(&self) {
        self.enqueue(format!("[{}] front-end venue connected", self.account_label));
    }

    pub fn frontend_disconnected(&self) {
        self.enqueue(format!(
            "[{}] front-end venue disconnected, pausing signals",
            self.account_label
        ));
    }

    pub fn sampling_complete(&self) {
        self.enqueue(format!(
            "[{}] sampling complete, thresholds learned",
            self.account_label
        ));
    }

    pub fn trade(&self, direction: &str, quantity: Decimal, spread: Decimal) {
        self.enqueue(format!(
            "[{}] trade: {} {} @ spread {}",
            self.account_label, direction, quantity, spread
        ));
    }

    pub fn error(&self, kind: &str, detail: &str) {
        self.enqueue(format!(
            "[{}] error[{}]: {}",
            self.account_label, kind, detail
        ));
    }

    pub fn circuit_breaker(&self, count: usize, window_secs: i64) {
        self.enqueue(format!(
            "[{}] CRITICAL: circuit breaker tripped ({} errors in {}s)",
            self.account_label, count, window_secs
        ));
    }

    pub fn status_report(&self, snapshot: &StatusSnapshot) {
        self.enqueue(format!(
            "[{}] status: running={} sampling={} signals={} trades={} net_pos={} daily_pnl={} avg_latency={:.1}ms",
            self.account_label,
            snapshot.is_running,
            snapshot.is_sampling,
            snapshot.signal_count,
            snapshot.trade_count,
            snapshot.net_position,
            snapshot.daily_pnl,
            snapshot.avg_latency_ms,
        ));
    }
}
