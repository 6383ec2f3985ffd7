//! Structured per-session data logging: CSV for trades/bbo/snapshots, and a
//! JSON-lines event stream, matching the original system's artifact layout.

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TRADE_FLUSH_COUNT: usize = 100;
const BBO_FLUSH_COUNT: usize = 100;
const SNAPSHOT_FLUSH_COUNT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub timestamp: i64,
    pub direction: String,
    pub edgex_side: String,
    pub lighter_side: String,
    pub quantity: Decimal,
    pub edgex_price: Decimal,
    pub lighter_price: Decimal,
    pub spread: Decimal,
    pub threshold: Decimal,
    pub edgex_order_id: String,
    pub lighter_order_id: String,
    pub edgex_fill_time_ms: f64,
    pub lighter_fill_time_ms: f64,
    pub total_latency_ms: f64,
    pub pnl_estimate: Decimal,
    pub edgex_position_after: Decimal,
    pub lighter_position_after: Decimal,
    pub net_position_after: Decimal,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BboRecord {
    pub timestamp: i64,
    pub edgex_bid: Decimal,
    pub edgex_ask: Decimal,
    pub lighter_bid: Decimal,
    pub lighter_ask: Decimal,
    pub long_spread: Decimal,
    pub short_spread: Decimal,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub timestamp: i64,
    pub is_running: bool,
    pub is_sampling: bool,
    pub samples_collected: usize,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
    pub current_long_spread: Decimal,
    pub current_short_spread: Decimal,
    pub edgex_position: Decimal,
    pub lighter_position: Decimal,
    pub net_position: Decimal,
    pub signal_count: u64,
    pub trade_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub daily_pnl: Decimal,
    pub avg_latency_ms: f64,
    pub latency_p95_ms: f64,
}

struct Buffers {
    trades: Vec<TradeRecord>,
    bbo: Vec<BboRecord>,
    snapshots: Vec<SnapshotRecord>,
    recent_trades: std::collections::VecDeque<TradeRecord>,
    recent_bbo: std::collections::VecDeque<BboRecord>,
}

/// Owns the buffered CSV and JSON-lines writers for one trading session.
pub struct SessionLogger {
    trades_path: PathBuf,
    bbo_path: PathBuf,
    snapshots_path: PathBuf,
    events_path: PathBuf,
    export_path: PathBuf,
    buffers: Mutex<Buffers>,
}

impl SessionLogger {
    pub fn new(log_dir: &str, ticker: &str, session_id: &str) -> std::io::Result<Self> {
        let dir = Path::new(log_dir);
        fs::create_dir_all(dir)?;
        let prefix = format!("{}_{}", ticker, session_id);
        let events_path = dir.join(format!("{}_events.jsonl", prefix));
        File::create(&events_path)?;
        Ok(Self {
            trades_path: dir.join(format!("{}_trades.csv", prefix)),
            bbo_path: dir.join(format!("{}_bbo.csv", prefix)),
            snapshots_path: dir.join(format!("{}_snapshots.csv", prefix)),
            events_path,
            export_path: dir.join(format!("{}_export.json", prefix)),
            buffers: Mutex::new(Buffers {
                trades: Vec::new(),
                bbo: Vec::new(),
                snapshots: Vec::new(),
                recent_trades: std::collections::VecDeque::with_capacity(50),
                recent_bbo: std::collections::VecDeque::with_capacity(100),
            }),
        })
    }

    pub fn log_trade(&self, record: TradeRecord) {
        let mut buf = self.buffers.lock();
        if buf.recent_trades.len() >= 50 {
            buf.recent_trades.pop_front();
        }
        buf.recent_trades.push_back(record.clone());
        buf.trades.push(record);
        if buf.trades.len() >= TRADE_FLUSH_COUNT {
            Self::flush_csv(&self.trades_path, &mut buf.trades);
        }
    }

    pub fn log_bbo(&self, record: BboRecord) {
        let mut buf = self.buffers.lock();
        if buf.recent_bbo.len() >= 100 {
            buf.recent_bbo.pop_front();
        }
        buf.recent_bbo.push_back(record.clone());
        buf.bbo.push(record);
        if buf.bbo.len() >= BBO_FLUSH_COUNT {
            Self::flush_csv(&self.bbo_path, &mut buf.bbo);
        }
    }

    pub fn log_snapshot(&self, record: SnapshotRecord) {
        let mut buf = self.buffers.lock();
        buf.snapshots.push(record);
        if buf.snapshots.len() >= SNAPSHOT_FLUSH_COUNT {
            Self::flush_csv(&self.snapshots_path, &mut buf.snapshots);
        }
    }

    /// Immediate, unbuffered append for discrete lifecycle events.
    pub fn log_event(&self, event_type: &str, data: serde_json::Value) {
        let line = serde_json::json!({
            "timestamp": Utc::now().timestamp_millis(),
            "datetime": Utc::now().to_rfc3339(),
            "type": event_type,
            "data": data,
        });
        if let Ok(mut f) = OpenOptions::new().append(true).open(&self.events_path) {
            let _ = writeln!(f, "{}", line);
        }
    }

    fn flush_csv<T: Serialize>(path: &Path, rows: &mut Vec<T>) {
        if rows.is_empty() {
            return;
        }
        let write_header = !path.exists() || fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path);
        let file = match file {
            Ok(f) => f,
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to open csv log");
                return;
            }
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        for row in rows.drain(..) {
            if let Err(err) = writer.serialize(row) {
                tracing::warn!(error = %err, "failed to serialize csv row");
            }
        }
        let _ = writer.flush();
    }

    pub fn flush_all(&self) {
        let mut buf = self.buffers.lock();
        Self::flush_csv(&self.trades_path, &mut buf.trades);
        Self::flush_csv(&self.bbo_path, &mut buf.bbo);
        Self::flush_csv(&self.snapshots_path, &mut buf.snapshots);
    }

    /// Flush everything and write a consolidated analysis export.
    pub fn export_for_analysis(&self) {
        self.flush_all();
        let buf = self.buffers.lock();
        let export = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "recent_trades": buf.recent_trades.iter().collect::<Vec<_>>(),
            "recent_bbo": buf.recent_bbo.iter().collect::<Vec<_>>(),
            "analysis_hints": "trades.csv rows are keyed by client_order_id equivalent via edgex_order_id/lighter_order_id; join bbo.csv on nearest timestamp for pre-trade book context.",
        });
        if let Ok(mut f) = File::create(&self.export_path) {
            let _ = writeln!(f, "{}", serde_json::to_string_pretty(&export).unwrap_or_default());
        }
    }

    pub fn close(&self) {
        self.export_for_analysis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn writes_event_lines_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            SessionLogger::new(dir.path().to_str().unwrap(), "BTC", "test-session").unwrap();
        logger.log_event("frontend_ready", serde_json::json!({"exchange": "F"}));
        let contents = fs::read_to_string(dir.path().join("BTC_test-session_events.jsonl")).unwrap();
        assert!(contents.contains("frontend_ready"));
    }

    #[test]
    fn bbo_buffer_flushes_at_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            SessionLogger::new(dir.path().to_str().unwrap(), "BTC", "test-session").unwrap();
        for i in 0..BBO_FLUSH_COUNT {
            logger.log_bbo(BboRecord {
                timestamp: i as i64,
                edgex_bid: dec!(100.0),
                edgex_ask: dec!(100.2),
                lighter_bid: dec!(100.1),
                lighter_ask: dec!(100.3),
                long_spread: dec!(-0.1),
                short_spread: dec!(-0.3),
                long_threshold: dec!(9.9),
                short_threshold: dec!(9.7),
            });
        }
        let path = dir.path().join("BTC_test-session_bbo.csv");
        assert!(path.exists());
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.lines().count() > BBO_FLUSH_COUNT);
    }
}
