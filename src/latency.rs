//! Latency Meter: per-category bounded latency history and health scoring.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

const RING_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((pct * sorted.len() as f64).ceil() as usize)
        .saturating_sub(1)
        .min(sorted.len() - 1);
    sorted[idx]
}

#[derive(Default)]
struct Category {
    samples: VecDeque<f64>,
}

impl Category {
    fn push(&mut self, ms: f64) {
        if self.samples.len() >= RING_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(ms);
    }

    fn stats(&self) -> LatencyStats {
        if self.samples.is_empty() {
            return LatencyStats::default();
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let sum: f64 = sorted.iter().sum();
        LatencyStats {
            count: sorted.len(),
            avg_ms: sum / sorted.len() as f64,
            min_ms: sorted[0],
            max_ms: sorted[sorted.len() - 1],
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
        }
    }

    fn recent_avg(&self, n: usize) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let take = n.min(self.samples.len());
        let sum: f64 = self.samples.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }

    fn recent_max(&self, n: usize) -> Option<f64> {
        self.samples
            .iter()
            .rev()
            .take(n)
            .copied()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

/// Registry of named in-flight timers plus per-category latency history.
pub struct LatencyMeter {
    categories: Mutex<HashMap<String, Category>>,
    timers: Mutex<HashMap<String, chrono::DateTime<Utc>>>,
}

impl Default for LatencyMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyMeter {
    pub fn new() -> Self {
        Self {
            categories: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, category: &str, ms: f64) {
        metrics::histogram!("arbxbot_latency_ms").record(ms);
        self.categories
            .lock()
            .entry(category.to_string())
            .or_default()
            .push(ms);
    }

    pub fn start(&self, timer_id: &str) {
        self.timers.lock().insert(timer_id.to_string(), Utc::now());
    }

    /// Stop a previously started timer, recording the elapsed time under `category`.
    pub fn stop(&self, timer_id: &str, category: &str) -> Option<f64> {
        let started = self.timers.lock().remove(timer_id)?;
        let ms = (Utc::now() - started).num_milliseconds() as f64;
        self.record(category, ms);
        Some(ms)
    }

    pub fn stats(&self, category: &str) -> LatencyStats {
        self.categories
            .lock()
            .get(category)
            .map(Category::stats)
            .unwrap_or_default()
    }

    pub fn recent_avg(&self, category: &str, n: usize) -> Option<f64> {
        self.categories.lock().get(category)?.recent_avg(n)
    }

    pub fn recent_max(&self, category: &str, n: usize) -> Option<f64> {
        self.categories.lock().get(category)?.recent_max(n)
    }

    /// Estimated end-to-end front-end latency used by the signal engine's
    /// threshold penalty: recent F-order placement latency, else twice the
    /// recent websocket round-trip, else a 100ms default.
    pub fn estimate_frontend_latency(&self) -> f64 {
        if let Some(avg) = self.recent_avg("edgex_order", 10) {
            return avg;
        }
        if let Some(avg) = self.recent_avg("ws_rtt", 10) {
            return avg * 2.0;
        }
        100.0
    }

    /// Diagnostic health score in [0, 100], decaying for elevated tail latency.
    pub fn health_score(&self) -> f64 {
        let mut score: f64 = 100.0;
        for cat in ["edgex_order", "lighter_order", "ws_rtt"] {
            let stats = self.stats(cat);
            if stats.count == 0 {
                continue;
            }
            if stats.p95_ms > 200.0 {
                score -= 15.0;
            }
            if stats.max_ms > 500.0 {
                score -= 10.0;
            }
        }
        score.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_reflect_recorded_samples() {
        let meter = LatencyMeter::new();
        for ms in [10.0, 20.0, 30.0, 40.0, 50.0] {
            meter.record("edgex_order", ms);
        }
        let stats = meter.stats("edgex_order");
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min_ms, 10.0);
        assert_eq!(stats.max_ms, 50.0);
    }

    #[test]
    fn start_stop_records_elapsed_time() {
        let meter = LatencyMeter::new();
        meter.start("order-1");
        let ms = meter.stop("order-1", "edgex_order");
        assert!(ms.is_some());
        assert_eq!(meter.stats("edgex_order").count, 1);
    }

    #[test]
    fn estimate_frontend_latency_falls_back_through_tiers() {
        let meter = LatencyMeter::new();
        assert_eq!(meter.estimate_frontend_latency(), 100.0);
        meter.record("ws_rtt", 30.0);
        assert_eq!(meter.estimate_frontend_latency(), 60.0);
        meter.record("edgex_order", 75.0);
        assert_eq!(meter.estimate_frontend_latency(), 75.0);
    }
}
