//! Detection-cycle latency tracking, exposed at /stats/latency.

use std::sync::{Arc, Mutex};

use hdrhistogram::Histogram;
use serde::Serialize;

/// Per-game detection pipeline latency in milliseconds, 1ms..60s range.
pub struct LatencyStats {
    hist: Mutex<Histogram<u64>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencySnapshot {
    pub count: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyStats {
    pub fn new() -> Arc<Self> {
        // 3 significant figures is plenty for millisecond buckets.
        let hist = Histogram::new_with_bounds(1, 60_000, 3)
            .unwrap_or_else(|_| Histogram::new(3).unwrap_or_else(|_| unreachable!()));
        Arc::new(Self { hist: Mutex::new(hist) })
    }

    pub fn record_ms(&self, ms: u64) {
        if let Ok(mut hist) = self.hist.lock() {
            // saturating_record clamps values past the configured bound.
            hist.saturating_record(ms.max(1));
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        match self.hist.lock() {
            Ok(hist) => LatencySnapshot {
                count: hist.len(),
                p50_ms: hist.value_at_quantile(0.50),
                p95_ms: hist.value_at_quantile(0.95),
                p99_ms: hist.value_at_quantile(0.99),
                max_ms: hist.max(),
            },
            Err(_) => LatencySnapshot {
                count: 0,
                p50_ms: 0,
                p95_ms: 0,
                p99_ms: 0,
                max_ms: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports_percentiles() {
        let stats = LatencyStats::new();
        for ms in [5u64, 10, 15, 20, 100] {
            stats.record_ms(ms);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.count, 5);
        assert!(snap.p50_ms >= 10 && snap.p50_ms <= 20);
        assert!(snap.max_ms >= 100);
    }

    #[test]
    fn zero_latency_clamps_to_one() {
        let stats = LatencyStats::new();
        stats.record_ms(0);
        assert_eq!(stats.snapshot().count, 1);
    }
}
