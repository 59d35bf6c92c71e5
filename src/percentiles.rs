//! Round-trip latency percentiles using HDR Histogram.
//!
//! Feeds the end-of-run summary. Latencies are stored in microseconds,
//! clamped to the 1µs..=60s range the histogram is sized for.

use hdrhistogram::Histogram;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const MAX_TRACKED_US: u64 = 60_000_000;

/// Percentile statistics for a set of latency measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileStats {
    /// Number of samples
    pub count: u64,

    /// Minimum value (microseconds)
    pub min: u64,

    /// Maximum value (microseconds)
    pub max: u64,

    /// Mean value (microseconds)
    pub mean: f64,

    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p99_9: u64,
}

impl PercentileStats {
    /// Format statistics as a human-readable string.
    pub fn format(&self) -> String {
        format!(
            "count={}, min={:.2}ms, max={:.2}ms, mean={:.2}ms, p50={:.2}ms, p90={:.2}ms, p95={:.2}ms, p99={:.2}ms, p99.9={:.2}ms",
            self.count,
            self.min as f64 / 1000.0,
            self.max as f64 / 1000.0,
            self.mean / 1000.0,
            self.p50 as f64 / 1000.0,
            self.p90 as f64 / 1000.0,
            self.p95 as f64 / 1000.0,
            self.p99 as f64 / 1000.0,
            self.p99_9 as f64 / 1000.0,
        )
    }
}

/// Thread-safe latency tracker shared by all dispatch tasks of a run.
#[derive(Clone)]
pub struct LatencyTracker {
    histogram: Arc<Mutex<Histogram<u64>>>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_US, 3)
            .expect("histogram bounds are constant and valid");

        Self {
            histogram: Arc::new(Mutex::new(histogram)),
        }
    }

    pub fn record(&self, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(MAX_TRACKED_US);
        let clamped = latency_us.clamp(1, MAX_TRACKED_US);

        let mut hist = self
            .histogram
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = hist.record(clamped) {
            warn!(
                latency_us = latency_us,
                error = %e,
                "Failed to record latency in histogram"
            );
        }
    }

    /// Returns None if no samples have been recorded.
    pub fn stats(&self) -> Option<PercentileStats> {
        let hist = self
            .histogram
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if hist.is_empty() {
            return None;
        }

        Some(PercentileStats {
            count: hist.len(),
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p90: hist.value_at_quantile(0.90),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            p99_9: hist.value_at_quantile(0.999),
        })
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_has_no_stats() {
        assert!(LatencyTracker::new().stats().is_none());
    }

    #[test]
    fn percentiles_follow_recorded_distribution() {
        let tracker = LatencyTracker::new();
        for ms in 1..=100 {
            tracker.record(Duration::from_millis(ms));
        }

        let stats = tracker.stats().unwrap();
        assert_eq!(stats.count, 100);
        // 3 significant digits: within 0.1% of the true value.
        assert!((49_900..=50_100).contains(&stats.p50), "p50={}", stats.p50);
        assert!((98_900..=99_100).contains(&stats.p99), "p99={}", stats.p99);
        assert!(stats.min <= 1_001);
        assert!(stats.max >= 99_900);
    }

    #[test]
    fn out_of_range_latencies_are_clamped() {
        let tracker = LatencyTracker::new();
        tracker.record(Duration::ZERO);
        tracker.record(Duration::from_secs(600));

        let stats = tracker.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 1);
        assert!(stats.max >= MAX_TRACKED_US - MAX_TRACKED_US / 1000);
    }

    #[test]
    fn clones_record_into_same_histogram() {
        let tracker = LatencyTracker::new();
        let clone = tracker.clone();
        clone.record(Duration::from_millis(5));
        assert_eq!(tracker.stats().unwrap().count, 1);
    }

    #[test]
    fn format_reports_milliseconds() {
        let tracker = LatencyTracker::new();
        tracker.record(Duration::from_millis(20));
        let text = tracker.stats().unwrap().format();
        assert!(text.starts_with("count=1, "), "text: {}", text);
        assert!(text.contains("ms"));
    }
}
