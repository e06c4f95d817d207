//! Metrics registry

use crate::Histogram;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe metrics registry.
///
/// One instance is created in `main` and handed down to every component;
/// nothing in the pipeline reaches for a global.
pub struct Metrics {
    counters: RwLock<HashMap<&'static str, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<&'static str, Arc<AtomicI64>>>,
    histograms: RwLock<HashMap<&'static str, Arc<Histogram>>>,
}

impl Metrics {
    /// Create a new registry
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    /// Increment a counter
    pub fn counter(&self, name: &'static str, delta: u64) {
        let counters = self.counters.read();
        if let Some(c) = counters.get(name) {
            c.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write();
        let c = counters
            .entry(name)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        c.fetch_add(delta, Ordering::Relaxed);
    }

    /// Set a gauge value
    pub fn gauge(&self, name: &'static str, value: i64) {
        let gauges = self.gauges.read();
        if let Some(g) = gauges.get(name) {
            g.store(value, Ordering::Relaxed);
            return;
        }
        drop(gauges);

        let mut gauges = self.gauges.write();
        let g = gauges
            .entry(name)
            .or_insert_with(|| Arc::new(AtomicI64::new(0)));
        g.store(value, Ordering::Relaxed);
    }

    /// Record a histogram observation
    pub fn histogram(&self, name: &'static str, value: f64) {
        let histograms = self.histograms.read();
        if let Some(h) = histograms.get(name) {
            h.observe(value);
            return;
        }
        drop(histograms);

        let mut histograms = self.histograms.write();
        let h = histograms
            .entry(name)
            .or_insert_with(|| Arc::new(Histogram::new()));
        h.observe(value);
    }

    /// Get a counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// Get a gauge value
    pub fn get_gauge(&self, name: &str) -> Option<i64> {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
    }

    /// Get histogram mean
    pub fn get_histogram_mean(&self, name: &str) -> Option<f64> {
        self.histograms.read().get(name).map(|h| h.mean())
    }

    /// All counter names and values
    pub fn all_counters(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// All gauge names and values
    pub fn all_gauges(&self) -> Vec<(String, i64)> {
        self.gauges
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// All histogram names with mean and count
    pub fn all_histograms(&self) -> Vec<(String, f64, u64)> {
        self.histograms
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), v.mean(), v.total_count()))
            .collect()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names;

    #[test]
    fn test_counter() {
        let metrics = Metrics::new();
        metrics.counter(names::VOTES_STORED, 1);
        metrics.counter(names::VOTES_STORED, 2);
        assert_eq!(metrics.get_counter(names::VOTES_STORED), Some(3));
    }

    #[test]
    fn test_gauge() {
        let metrics = Metrics::new();
        metrics.gauge(names::LEDGER_HEIGHT, 42);
        assert_eq!(metrics.get_gauge(names::LEDGER_HEIGHT), Some(42));
        metrics.gauge(names::LEDGER_HEIGHT, 43);
        assert_eq!(metrics.get_gauge(names::LEDGER_HEIGHT), Some(43));
    }

    #[test]
    fn test_histogram() {
        let metrics = Metrics::new();
        metrics.histogram(names::ROUND_DURATION_US, 100.0);
        metrics.histogram(names::ROUND_DURATION_US, 200.0);
        assert_eq!(metrics.get_histogram_mean(names::ROUND_DURATION_US), Some(150.0));
    }

    #[test]
    fn test_missing_metric() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get_counter("nope"), None);
        assert_eq!(metrics.get_gauge("nope"), None);
    }

    #[test]
    fn test_timed_macro() {
        let metrics = Metrics::new();
        let value = crate::timed!(metrics, names::ROUND_DURATION_US, { 7 });
        assert_eq!(value, 7);
        assert!(metrics.get_histogram_mean(names::ROUND_DURATION_US).is_some());
    }
}
