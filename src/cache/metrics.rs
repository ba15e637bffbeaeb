//! Cache Metrics and Analytics
//!
//! Lock-free operation counters plus the read-only snapshot and analytics
//! report built from them and from entry-store state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::events::CacheEvent;
use super::pattern::AccessPattern;

/// Hit rate (percent) below which a recommendation is emitted
pub const LOW_HIT_RATE: f64 = 70.0;

/// Memory pressure (percent) above which a recommendation is emitted
pub const HIGH_MEMORY_PRESSURE: f64 = 80.0;

/// Compressed-entry share (percent) below which a recommendation is emitted
pub const LOW_COMPRESSION_RATIO: f64 = 30.0;

/// Mean reads per entry below which a recommendation is emitted
pub const LOW_AVERAGE_ACCESS: f64 = 2.0;

/// Operation counters
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_expirations(&self, n: u64) {
        self.expirations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Hits as a percentage of lookups (0 when there were none)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total * 100.0
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of cache health
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Percent of lookups that hit
    pub hit_rate: f64,
    /// Complement of `hit_rate` (0 when there were no lookups)
    pub miss_rate: f64,
    pub total_size: u64,
    pub entry_count: usize,
    /// Percent of live entries stored compressed
    pub compression_ratio: f64,
    /// Percent of the budget in use
    pub memory_pressure: f64,
    pub max_size_bytes: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Mean `access_count` over live entries
    pub average_access_count: f64,
    /// Percent of scored predictions that landed within tolerance
    pub predictive_accuracy: f64,
}

/// Lookup totals for one key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAccess {
    pub key: String,
    pub access_count: u64,
}

/// Diagnostic report for dashboards
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub metrics: MetricsSnapshot,
    /// Most-read keys, descending
    pub top_keys: Vec<KeyAccess>,
    pub access_patterns: BTreeMap<String, AccessPattern>,
    pub predictions: BTreeMap<String, DateTime<Utc>>,
    /// Oldest first
    pub recent_events: Vec<CacheEvent>,
    pub recommendations: Vec<String>,
}

/// Heuristic tuning advice derived from a snapshot
pub fn recommendations(m: &MetricsSnapshot) -> Vec<String> {
    let mut out = Vec::new();

    if m.hits + m.misses > 0 && m.hit_rate < LOW_HIT_RATE {
        out.push(format!(
            "Hit rate is {:.1}%: consider longer TTLs or caching more predictable keys",
            m.hit_rate
        ));
    }
    if m.memory_pressure > HIGH_MEMORY_PRESSURE {
        out.push(format!(
            "Memory pressure is {:.1}%: raise the budget or shorten the cleanup interval",
            m.memory_pressure
        ));
    }
    if m.entry_count > 0 && m.compression_ratio < LOW_COMPRESSION_RATIO {
        out.push(format!(
            "Only {:.1}% of entries are compressed: consider lowering the compression threshold",
            m.compression_ratio
        ));
    }
    if m.entry_count > 0 && m.average_access_count < LOW_AVERAGE_ACCESS {
        out.push(format!(
            "Entries are read {:.2} times on average: many values are written once and never reused",
            m.average_access_count
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            hits: 90,
            misses: 10,
            hit_rate: 90.0,
            miss_rate: 10.0,
            total_size: 100,
            entry_count: 10,
            compression_ratio: 50.0,
            memory_pressure: 10.0,
            max_size_bytes: 1000,
            evictions: 0,
            expirations: 0,
            average_access_count: 5.0,
            predictive_accuracy: 0.0,
        }
    }

    #[test]
    fn test_hit_rate_arithmetic() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.hit_rate(), 0.0);

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();

        assert_eq!(metrics.hits(), 2);
        assert_eq!(metrics.misses(), 1);
        assert!((metrics.hit_rate() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_counters_and_reset() {
        let metrics = CacheMetrics::new();
        metrics.record_set();
        metrics.record_delete();
        metrics.record_evictions(3);
        metrics.record_expirations(2);

        assert_eq!(metrics.sets(), 1);
        assert_eq!(metrics.deletes(), 1);
        assert_eq!(metrics.evictions(), 3);
        assert_eq!(metrics.expirations(), 2);

        metrics.reset();
        assert_eq!(metrics.evictions(), 0);
        assert_eq!(metrics.sets(), 0);
    }

    #[test]
    fn test_healthy_snapshot_has_no_recommendations() {
        assert!(recommendations(&snapshot()).is_empty());
    }

    #[test]
    fn test_each_recommendation_triggers() {
        let mut m = snapshot();
        m.hit_rate = 50.0;
        m.memory_pressure = 95.0;
        m.compression_ratio = 10.0;
        m.average_access_count = 1.0;

        let recs = recommendations(&m);
        assert_eq!(recs.len(), 4);
        assert!(recs[0].contains("Hit rate"));
        assert!(recs[1].contains("Memory pressure"));
        assert!(recs[2].contains("compressed"));
        assert!(recs[3].contains("written once"));
    }

    #[test]
    fn test_empty_cache_only_reports_pressure() {
        let mut m = snapshot();
        m.hits = 0;
        m.misses = 0;
        m.hit_rate = 0.0;
        m.entry_count = 0;
        m.compression_ratio = 0.0;
        m.average_access_count = 0.0;

        assert!(recommendations(&m).is_empty());
    }
}
