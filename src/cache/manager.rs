//! Adaptive Cache - Entry Store Facade
//!
//! Owns the key -> entry mapping and the running size total, and wires the
//! codec, pattern tracker, predictor, classifier, pressure monitor and
//! eviction engine together on the serialized mutation path.
//!
//! All mutations of the mapping, the size total and the pattern/prediction
//! tables happen under one mutex; compression and decompression run outside
//! it.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{to_chrono, Clock, SystemClock};
use super::compression::{CompressionConfig, PayloadCodec};
use super::entry::{CacheEntry, SetOptions};
use super::events::{CacheEvent, EventKind, EventLog, DEFAULT_EVENT_CAPACITY};
use super::metrics::{recommendations, AnalyticsReport, CacheMetrics, KeyAccess, MetricsSnapshot};
use super::pattern::{AccessPattern, PatternTracker};
use super::policy::{
    plan_eviction, CleanupReason, EvictionPlan, EvictionStrategy, DEFAULT_LAST_RESORT_RATIO,
};
use super::prediction::PredictionTracker;
use super::pressure::{BudgetMode, MemoryPressureMonitor};
use super::priority;
use crate::error::{Error, Result};

/// Default memory budget (50MB)
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Default entry TTL (1 hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default retention of patterns for non-resident keys (1 day)
pub const DEFAULT_PATTERN_RETENTION_SECS: u64 = 86_400;

/// Default cap on the pattern table
pub const DEFAULT_MAX_PATTERNS: usize = 100_000;

// =============================================================================
// Configuration
// =============================================================================

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Memory budget for stored payloads
    pub max_size_bytes: u64,
    /// TTL applied when a write does not carry one
    pub default_ttl_secs: u64,
    /// Eviction ordering
    pub strategy: EvictionStrategy,
    /// Soft or hard memory budget
    pub budget_mode: BudgetMode,
    /// Payload compression
    pub compression: CompressionConfig,
    /// Expiry sweep interval
    pub cleanup_interval_secs: u64,
    /// Access-pattern persistence interval
    pub persist_interval_secs: u64,
    /// Event ring buffer size
    pub event_log_capacity: usize,
    /// Keys listed in `AnalyticsReport::top_keys`
    pub analytics_top_n: usize,
    /// Events listed in `AnalyticsReport::recent_events`
    pub analytics_recent_events: usize,
    /// Freed share of the requirement below which critical entries are evicted
    pub critical_last_resort_ratio: f64,
    /// Idle time after which the pattern of a non-resident key is dropped
    pub pattern_retention_secs: u64,
    /// Pattern table size enforced by the expiry sweep
    pub max_patterns: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            default_ttl_secs: DEFAULT_TTL_SECS,
            strategy: EvictionStrategy::default(),
            budget_mode: BudgetMode::default(),
            compression: CompressionConfig::default(),
            cleanup_interval_secs: 300,
            persist_interval_secs: 300,
            event_log_capacity: DEFAULT_EVENT_CAPACITY,
            analytics_top_n: 10,
            analytics_recent_events: 50,
            critical_last_resort_ratio: DEFAULT_LAST_RESORT_RATIO,
            pattern_retention_secs: DEFAULT_PATTERN_RETENTION_SECS,
            max_patterns: DEFAULT_MAX_PATTERNS,
        }
    }
}

impl CacheConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(Error::Config("max_size_bytes must be positive".into()));
        }
        if self.default_ttl_secs == 0 {
            return Err(Error::Config("default_ttl_secs must be positive".into()));
        }
        if self.cleanup_interval_secs == 0 || self.persist_interval_secs == 0 {
            return Err(Error::Config("intervals must be positive".into()));
        }
        if self.pattern_retention_secs == 0 {
            return Err(Error::Config("pattern_retention_secs must be positive".into()));
        }
        if self.max_patterns == 0 {
            return Err(Error::Config("max_patterns must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.critical_last_resort_ratio) {
            return Err(Error::Config(format!(
                "critical_last_resort_ratio {} outside 0.0..=1.0",
                self.critical_last_resort_ratio
            )));
        }
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }

    pub fn pattern_retention(&self) -> Duration {
        Duration::from_secs(self.pattern_retention_secs)
    }
}

// =============================================================================
// Store State
// =============================================================================

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, CacheEntry>,
    /// Always the sum of `entries[*].size_bytes`
    total_size: u64,
    patterns: PatternTracker,
    predictions: PredictionTracker,
}

impl StoreState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_size -= entry.size_bytes;
        Some(entry)
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.total_size += entry.size_bytes;
        if let Some(old) = self.entries.insert(entry.key.clone(), entry) {
            self.total_size -= old.size_bytes;
        }
    }
}

/// Result of a direct eviction request
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionOutcome {
    pub evicted: Vec<String>,
    pub freed_bytes: u64,
    pub critical_evicted: usize,
}

// =============================================================================
// Adaptive Cache
// =============================================================================

/// Adaptive in-process cache
pub struct AdaptiveCache {
    config: CacheConfig,
    codec: PayloadCodec,
    monitor: MemoryPressureMonitor,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
    metrics: CacheMetrics,
    events: EventLog,
}

impl AdaptiveCache {
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Result<Arc<Self>> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        let codec = PayloadCodec::with_config(config.compression.clone());
        Self::with_codec(config, clock, codec)
    }

    /// Create a cache with a caller-supplied payload codec.
    ///
    /// `config.compression` is ignored in favour of the codec's own settings.
    pub fn with_codec(
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        codec: PayloadCodec,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        info!(
            max_size_bytes = config.max_size_bytes,
            strategy = %config.strategy,
            budget_mode = ?config.budget_mode,
            "Creating adaptive cache"
        );

        Ok(Arc::new(Self {
            codec,
            monitor: MemoryPressureMonitor::new(config.max_size_bytes, config.budget_mode),
            events: EventLog::new(config.event_log_capacity),
            state: Mutex::new(StoreState::default()),
            metrics: CacheMetrics::new(),
            clock,
            config,
        }))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the decoded bytes stored under `key`.
    ///
    /// Expired entries are removed and reported as a miss.
    pub fn get_bytes(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();

        let (payload, compressed) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let expired = match state.entries.get(key) {
                None => {
                    self.record_miss(key, now);
                    return None;
                }
                Some(entry) => entry.is_expired(now),
            };

            if expired {
                if let Some(entry) = state.remove(key) {
                    state.predictions.remove(key);
                    self.metrics.record_expirations(1);
                    self.record_cleanup(&entry, CleanupReason::Expired, None, now);
                }
                self.record_miss(key, now);
                return None;
            }

            state.predictions.score(key, now);
            let pattern = state.patterns.record_access(key, now);
            let predicted = state.predictions.predict(key, &pattern, now);

            let entry = state.entries.get_mut(key)?;
            entry.record_access(now);
            entry.metadata.predicted_next_access = Some(predicted);
            entry.metadata.access_pattern = pattern;

            self.metrics.record_hit();
            self.events.record(Some(key), EventKind::Hit, now);
            (entry.payload.clone(), entry.compressed)
        };

        Some(self.codec.decode(&payload, compressed))
    }

    /// Get and deserialize the value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get_bytes(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached value could not be decoded");
                None
            }
        }
    }

    /// Whether a live entry exists (no access bookkeeping)
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .entries
            .get(key)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Copy of the stored entry (no access bookkeeping)
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Serialize `value` and store it under `key`
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set_bytes(key, &bytes, options)
    }

    /// Store already-serialized bytes under `key`
    pub fn set_bytes(&self, key: &str, data: &[u8], options: SetOptions) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        let ttl = options.ttl.unwrap_or_else(|| self.config.default_ttl());
        if ttl.is_zero() {
            return Err(Error::InvalidTtl {
                key: key.to_string(),
                reason: "TTL must be greater than zero".into(),
            });
        }
        options.metadata.validate(key)?;

        let encoded = self.codec.try_encode(data)?;
        let size = encoded.payload.len() as u64;

        if self.monitor.mode() == BudgetMode::Hard && size > self.monitor.max_bytes() {
            return Err(Error::CapacityExceeded {
                key: key.to_string(),
                required: size,
                budget: self.monitor.max_bytes(),
            });
        }

        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let replaced = state.entries.get(key).map(|e| e.size_bytes).unwrap_or(0);
        let current = state.total_size - replaced;

        let bytes_needed = self.monitor.bytes_needed(current, size);
        if bytes_needed > 0 {
            self.evict_locked(state, bytes_needed, Some(key), now);
        }

        let current = state.total_size - state.entries.get(key).map(|e| e.size_bytes).unwrap_or(0);
        self.monitor.admit(key, current, size)?;

        let pattern = state.patterns.pattern_or_default(key);
        let mut metadata = options.metadata.into_metadata();
        let priority = options.priority.unwrap_or_else(|| {
            priority::classify(
                metadata.computation_cost,
                metadata.dependencies.len(),
                &pattern,
            )
        });
        metadata.predicted_next_access = Some(state.predictions.predict(key, &pattern, now));
        metadata.access_pattern = pattern;

        state.insert(CacheEntry {
            key: key.to_string(),
            payload: encoded.payload,
            compressed: encoded.compressed,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            size_bytes: size,
            priority,
            tags: options.tags.into_iter().collect(),
            metadata,
        });

        self.metrics.record_set();
        self.events.record(
            Some(key),
            EventKind::Set {
                size_bytes: size,
                compressed: encoded.compressed,
            },
            now,
        );
        debug!(
            key = %key,
            size_bytes = size,
            compressed = encoded.compressed,
            ratio = encoded.ratio,
            priority = %priority,
            "Cached entry"
        );
        Ok(())
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove an entry; returns whether anything was removed
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.delete_locked(&mut state, key, now)
    }

    fn delete_locked(&self, state: &mut StoreState, key: &str, now: DateTime<Utc>) -> bool {
        let Some(_) = state.remove(key) else {
            return false;
        };
        state.patterns.remove(key);
        state.predictions.remove(key);
        self.metrics.record_delete();
        self.events.record(Some(key), EventKind::Delete, now);
        true
    }

    /// Remove every entry carrying `tag`; returns the number removed
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let keys: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.has_tag(tag))
            .map(|e| e.key.clone())
            .collect();

        let removed = keys
            .iter()
            .filter(|key| self.delete_locked(&mut state, key, now))
            .count();

        debug!(tag = %tag, removed, "Invalidated entries by tag");
        removed
    }

    /// Remove all entries, patterns and predictions
    pub fn clear(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let entries = state.entries.len();

        state.entries.clear();
        state.total_size = 0;
        state.patterns.clear();
        state.predictions.clear();

        self.events.record(None, EventKind::Clear { entries }, now);
        info!(entries, "Cache cleared");
    }

    /// Remove all expired entries; returns the number removed
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = state.remove(key) {
                state.predictions.remove(key);
                self.record_cleanup(&entry, CleanupReason::Expired, None, now);
            }
        }

        if !expired.is_empty() {
            self.metrics.record_expirations(expired.len() as u64);
            debug!(removed = expired.len(), "Expiry sweep removed entries");
        }

        let cutoff = now
            .checked_sub_signed(to_chrono(self.config.pattern_retention()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let StoreState {
            entries, patterns, ..
        } = state;
        let pruned = patterns.prune(cutoff, self.config.max_patterns, |key| {
            entries.contains_key(key)
        });
        if pruned > 0 {
            debug!(pruned, patterns = patterns.len(), "Dropped idle access patterns");
        }
        expired.len()
    }

    /// Run the eviction engine for `bytes_needed` bytes
    pub fn evict(&self, bytes_needed: u64) -> EvictionOutcome {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let plan = self.evict_locked(&mut state, bytes_needed, None, now);
        EvictionOutcome {
            evicted: plan.victims.into_iter().map(|(k, _)| k).collect(),
            freed_bytes: plan.freed_bytes,
            critical_evicted: plan.critical_evicted,
        }
    }

    fn evict_locked(
        &self,
        state: &mut StoreState,
        bytes_needed: u64,
        exclude: Option<&str>,
        now: DateTime<Utc>,
    ) -> EvictionPlan {
        let strategy = self.config.strategy;
        let plan = plan_eviction(
            state
                .entries
                .values()
                .filter(|e| Some(e.key.as_str()) != exclude),
            strategy,
            bytes_needed,
            self.config.critical_last_resort_ratio,
            now,
        );

        for (key, _) in &plan.victims {
            if let Some(entry) = state.remove(key) {
                state.predictions.remove(key);
                self.record_cleanup(&entry, CleanupReason::MemoryPressure, Some(strategy), now);
            }
        }

        if plan.critical_evicted > 0 {
            warn!(
                critical_evicted = plan.critical_evicted,
                bytes_needed,
                "Evicted critical entries as last resort"
            );
        }
        if !plan.is_empty() {
            self.metrics.record_evictions(plan.victims.len() as u64);
            debug!(
                bytes_needed,
                freed_bytes = plan.freed_bytes,
                evicted = plan.victims.len(),
                strategy = %strategy,
                "Eviction pass complete"
            );
        }
        plan
    }

    fn record_cleanup(
        &self,
        entry: &CacheEntry,
        reason: CleanupReason,
        strategy: Option<EvictionStrategy>,
        now: DateTime<Utc>,
    ) {
        self.events.record(
            Some(&entry.key),
            EventKind::Cleanup {
                reason,
                strategy,
                size_bytes: entry.size_bytes,
            },
            now,
        );
    }

    fn record_miss(&self, key: &str, now: DateTime<Utc>) {
        self.metrics.record_miss();
        self.events.record(Some(key), EventKind::Miss, now);
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of stored entries (including not-yet-swept expired ones)
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Sum of stored entry sizes
    pub fn total_size(&self) -> u64 {
        self.state.lock().total_size
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Recompute the size total from the entries (diagnostics)
    pub fn recomputed_size(&self) -> u64 {
        self.state.lock().entries.values().map(|e| e.size_bytes).sum()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn counters(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Copy of the access-pattern table
    pub fn patterns_snapshot(&self) -> HashMap<String, AccessPattern> {
        self.state.lock().patterns.snapshot()
    }

    /// Merge a persisted access-pattern table; returns patterns added
    pub fn restore_patterns(&self, patterns: HashMap<String, AccessPattern>) -> usize {
        self.state.lock().patterns.restore(patterns)
    }

    // =========================================================================
    // Metrics & Analytics
    // =========================================================================

    /// Current metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let (total_size, entry_count, compressed, accesses, accuracy) = {
            let state = self.state.lock();
            let compressed = state.entries.values().filter(|e| e.compressed).count();
            let accesses: u64 = state.entries.values().map(|e| e.access_count).sum();
            (
                state.total_size,
                state.entries.len(),
                compressed,
                accesses,
                state.predictions.accuracy(),
            )
        };

        let hits = self.metrics.hits();
        let misses = self.metrics.misses();
        let hit_rate = self.metrics.hit_rate();
        let miss_rate = if hits + misses == 0 { 0.0 } else { 100.0 - hit_rate };
        let (compression_ratio, average_access_count) = if entry_count == 0 {
            (0.0, 0.0)
        } else {
            (
                compressed as f64 / entry_count as f64 * 100.0,
                accesses as f64 / entry_count as f64,
            )
        };

        MetricsSnapshot {
            hits,
            misses,
            hit_rate,
            miss_rate,
            total_size,
            entry_count,
            compression_ratio,
            memory_pressure: self.monitor.pressure(total_size),
            max_size_bytes: self.monitor.max_bytes(),
            evictions: self.metrics.evictions(),
            expirations: self.metrics.expirations(),
            average_access_count,
            predictive_accuracy: accuracy,
        }
    }

    /// Full analytics report
    pub fn get_analytics(&self) -> AnalyticsReport {
        let metrics = self.get_metrics();

        let (top_keys, access_patterns, predictions) = {
            let state = self.state.lock();
            let mut top: Vec<KeyAccess> = state
                .entries
                .values()
                .map(|e| KeyAccess {
                    key: e.key.clone(),
                    access_count: e.access_count,
                })
                .collect();
            top.sort_by(|a, b| {
                b.access_count
                    .cmp(&a.access_count)
                    .then_with(|| a.key.cmp(&b.key))
            });
            top.truncate(self.config.analytics_top_n);

            let patterns: BTreeMap<_, _> = state.patterns.snapshot().into_iter().collect();
            let predictions: BTreeMap<_, _> = state.predictions.snapshot().into_iter().collect();
            (top, patterns, predictions)
        };

        let recent_events: Vec<CacheEvent> =
            self.events.recent(self.config.analytics_recent_events);

        AnalyticsReport {
            recommendations: recommendations(&metrics),
            metrics,
            top_keys,
            access_patterns,
            predictions,
            recent_events,
        }
    }
}

impl std::fmt::Debug for AdaptiveCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AdaptiveCache")
            .field("entries", &state.entries.len())
            .field("total_size", &state.total_size)
            .field("max_size_bytes", &self.config.max_size_bytes)
            .field("strategy", &self.config.strategy)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::compression::CompressionAlgorithm;
    use crate::cache::priority::Priority;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap(),
        ))
    }

    fn uncompressed(max: u64, strategy: EvictionStrategy) -> CacheConfig {
        CacheConfig {
            max_size_bytes: max,
            strategy,
            compression: CompressionConfig {
                default_algorithm: CompressionAlgorithm::None,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn cache(config: CacheConfig) -> (Arc<AdaptiveCache>, Arc<ManualClock>) {
        let clock = clock();
        let cache = AdaptiveCache::with_clock(config, clock.clone()).unwrap();
        (cache, clock)
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = CacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_ttl(), Duration::from_secs(3600));

        let bad = CacheConfig {
            critical_last_resort_ratio: 1.5,
            ..Default::default()
        };
        assert_matches!(bad.validate(), Err(Error::Config(_)));

        let bad = CacheConfig {
            max_patterns: 0,
            ..Default::default()
        };
        assert_matches!(bad.validate(), Err(Error::Config(_)));

        let bad = CacheConfig {
            pattern_retention_secs: 0,
            ..Default::default()
        };
        assert_matches!(bad.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_constructors_validate_config() {
        let bad = CacheConfig {
            max_size_bytes: 0,
            ..Default::default()
        };
        assert_matches!(AdaptiveCache::new(bad.clone()), Err(Error::Config(_)));
        assert_matches!(AdaptiveCache::with_clock(bad, clock()), Err(Error::Config(_)));

        let cache = AdaptiveCache::new(CacheConfig::default()).unwrap();
        assert_eq!(cache.config(), &CacheConfig::default());
    }

    #[test]
    fn test_config_from_yaml() {
        let config = CacheConfig::from_yaml_str(
            "max_size_bytes: 1024\nstrategy: recency\nbudget_mode: hard\ncompression:\n  min_size_bytes: 64\n",
        )
        .unwrap();
        assert_eq!(config.max_size_bytes, 1024);
        assert_eq!(config.strategy, EvictionStrategy::Lru);
        assert_eq!(config.budget_mode, BudgetMode::Hard);
        assert_eq!(config.compression.min_size_bytes, 64);
        assert_eq!(config.default_ttl_secs, DEFAULT_TTL_SECS);

        assert!(CacheConfig::from_yaml_str("unknown_knob: 1\n").is_err());
    }

    #[test]
    fn test_set_get_typed() {
        let (cache, _) = cache(CacheConfig::default());
        cache
            .set("user:1", &vec!["a".to_string(), "b".to_string()], SetOptions::new())
            .unwrap();

        let value: Option<Vec<String>> = cache.get("user:1");
        assert_eq!(value, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(cache.counters().hits(), 1);
    }

    #[test]
    fn test_miss_is_not_an_error() {
        let (cache, _) = cache(CacheConfig::default());
        assert_eq!(cache.get::<String>("missing"), None);
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.events().of_kind("miss").len(), 1);
    }

    #[test]
    fn test_type_mismatch_returns_none() {
        let (cache, _) = cache(CacheConfig::default());
        cache.set("n", &42u32, SetOptions::new()).unwrap();
        assert_eq!(cache.get::<Vec<String>>("n"), None);
    }

    #[test]
    fn test_contract_violations_rejected() {
        let (cache, _) = cache(CacheConfig::default());
        assert_matches!(
            cache.set_bytes("", b"x", SetOptions::new()),
            Err(Error::EmptyKey)
        );
        assert_matches!(
            cache.set_bytes("k", b"x", SetOptions::new().ttl(Duration::ZERO)),
            Err(Error::InvalidTtl { .. })
        );
        assert_matches!(
            cache.set_bytes("k", b"x", SetOptions::new().computation_cost(42)),
            Err(Error::InvalidMetadata { .. })
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lazy_expiry_on_read() {
        let (cache, clock) = cache(CacheConfig::default());
        cache
            .set_bytes("k", b"value", SetOptions::new().ttl(Duration::from_millis(100)))
            .unwrap();
        assert_eq!(cache.get_bytes("k").as_deref(), Some(&b"value"[..]));

        clock.advance(Duration::from_millis(150));
        assert!(!cache.contains("k"));
        assert_eq!(cache.get_bytes("k"), None);
        assert_eq!(cache.total_size(), 0);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get_metrics().expirations, 1);
        assert_eq!(cache.events().of_kind("cleanup").len(), 1);
    }

    #[test]
    fn test_cleanup_expired_sweep() {
        let (cache, clock) = cache(CacheConfig::default());
        cache
            .set_bytes("short", b"1", SetOptions::new().ttl(Duration::from_secs(1)))
            .unwrap();
        cache
            .set_bytes("long", b"2", SetOptions::new().ttl(Duration::from_secs(60)))
            .unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), vec!["long".to_string()]);
        assert_eq!(cache.total_size(), 1);
    }

    #[test]
    fn test_access_bookkeeping_on_hit() {
        let (cache, clock) = cache(CacheConfig::default());
        cache.set_bytes("k", b"v", SetOptions::new()).unwrap();

        clock.advance(Duration::from_secs(30));
        cache.get_bytes("k");
        cache.get_bytes("k");

        let entry = cache.peek("k").unwrap();
        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, clock.now());
        assert_eq!(entry.metadata.access_pattern.samples(), 2);
        assert!(entry.metadata.predicted_next_access.is_some());
        assert_eq!(cache.patterns_snapshot()["k"].hours_of_day, vec![9, 9]);
    }

    #[test]
    fn test_compression_applied_above_threshold() {
        let config = CacheConfig {
            compression: CompressionConfig {
                min_size_bytes: 64,
                ..Default::default()
            },
            ..Default::default()
        };
        let (cache, _) = cache(config);
        let big = "x".repeat(4096);

        cache.set("big", &big, SetOptions::new()).unwrap();
        cache.set("small", "tiny", SetOptions::new()).unwrap();

        let big_entry = cache.peek("big").unwrap();
        assert!(big_entry.compressed);
        assert!(big_entry.size_bytes < 4096);
        assert!(!cache.peek("small").unwrap().compressed);

        assert_eq!(cache.get::<String>("big"), Some(big));
        assert!((cache.get_metrics().compression_ratio - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_replacement_keeps_size_consistent() {
        let (cache, _) = cache(uncompressed(1000, EvictionStrategy::Lru));
        cache.set_bytes("k", &[0u8; 100], SetOptions::new()).unwrap();
        cache.set_bytes("k", &[0u8; 300], SetOptions::new()).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_size(), 300);
    }

    #[test]
    fn test_replacement_does_not_evict_itself() {
        let (cache, _) = cache(uncompressed(1000, EvictionStrategy::Lru));
        cache.set_bytes("a", &[0u8; 500], SetOptions::new()).unwrap();
        cache.set_bytes("b", &[0u8; 400], SetOptions::new()).unwrap();

        // 900 - 500 + 600 = 1000, fits without eviction
        cache.set_bytes("a", &[0u8; 600], SetOptions::new()).unwrap();
        assert_eq!(cache.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.total_size(), 1000);
        assert_eq!(cache.get_metrics().evictions, 0);
    }

    #[test]
    fn test_lru_eviction_under_pressure() {
        let (cache, clock) = cache(uncompressed(1000, EvictionStrategy::Lru));
        for i in 0..4 {
            cache
                .set_bytes(&format!("k{}", i), &[0u8; 250], SetOptions::new().priority(Priority::Low))
                .unwrap();
            clock.advance(Duration::from_secs(1));
        }
        // k0 becomes most recently used
        cache.get_bytes("k0");
        clock.advance(Duration::from_secs(1));

        cache
            .set_bytes("new", &[0u8; 400], SetOptions::new().priority(Priority::Low))
            .unwrap();

        assert_eq!(cache.keys(), vec!["k0", "k3", "new"]);
        assert!(cache.total_size() <= 1000);
        let cleanups = cache.events().of_kind("cleanup");
        assert_eq!(cleanups.len(), 2);
        assert_matches!(
            cleanups[0].kind,
            EventKind::Cleanup {
                reason: CleanupReason::MemoryPressure,
                strategy: Some(EvictionStrategy::Lru),
                ..
            }
        );
    }

    #[test]
    fn test_hard_budget_rejects_oversized() {
        let mut config = uncompressed(100, EvictionStrategy::Lru);
        config.budget_mode = BudgetMode::Hard;
        let (cache, _) = cache(config);

        cache.set_bytes("a", &[0u8; 50], SetOptions::new()).unwrap();
        assert_matches!(
            cache.set_bytes("huge", &[0u8; 150], SetOptions::new()),
            Err(Error::CapacityExceeded { .. })
        );
        // Nothing was evicted for a write that could never fit
        assert_eq!(cache.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn test_hard_budget_rejects_when_critical_protected() {
        let mut config = uncompressed(100, EvictionStrategy::Lru);
        config.budget_mode = BudgetMode::Hard;
        let (cache, _) = cache(config);

        cache
            .set_bytes("c", &[0u8; 40], SetOptions::new().priority(Priority::Critical))
            .unwrap();
        cache
            .set_bytes("low", &[0u8; 50], SetOptions::new().priority(Priority::Low))
            .unwrap();

        // Needs 60: low frees 50 (>= 80%), critical stays, 40 + 70 > 100
        assert_matches!(
            cache.set_bytes("new", &[0u8; 70], SetOptions::new()),
            Err(Error::CapacityExceeded { .. })
        );
        assert_eq!(cache.keys(), vec!["c".to_string()]);
    }

    #[test]
    fn test_soft_budget_admits_over_budget() {
        let (cache, _) = cache(uncompressed(100, EvictionStrategy::Lru));
        cache
            .set_bytes("c", &[0u8; 40], SetOptions::new().priority(Priority::Critical))
            .unwrap();
        cache
            .set_bytes("low", &[0u8; 50], SetOptions::new().priority(Priority::Low))
            .unwrap();

        cache.set_bytes("new", &[0u8; 70], SetOptions::new()).unwrap();
        assert_eq!(cache.keys(), vec!["c".to_string(), "new".to_string()]);
        assert_eq!(cache.total_size(), 110);
        assert!(cache.get_metrics().memory_pressure > 100.0);
    }

    #[test]
    fn test_priority_classified_from_metadata() {
        let (cache, _) = cache(CacheConfig::default());
        cache
            .set_bytes("cheap", b"v", SetOptions::new().computation_cost(1))
            .unwrap();
        cache
            .set_bytes("costly", b"v", SetOptions::new().computation_cost(6))
            .unwrap();
        cache
            .set_bytes(
                "forced",
                b"v",
                SetOptions::new().computation_cost(10).priority(Priority::Low),
            )
            .unwrap();

        assert_eq!(cache.peek("cheap").unwrap().priority, Priority::Low);
        assert_eq!(cache.peek("costly").unwrap().priority, Priority::Critical);
        assert_eq!(cache.peek("forced").unwrap().priority, Priority::Low);
    }

    #[test]
    fn test_priority_fixed_until_next_set() {
        let (cache, _) = cache(CacheConfig::default());
        cache
            .set_bytes("k", b"v", SetOptions::new().computation_cost(3))
            .unwrap();
        assert_eq!(cache.peek("k").unwrap().priority, Priority::Medium);

        // Reads raise the frequency class, not the stored priority
        for _ in 0..25 {
            cache.get_bytes("k");
        }
        assert_eq!(cache.peek("k").unwrap().priority, Priority::Medium);

        // A fresh set reclassifies: 30 + 30 (frequent) = 60
        cache
            .set_bytes("k", b"v", SetOptions::new().computation_cost(3))
            .unwrap();
        assert_eq!(cache.peek("k").unwrap().priority, Priority::High);
    }

    #[test]
    fn test_delete_and_invalidate_by_tag() {
        let (cache, _) = cache(CacheConfig::default());
        cache.set_bytes("ab", b"1", SetOptions::new().tags(["a", "b"])).unwrap();
        cache.set_bytes("a", b"2", SetOptions::new().tag("a")).unwrap();
        cache.set_bytes("b", b"3", SetOptions::new().tag("b")).unwrap();

        assert_eq!(cache.invalidate_by_tag("a"), 2);
        assert_eq!(cache.keys(), vec!["b".to_string()]);
        assert_eq!(cache.invalidate_by_tag("missing"), 0);

        assert!(cache.delete("b"));
        assert!(!cache.delete("b"));
        assert_eq!(cache.total_size(), 0);
        assert_eq!(cache.events().of_kind("delete").len(), 3);
    }

    #[test]
    fn test_clear_resets_state() {
        let (cache, _) = cache(CacheConfig::default());
        cache.set_bytes("k", b"v", SetOptions::new()).unwrap();
        cache.get_bytes("k");

        cache.clear();
        let m = cache.get_metrics();
        assert_eq!(m.entry_count, 0);
        assert_eq!(m.total_size, 0);
        assert!(cache.patterns_snapshot().is_empty());
        assert!(cache.get_analytics().predictions.is_empty());
        assert_eq!(cache.get_bytes("k"), None);
    }

    #[test]
    fn test_churning_keys_do_not_grow_pattern_table() {
        let mut config = CacheConfig::default();
        config.pattern_retention_secs = 60;
        let (cache, clock) = cache(config);

        for i in 0..5000 {
            let key = format!("req:{}", i);
            cache
                .set_bytes(&key, b"v", SetOptions::new().ttl(Duration::from_secs(1)))
                .unwrap();
            cache.get_bytes(&key);
        }
        cache.set_bytes("stable", b"v", SetOptions::new()).unwrap();
        cache.get_bytes("stable");

        // Expired, but still within retention
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.cleanup_expired(), 5000);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.patterns_snapshot().len(), 5001);

        clock.advance(Duration::from_secs(60));
        cache.cleanup_expired();
        let patterns = cache.patterns_snapshot();
        assert_eq!(patterns.len(), 1);
        assert!(patterns.contains_key("stable"));
    }

    #[test]
    fn test_pattern_table_capped_by_sweep() {
        let mut config = CacheConfig::default();
        config.max_patterns = 100;
        let (cache, clock) = cache(config);

        for i in 0..5000 {
            let key = format!("req:{}", i);
            cache
                .set_bytes(&key, b"v", SetOptions::new().ttl(Duration::from_secs(1)))
                .unwrap();
            cache.get_bytes(&key);
            clock.advance(Duration::from_millis(1));
        }

        clock.advance(Duration::from_secs(2));
        cache.cleanup_expired();

        let patterns = cache.patterns_snapshot();
        assert_eq!(patterns.len(), 100);
        // Most recently read keys survive
        assert!(patterns.contains_key("req:4999"));
        assert!(!patterns.contains_key("req:0"));
    }

    #[test]
    fn test_wall_clock_stepping_back_is_tolerated() {
        let (cache, clock) = cache(uncompressed(1000, EvictionStrategy::Adaptive));
        let start = clock.now();
        cache
            .set_bytes("k", &[0u8; 100], SetOptions::new().ttl(Duration::from_secs(60)))
            .unwrap();

        clock.set(start - chrono::Duration::hours(2));
        assert!(cache.get_bytes("k").is_some());
        let entry = cache.peek("k").unwrap();
        assert_eq!(entry.age_hours(clock.now()), 0.0);
        assert_eq!(entry.idle_hours(clock.now()), 0.0);

        let outcome = cache.evict(50);
        assert_eq!(outcome.evicted, vec!["k"]);
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_prediction_accuracy_feedback() {
        let (cache, clock) = cache(CacheConfig::default());
        cache.set_bytes("k", b"v", SetOptions::new()).unwrap();

        // Rare key predicted 24h out; an immediate read misses the prediction
        cache.get_bytes("k");
        assert_eq!(cache.get_metrics().predictive_accuracy, 0.0);

        // Second prediction is also 24h out; read it on schedule
        clock.advance(Duration::from_secs(24 * 3600));
        cache.get_bytes("k");
        assert!((cache.get_metrics().predictive_accuracy - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_analytics_report() {
        let mut config = CacheConfig::default();
        config.analytics_top_n = 2;
        let (cache, _) = cache(config);

        for (key, reads) in [("a", 3), ("b", 1), ("c", 5)] {
            cache.set_bytes(key, b"v", SetOptions::new()).unwrap();
            for _ in 0..reads {
                cache.get_bytes(key);
            }
        }
        cache.get_bytes("missing");

        let report = cache.get_analytics();
        let top: Vec<_> = report.top_keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(top, vec!["c", "a"]);
        assert_eq!(report.access_patterns.len(), 3);
        assert_eq!(report.predictions.len(), 3);
        assert!(!report.recent_events.is_empty());
        // 9 hits, 1 miss: healthy hit rate, but nothing is compressed
        assert!((report.metrics.hit_rate - 90.0).abs() < 1e-9);
        assert!(report.recommendations.iter().any(|r| r.contains("compressed")));
        assert!(!report.recommendations.iter().any(|r| r.contains("Hit rate")));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, usize),
        Get(u8),
        Delete(u8),
        Advance(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, 1usize..400).prop_map(|(k, n)| Op::Set(k, n)),
            (0u8..16).prop_map(Op::Get),
            (0u8..16).prop_map(Op::Delete),
            (0u64..120).prop_map(Op::Advance),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_size_total_matches_entries(ops in prop::collection::vec(op_strategy(), 1..200)) {
            let mut config = uncompressed(2000, EvictionStrategy::Adaptive);
            config.default_ttl_secs = 60;
            let (cache, clock) = cache(config);

            for op in ops {
                match op {
                    Op::Set(k, n) => {
                        cache.set_bytes(&format!("k{}", k), &vec![7u8; n], SetOptions::new()).unwrap();
                    }
                    Op::Get(k) => {
                        cache.get_bytes(&format!("k{}", k));
                    }
                    Op::Delete(k) => {
                        cache.delete(&format!("k{}", k));
                    }
                    Op::Advance(s) => clock.advance(Duration::from_secs(s)),
                }
                prop_assert_eq!(cache.total_size(), cache.recomputed_size());
            }
            // Entries are at most 399 bytes, so the soft budget is never exceeded
            prop_assert!(cache.total_size() <= 2000);
        }
    }
}
