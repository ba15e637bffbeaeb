//! Prometheus Exporter
//!
//! Mirrors `MetricsSnapshot` values into a private Prometheus registry for
//! text exposition.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};

use crate::cache::MetricsSnapshot;
use crate::error::{Error, Result};

const NAMESPACE: &str = "adaptive_cache";

/// Prometheus view of one cache
pub struct CacheExporter {
    registry: Registry,
    hit_rate: Gauge,
    miss_rate: Gauge,
    memory_pressure: Gauge,
    compression_ratio: Gauge,
    predictive_accuracy: Gauge,
    total_size: IntGauge,
    entry_count: IntGauge,
    hits: IntCounter,
    misses: IntCounter,
    evictions: IntCounter,
    expirations: IntCounter,
}

fn prom_err(e: prometheus::Error) -> Error {
    Error::Internal(format!("Prometheus registry error: {}", e))
}

impl CacheExporter {
    /// Create an exporter with its own registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None).map_err(prom_err)?;

        let gauge = |name: &str, help: &str| -> Result<Gauge> {
            let g = Gauge::new(name, help).map_err(prom_err)?;
            registry.register(Box::new(g.clone())).map_err(prom_err)?;
            Ok(g)
        };
        let int_gauge = |name: &str, help: &str| -> Result<IntGauge> {
            let g = IntGauge::new(name, help).map_err(prom_err)?;
            registry.register(Box::new(g.clone())).map_err(prom_err)?;
            Ok(g)
        };
        let counter = |name: &str, help: &str| -> Result<IntCounter> {
            let c = IntCounter::new(name, help).map_err(prom_err)?;
            registry.register(Box::new(c.clone())).map_err(prom_err)?;
            Ok(c)
        };

        Ok(Self {
            hit_rate: gauge("hit_rate_percent", "Percent of lookups that hit")?,
            miss_rate: gauge("miss_rate_percent", "Percent of lookups that missed")?,
            memory_pressure: gauge("memory_pressure_percent", "Percent of the memory budget in use")?,
            compression_ratio: gauge("compression_ratio_percent", "Percent of entries stored compressed")?,
            predictive_accuracy: gauge(
                "predictive_accuracy_percent",
                "Percent of scored access predictions within tolerance",
            )?,
            total_size: int_gauge("size_bytes", "Bytes held by stored entries")?,
            entry_count: int_gauge("entries", "Number of stored entries")?,
            hits: counter("hits_total", "Cache hits")?,
            misses: counter("misses_total", "Cache misses")?,
            evictions: counter("evictions_total", "Entries evicted under memory pressure")?,
            expirations: counter("expirations_total", "Entries removed after their TTL")?,
            registry,
        })
    }

    /// Copy `snapshot` into the registered metrics
    pub fn refresh(&self, snapshot: &MetricsSnapshot) {
        self.hit_rate.set(snapshot.hit_rate);
        self.miss_rate.set(snapshot.miss_rate);
        self.memory_pressure.set(snapshot.memory_pressure);
        self.compression_ratio.set(snapshot.compression_ratio);
        self.predictive_accuracy.set(snapshot.predictive_accuracy);
        self.total_size
            .set(i64::try_from(snapshot.total_size).unwrap_or(i64::MAX));
        self.entry_count
            .set(i64::try_from(snapshot.entry_count).unwrap_or(i64::MAX));

        advance(&self.hits, snapshot.hits);
        advance(&self.misses, snapshot.misses);
        advance(&self.evictions, snapshot.evictions);
        advance(&self.expirations, snapshot.expirations);
    }

    /// Text exposition of all registered metrics
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(prom_err)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Counters only move forward; a lower source value is ignored
fn advance(counter: &IntCounter, target: u64) {
    let current = counter.get();
    if target > current {
        counter.inc_by(target - current);
    }
}

impl std::fmt::Debug for CacheExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheExporter").finish_non_exhaustive()
    }
}
