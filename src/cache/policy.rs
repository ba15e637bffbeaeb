//! Eviction Strategies and Victim Selection
//!
//! Orders entries by the configured strategy and picks victims until enough
//! bytes are freed. Critical entries are held back and only considered once
//! every other candidate is gone and the freed total is still below the
//! last-resort ratio of the requirement.

use std::cmp::Ordering;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;
use super::priority::Priority;

/// Default share of `bytes_needed` below which critical entries may be evicted
pub const DEFAULT_LAST_RESORT_RATIO: f64 = 0.8;

/// Eviction ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Oldest `last_accessed_at` first
    #[serde(alias = "recency")]
    Lru,
    /// Lowest `access_count` first
    #[serde(alias = "frequency")]
    Lfu,
    /// Oldest `created_at` first
    #[serde(alias = "insertion")]
    Fifo,
    /// Lowest adaptive score first
    #[default]
    Adaptive,
    /// Furthest predicted next access first
    Predictive,
}

impl EvictionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => "lru",
            EvictionStrategy::Lfu => "lfu",
            EvictionStrategy::Fifo => "fifo",
            EvictionStrategy::Adaptive => "adaptive",
            EvictionStrategy::Predictive => "predictive",
        }
    }

    /// Order two entries; `Less` means `a` is evicted before `b`
    pub fn compare(&self, a: &CacheEntry, b: &CacheEntry, now: DateTime<Utc>) -> Ordering {
        let primary = match self {
            EvictionStrategy::Lru => a.last_accessed_at.cmp(&b.last_accessed_at),
            EvictionStrategy::Lfu => a.access_count.cmp(&b.access_count),
            EvictionStrategy::Fifo => a.created_at.cmp(&b.created_at),
            EvictionStrategy::Adaptive => adaptive_score(a, now)
                .partial_cmp(&adaptive_score(b, now))
                .unwrap_or(Ordering::Equal),
            // No prediction sorts as furthest out
            EvictionStrategy::Predictive => {
                match (a.metadata.predicted_next_access, b.metadata.predicted_next_access) {
                    (Some(pa), Some(pb)) => pb.cmp(&pa),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            }
        };
        primary.then_with(|| a.key.cmp(&b.key))
    }
}

impl std::fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for EvictionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" | "recency" => Ok(EvictionStrategy::Lru),
            "lfu" | "frequency" => Ok(EvictionStrategy::Lfu),
            "fifo" | "insertion" => Ok(EvictionStrategy::Fifo),
            "adaptive" => Ok(EvictionStrategy::Adaptive),
            "predictive" => Ok(EvictionStrategy::Predictive),
            other => Err(format!("unknown eviction strategy: {}", other)),
        }
    }
}

/// Retention score for the adaptive strategy (lower = evicted sooner)
pub fn adaptive_score(entry: &CacheEntry, now: DateTime<Utc>) -> f64 {
    let mut score = entry.priority.weight()
        + ((entry.access_count as f64) + 1.0).ln() * 2.0
        + entry.metadata.computation_cost as f64
        - entry.age_hours(now) * 0.1
        - entry.idle_hours(now) * 0.2;

    if entry.compressed {
        score += 0.5;
    }
    if let Some(predicted) = entry.metadata.predicted_next_access {
        let until = predicted - now;
        if until >= ChronoDuration::zero() && until <= ChronoDuration::hours(1) {
            score += 2.0;
        }
    }
    score
}

/// Why entries are being removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupReason {
    MemoryPressure,
    Expired,
}

impl CleanupReason {
    pub fn name(&self) -> &'static str {
        match self {
            CleanupReason::MemoryPressure => "memory_pressure",
            CleanupReason::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Victims chosen for one eviction pass, in eviction order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionPlan {
    /// (key, size_bytes)
    pub victims: Vec<(String, u64)>,
    pub freed_bytes: u64,
    /// Number of critical entries included
    pub critical_evicted: usize,
}

impl EvictionPlan {
    pub fn is_empty(&self) -> bool {
        self.victims.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.victims.iter().map(|(k, _)| k.as_str())
    }
}

/// Choose victims to free at least `bytes_needed`
pub fn plan_eviction<'a, I>(
    entries: I,
    strategy: EvictionStrategy,
    bytes_needed: u64,
    last_resort_ratio: f64,
    now: DateTime<Utc>,
) -> EvictionPlan
where
    I: IntoIterator<Item = &'a CacheEntry>,
{
    let mut plan = EvictionPlan::default();
    if bytes_needed == 0 {
        return plan;
    }

    let (mut critical, mut regular): (Vec<&CacheEntry>, Vec<&CacheEntry>) = entries
        .into_iter()
        .partition(|e| e.priority == Priority::Critical);

    regular.sort_by(|a, b| strategy.compare(a, b, now));

    for entry in regular {
        if plan.freed_bytes >= bytes_needed {
            return plan;
        }
        plan.freed_bytes += entry.size_bytes;
        plan.victims.push((entry.key.clone(), entry.size_bytes));
    }

    if plan.freed_bytes as f64 >= bytes_needed as f64 * last_resort_ratio {
        return plan;
    }

    critical.sort_by(|a, b| strategy.compare(a, b, now));
    for entry in critical {
        if plan.freed_bytes >= bytes_needed {
            break;
        }
        plan.freed_bytes += entry.size_bytes;
        plan.critical_evicted += 1;
        plan.victims.push((entry.key.clone(), entry.size_bytes));
    }

    plan
}
