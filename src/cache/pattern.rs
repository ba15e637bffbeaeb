//! Access Pattern Tracking
//!
//! Records the hour-of-day and day-of-week of every read per key and derives
//! a coarse frequency classification from the number of retained samples.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// History length that triggers trimming
pub const MAX_SAMPLES: usize = 100;

/// Samples retained after trimming
pub const RETAINED_SAMPLES: usize = 50;

/// Frequency classification derived from sample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyClass {
    /// 5 samples or fewer
    #[default]
    Rare,
    /// 6 - 20 samples
    Occasional,
    /// 21 - 50 samples
    Frequent,
    /// More than 50 samples
    Constant,
}

impl FrequencyClass {
    /// Classify by number of recorded samples
    pub fn from_samples(samples: usize) -> Self {
        match samples {
            n if n > 50 => FrequencyClass::Constant,
            n if n > 20 => FrequencyClass::Frequent,
            n if n > 5 => FrequencyClass::Occasional,
            _ => FrequencyClass::Rare,
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FrequencyClass::Rare => "rare",
            FrequencyClass::Occasional => "occasional",
            FrequencyClass::Frequent => "frequent",
            FrequencyClass::Constant => "constant",
        }
    }
}

impl std::fmt::Display for FrequencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Coarse seasonality label.
///
/// Not derived from the samples; carried so persisted tables and
/// collaborators can set it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seasonality {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Per-key access history
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPattern {
    /// Hour of day (0-23, UTC) of each recorded access
    pub hours_of_day: Vec<u32>,
    /// Day of week (0 = Sunday) of each recorded access
    pub days_of_week: Vec<u32>,
    /// Classification derived from `hours_of_day.len()`
    pub frequency_class: FrequencyClass,
    #[serde(default)]
    pub seasonality: Seasonality,
    /// Time of the newest sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access_at: Option<DateTime<Utc>>,
}

impl AccessPattern {
    /// Number of retained samples
    #[inline]
    pub fn samples(&self) -> usize {
        self.hours_of_day.len()
    }

    /// Mean hour-of-day over the retained history
    pub fn mean_hour(&self) -> Option<f64> {
        if self.hours_of_day.is_empty() {
            return None;
        }
        let sum: u64 = self.hours_of_day.iter().map(|&h| h as u64).sum();
        Some(sum as f64 / self.hours_of_day.len() as f64)
    }

    fn record(&mut self, at: DateTime<Utc>) {
        self.hours_of_day.push(at.hour());
        self.days_of_week.push(at.weekday().num_days_from_sunday());

        if self.hours_of_day.len() > MAX_SAMPLES {
            let drop = self.hours_of_day.len() - RETAINED_SAMPLES;
            self.hours_of_day.drain(..drop);
        }
        if self.days_of_week.len() > MAX_SAMPLES {
            let drop = self.days_of_week.len() - RETAINED_SAMPLES;
            self.days_of_week.drain(..drop);
        }

        self.frequency_class = FrequencyClass::from_samples(self.samples());
        self.last_access_at = Some(at);
    }
}

/// Table of access patterns keyed by cache key
#[derive(Debug, Default)]
pub struct PatternTracker {
    patterns: HashMap<String, AccessPattern>,
}

impl PatternTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access at `at` and return the updated pattern
    pub fn record_access(&mut self, key: &str, at: DateTime<Utc>) -> AccessPattern {
        let pattern = self.patterns.entry(key.to_string()).or_default();
        pattern.record(at);
        pattern.clone()
    }

    /// Pattern for a key, or an empty (rare) pattern if none was recorded
    pub fn pattern_or_default(&self, key: &str) -> AccessPattern {
        self.patterns.get(key).cloned().unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&AccessPattern> {
        self.patterns.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AccessPattern> {
        self.patterns.remove(key)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Copy of the whole table
    pub fn snapshot(&self) -> HashMap<String, AccessPattern> {
        self.patterns.clone()
    }

    /// Drop patterns of keys that are no longer resident.
    ///
    /// A non-resident pattern goes once its newest sample is older than
    /// `cutoff`. If the table is then still above `max_patterns`, the
    /// non-resident patterns with the oldest samples go first; patterns
    /// without a timestamp count as oldest. Returns the number dropped.
    pub fn prune(
        &mut self,
        cutoff: DateTime<Utc>,
        max_patterns: usize,
        is_resident: impl Fn(&str) -> bool,
    ) -> usize {
        let before = self.patterns.len();
        self.patterns.retain(|key, pattern| {
            is_resident(key) || pattern.last_access_at.map_or(true, |at| at >= cutoff)
        });

        if self.patterns.len() > max_patterns {
            let mut idle: Vec<(Option<DateTime<Utc>>, String)> = self
                .patterns
                .iter()
                .filter(|(key, _)| !is_resident(key))
                .map(|(key, pattern)| (pattern.last_access_at, key.clone()))
                .collect();
            idle.sort();

            let excess = self.patterns.len() - max_patterns;
            for (_, key) in idle.into_iter().take(excess) {
                self.patterns.remove(&key);
            }
        }
        before - self.patterns.len()
    }

    /// Merge a previously persisted table; live patterns win on conflict
    pub fn restore(&mut self, patterns: HashMap<String, AccessPattern>) -> usize {
        let mut restored = 0;
        for (key, mut pattern) in patterns {
            pattern.frequency_class = FrequencyClass::from_samples(pattern.samples());
            if let std::collections::hash_map::Entry::Vacant(slot) = self.patterns.entry(key) {
                slot.insert(pattern);
                restored += 1;
            }
        }
        restored
    }
}
