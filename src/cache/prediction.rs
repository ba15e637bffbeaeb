//! Next-Access Prediction
//!
//! Coarse heuristic: rarely used keys are predicted a day out, everything
//! else is predicted at the distance between the current hour and the mean
//! hour of past accesses (at least one hour).
//!
//! Predictions are scored against the read that actually follows them, which
//! feeds `predictive_accuracy` in the metrics snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};

use super::pattern::{AccessPattern, FrequencyClass};

/// Horizon used for rarely accessed keys
pub const RARE_HORIZON_HOURS: i64 = 24;

/// Predictions within this window of the actual access count as accurate
pub const ACCURACY_TOLERANCE_MINUTES: i64 = 60;

/// Estimate the next access time for a key
pub fn predict_next_access(pattern: &AccessPattern, now: DateTime<Utc>) -> DateTime<Utc> {
    if pattern.frequency_class == FrequencyClass::Rare {
        return now + ChronoDuration::hours(RARE_HORIZON_HOURS);
    }

    let Some(mean_hour) = pattern.mean_hour() else {
        return now + ChronoDuration::hours(RARE_HORIZON_HOURS);
    };

    let hours = (mean_hour - now.hour() as f64).abs().max(1.0);
    now + ChronoDuration::milliseconds((hours * 3_600_000.0) as i64)
}

/// Outstanding predictions plus accuracy bookkeeping
#[derive(Debug, Default)]
pub struct PredictionTracker {
    predictions: HashMap<String, DateTime<Utc>>,
    scored: u64,
    accurate: u64,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh prediction for `key` and return it
    pub fn predict(
        &mut self,
        key: &str,
        pattern: &AccessPattern,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let predicted = predict_next_access(pattern, now);
        self.predictions.insert(key.to_string(), predicted);
        predicted
    }

    /// Score the outstanding prediction for `key` against an access at `actual`.
    ///
    /// Returns whether the prediction was accurate, or `None` if there was
    /// nothing to score.
    pub fn score(&mut self, key: &str, actual: DateTime<Utc>) -> Option<bool> {
        let predicted = self.predictions.get(key)?;
        let error = (actual - *predicted).num_minutes().abs();
        let hit = error <= ACCURACY_TOLERANCE_MINUTES;

        self.scored += 1;
        if hit {
            self.accurate += 1;
        }
        Some(hit)
    }

    pub fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.predictions.get(key).copied()
    }

    pub fn remove(&mut self, key: &str) {
        self.predictions.remove(key);
    }

    /// Forget predictions; accuracy counters are kept
    pub fn clear(&mut self) {
        self.predictions.clear();
    }

    /// Copy of the prediction table
    pub fn snapshot(&self) -> HashMap<String, DateTime<Utc>> {
        self.predictions.clone()
    }

    /// Accurate predictions as a percentage of scored ones (0 when none scored)
    pub fn accuracy(&self) -> f64 {
        if self.scored == 0 {
            0.0
        } else {
            self.accurate as f64 / self.scored as f64 * 100.0
        }
    }

    pub fn scored(&self) -> u64 {
        self.scored
    }
}
