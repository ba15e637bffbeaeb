//! Priority Classification
//!
//! Scores an entry's importance at write time from its recomputation cost,
//! dependency fan-out and observed access frequency.

use serde::{Deserialize, Serialize};

use super::pattern::{AccessPattern, FrequencyClass};

/// Priority tier; advisory input to eviction ordering
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    /// Protected from eviction until the last-resort threshold
    Critical,
}

impl Priority {
    /// Weight used by the adaptive eviction score
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
            Priority::Critical => 4.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn frequency_bonus(class: FrequencyClass) -> u32 {
    match class {
        FrequencyClass::Constant => 40,
        FrequencyClass::Frequent => 30,
        FrequencyClass::Occasional => 20,
        FrequencyClass::Rare => 10,
    }
}

/// Raw importance score
pub fn score(computation_cost: u8, dependencies: usize, pattern: &AccessPattern) -> u32 {
    computation_cost as u32 * 10
        + frequency_bonus(pattern.frequency_class)
        + dependencies as u32 * 5
}

/// Map the importance score onto a tier
pub fn classify(computation_cost: u8, dependencies: usize, pattern: &AccessPattern) -> Priority {
    match score(computation_cost, dependencies, pattern) {
        s if s >= 70 => Priority::Critical,
        s if s >= 50 => Priority::High,
        s if s >= 30 => Priority::Medium,
        _ => Priority::Low,
    }
}
