//! Memory Pressure Monitor
//!
//! Decides how many bytes a write must reclaim before it is committed and
//! whether an over-budget write is admitted.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What happens when eviction cannot make room for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetMode {
    /// Admit the write and run over budget
    #[default]
    Soft,
    /// Reject the write with `Error::CapacityExceeded`
    Hard,
}

/// Budget arithmetic for the entry store
#[derive(Debug, Clone, Copy)]
pub struct MemoryPressureMonitor {
    max_bytes: u64,
    mode: BudgetMode,
}

impl MemoryPressureMonitor {
    pub fn new(max_bytes: u64, mode: BudgetMode) -> Self {
        Self { max_bytes, mode }
    }

    /// Bytes to evict so that `current + incoming` fits the budget
    #[inline]
    pub fn bytes_needed(&self, current: u64, incoming: u64) -> u64 {
        current
            .saturating_add(incoming)
            .saturating_sub(self.max_bytes)
    }

    /// Usage as a percentage of the budget
    pub fn pressure(&self, current: u64) -> f64 {
        if self.max_bytes == 0 {
            return if current == 0 { 0.0 } else { 100.0 };
        }
        current as f64 / self.max_bytes as f64 * 100.0
    }

    /// Final admission check after eviction ran
    pub fn admit(&self, key: &str, current: u64, incoming: u64) -> Result<()> {
        let projected = current.saturating_add(incoming);
        if projected <= self.max_bytes {
            return Ok(());
        }

        match self.mode {
            BudgetMode::Soft => {
                tracing::warn!(
                    key = %key,
                    projected,
                    budget = self.max_bytes,
                    "Admitting write over memory budget"
                );
                Ok(())
            }
            BudgetMode::Hard => Err(Error::CapacityExceeded {
                key: key.to_string(),
                required: projected,
                budget: self.max_bytes,
            }),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn mode(&self) -> BudgetMode {
        self.mode
    }
}
