//! Access-Pattern Persistence
//!
//! Port for saving and restoring the learned access-pattern table across
//! process restarts, with an in-memory and a JSON file adapter.

mod json_file;
mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::cache::AccessPattern;
use crate::error::Result;

pub use json_file::JsonFilePatternStore;
pub use memory::InMemoryPatternStore;

/// Storage backend for access patterns.
///
/// Callers treat every failure as non-fatal.
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Load the previously saved table, or `None` if nothing was saved
    async fn load(&self) -> Result<Option<HashMap<String, AccessPattern>>>;

    /// Replace the saved table
    async fn save(&self, patterns: &HashMap<String, AccessPattern>) -> Result<()>;
}
