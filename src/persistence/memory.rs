//! In-memory pattern store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::PatternStore;
use crate::cache::AccessPattern;
use crate::error::{Error, Result};

/// Pattern store held in process memory.
///
/// Useful for embedding and for tests; `fail_next` makes the next call fail.
#[derive(Debug, Default)]
pub struct InMemoryPatternStore {
    patterns: DashMap<String, AccessPattern>,
    saved: AtomicBool,
    saves: AtomicU64,
    fail: AtomicBool,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `patterns`
    pub fn with_patterns(patterns: HashMap<String, AccessPattern>) -> Self {
        let store = Self::default();
        for (key, pattern) in patterns {
            store.patterns.insert(key, pattern);
        }
        store.saved.store(true, Ordering::Relaxed);
        store
    }

    /// Make the next load or save fail
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    /// Number of successful saves
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn get(&self, key: &str) -> Option<AccessPattern> {
        self.patterns.get(key).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail.swap(false, Ordering::Relaxed) {
            return Err(Error::Persistence("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn load(&self) -> Result<Option<HashMap<String, AccessPattern>>> {
        self.check_failure()?;
        if !self.saved.load(Ordering::Relaxed) {
            return Ok(None);
        }
        Ok(Some(
            self.patterns
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        ))
    }

    async fn save(&self, patterns: &HashMap<String, AccessPattern>) -> Result<()> {
        self.check_failure()?;
        self.patterns.clear();
        for (key, pattern) in patterns {
            self.patterns.insert(key.clone(), pattern.clone());
        }
        self.saved.store(true, Ordering::Relaxed);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
