//! Cache Entry Types
//!
//! The stored unit plus the write-side option types that build it.

use std::collections::BTreeSet;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::{hours_between, to_chrono};
use super::pattern::AccessPattern;
use super::priority::Priority;
use crate::error::{Error, Result};

/// Lowest accepted computation cost
pub const MIN_COMPUTATION_COST: u8 = 1;

/// Highest accepted computation cost
pub const MAX_COMPUTATION_COST: u8 = 10;

/// Structured metadata carried by every entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Producer of the value
    pub source: String,
    /// Producer-defined version of the value
    pub version: u32,
    /// Keys this value was derived from
    pub dependencies: Vec<String>,
    /// Relative cost to recompute (1-10)
    pub computation_cost: u8,
    /// Predicted instant of the next read
    pub predicted_next_access: Option<DateTime<Utc>>,
    /// Pattern snapshot taken at write time and refreshed on reads
    pub access_pattern: AccessPattern,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            source: "unknown".to_string(),
            version: 1,
            dependencies: Vec::new(),
            computation_cost: MIN_COMPUTATION_COST,
            predicted_next_access: None,
            access_pattern: AccessPattern::default(),
        }
    }
}

/// Caller-supplied subset of [`EntryMetadata`].
///
/// Unknown fields are rejected when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MetadataPatch {
    pub source: Option<String>,
    pub version: Option<u32>,
    pub dependencies: Option<Vec<String>>,
    pub computation_cost: Option<u8>,
}

impl MetadataPatch {
    /// Validate against the write contract
    pub fn validate(&self, key: &str) -> Result<()> {
        if let Some(cost) = self.computation_cost {
            if !(MIN_COMPUTATION_COST..=MAX_COMPUTATION_COST).contains(&cost) {
                return Err(Error::InvalidMetadata {
                    key: key.to_string(),
                    reason: format!(
                        "computation_cost {} outside {}..={}",
                        cost, MIN_COMPUTATION_COST, MAX_COMPUTATION_COST
                    ),
                });
            }
        }
        Ok(())
    }

    /// Build full metadata from defaults plus this patch
    pub fn into_metadata(self) -> EntryMetadata {
        let defaults = EntryMetadata::default();
        EntryMetadata {
            source: self.source.unwrap_or(defaults.source),
            version: self.version.unwrap_or(defaults.version),
            dependencies: self.dependencies.unwrap_or_default(),
            computation_cost: self.computation_cost.unwrap_or(defaults.computation_cost),
            ..defaults
        }
    }
}

/// Options for a single `set`
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Time-to-live; the cache default applies when `None`
    pub ttl: Option<Duration>,
    /// Explicit priority, bypassing the classifier
    pub priority: Option<Priority>,
    /// Tags for bulk invalidation
    pub tags: Vec<String>,
    pub metadata: MetadataPatch,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn computation_cost(mut self, cost: u8) -> Self {
        self.metadata.computation_cost = Some(cost);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.dependencies = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata(mut self, metadata: MetadataPatch) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A stored cache entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    /// Stored bytes (compressed if `compressed`)
    pub payload: Bytes,
    pub compressed: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Successful reads
    pub access_count: u64,
    pub ttl: Duration,
    /// Size as stored; always `payload.len()`
    pub size_bytes: u64,
    /// Fixed at insertion
    pub priority: Priority,
    pub tags: BTreeSet<String>,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Whether the entry is past its TTL at `now`
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Instant after which the entry is expired
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(to_chrono(self.ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Record a successful read and return the new count
    pub fn record_access(&mut self, now: DateTime<Utc>) -> u64 {
        self.last_accessed_at = now;
        self.access_count += 1;
        self.access_count
    }

    /// Hours since creation
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.created_at, now)
    }

    /// Hours since the last read (or creation)
    pub fn idle_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.last_accessed_at, now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
