//! Cache Event Log
//!
//! Bounded ring buffer of recent cache operations for diagnostics.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::policy::{CleanupReason, EvictionStrategy};

/// Default ring buffer capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Kind of recorded operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Hit,
    Miss,
    Set { size_bytes: u64, compressed: bool },
    Delete,
    /// Removal by eviction or expiry
    Cleanup {
        reason: CleanupReason,
        /// Present for memory-pressure evictions
        strategy: Option<EvictionStrategy>,
        size_bytes: u64,
    },
    Clear { entries: usize },
}

impl EventKind {
    /// Short label used for filtering
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Hit => "hit",
            EventKind::Miss => "miss",
            EventKind::Set { .. } => "set",
            EventKind::Delete => "delete",
            EventKind::Cleanup { .. } => "cleanup",
            EventKind::Clear { .. } => "clear",
        }
    }
}

/// One recorded cache operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEvent {
    /// Monotonic sequence number
    pub seq: u64,
    pub key: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug)]
struct Ring {
    events: VecDeque<CacheEvent>,
    next_seq: u64,
}

/// Bounded, thread-safe event log
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    ring: Mutex<Ring>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ring: Mutex::new(Ring {
                events: VecDeque::with_capacity(capacity),
                next_seq: 0,
            }),
        }
    }

    /// Append an event, dropping the oldest when full
    pub fn record(&self, key: Option<&str>, kind: EventKind, timestamp: DateTime<Utc>) {
        let mut ring = self.ring.lock();
        if ring.events.len() == self.capacity {
            ring.events.pop_front();
        }
        let seq = ring.next_seq;
        ring.next_seq += 1;
        ring.events.push_back(CacheEvent {
            seq,
            key: key.map(str::to_string),
            timestamp,
            kind,
        });
    }

    /// Most recent `n` events, oldest first
    pub fn recent(&self, n: usize) -> Vec<CacheEvent> {
        let ring = self.ring.lock();
        let skip = ring.events.len().saturating_sub(n);
        ring.events.iter().skip(skip).cloned().collect()
    }

    /// All retained events with the given label
    pub fn of_kind(&self, label: &str) -> Vec<CacheEvent> {
        self.ring
            .lock()
            .events
            .iter()
            .filter(|e| e.kind.label() == label)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop retained events (sequence numbers keep counting)
    pub fn clear(&self) {
        self.ring.lock().events.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drops_oldest() {
        let log = EventLog::new(3);
        let now = Utc::now();
        for i in 0..5 {
            log.record(Some(&format!("k{}", i)), EventKind::Delete, now);
        }

        assert_eq!(log.len(), 3);
        let keys: Vec<_> = log.recent(10).into_iter().filter_map(|e| e.key).collect();
        assert_eq!(keys, vec!["k2", "k3", "k4"]);
        assert_eq!(log.recent(1)[0].seq, 4);
    }

    #[test]
    fn test_of_kind_filters() {
        let log = EventLog::default();
        let now = Utc::now();
        log.record(Some("a"), EventKind::Hit, now);
        log.record(Some("a"), EventKind::Miss, now);
        log.record(
            Some("b"),
            EventKind::Cleanup {
                reason: CleanupReason::Expired,
                strategy: None,
                size_bytes: 4,
            },
            now,
        );

        assert_eq!(log.of_kind("hit").len(), 1);
        assert_eq!(log.of_kind("cleanup").len(), 1);
        assert!(log.of_kind("set").is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let log = EventLog::new(4);
        log.record(
            Some("k"),
            EventKind::Cleanup {
                reason: CleanupReason::MemoryPressure,
                strategy: Some(EvictionStrategy::Lru),
                size_bytes: 10,
            },
            Utc::now(),
        );
        let json = serde_json::to_value(&log.recent(1)[0]).unwrap();
        assert_eq!(json["type"], "cleanup");
        assert_eq!(json["reason"], "memory_pressure");
        assert_eq!(json["strategy"], "lru");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let log = EventLog::new(0);
        log.record(None, EventKind::Clear { entries: 0 }, Utc::now());
        log.record(None, EventKind::Clear { entries: 1 }, Utc::now());
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }
}
