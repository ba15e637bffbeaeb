//! Adaptive Cache Engine
//!
//! In-process key/value cache that learns per-key access patterns and uses
//! them to classify, predict and evict.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          AdaptiveCache                               │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │  set ─▶ Codec ─▶ Pressure Monitor ─▶ Eviction Engine ─▶ Entry Store │
//! │                        │                    ▲                        │
//! │  get ─▶ Entry Store ─▶ Pattern Tracker ─▶ Predictor ─▶ Classifier    │
//! │                                                                      │
//! │  Metrics (atomic counters)     Event Log (ring buffer)               │
//! │  Expiry Scheduler (tokio task) ─▶ cleanup_expired / save patterns    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use adaptive_cache::cache::{AdaptiveCache, CacheConfig, Priority, SetOptions};
//! use std::time::Duration;
//!
//! let cache = AdaptiveCache::new(CacheConfig::default()).unwrap();
//! cache
//!     .set(
//!         "user:42",
//!         &vec![1, 2, 3],
//!         SetOptions::new()
//!             .ttl(Duration::from_secs(60))
//!             .priority(Priority::High)
//!             .tag("users"),
//!     )
//!     .unwrap();
//!
//! let value: Option<Vec<u32>> = cache.get("user:42");
//! assert_eq!(value, Some(vec![1, 2, 3]));
//! assert_eq!(cache.invalidate_by_tag("users"), 1);
//! ```

pub mod clock;
pub mod compression;
pub mod entry;
pub mod events;
pub mod expiry;
pub mod manager;
pub mod metrics;
pub mod pattern;
pub mod policy;
pub mod prediction;
pub mod pressure;
pub mod priority;

pub use clock::{Clock, ManualClock, SystemClock};
pub use compression::{
    CompressionAlgorithm, CompressionConfig, Compressor, Encoded, PayloadCodec,
};
pub use entry::{CacheEntry, EntryMetadata, MetadataPatch, SetOptions};
pub use events::{CacheEvent, EventKind, EventLog};
pub use expiry::CacheHandle;
pub use manager::{AdaptiveCache, CacheConfig, EvictionOutcome};
pub use metrics::{AnalyticsReport, CacheMetrics, KeyAccess, MetricsSnapshot};
pub use pattern::{AccessPattern, FrequencyClass, PatternTracker, Seasonality};
pub use policy::{CleanupReason, EvictionPlan, EvictionStrategy};
pub use prediction::{predict_next_access, PredictionTracker};
pub use pressure::{BudgetMode, MemoryPressureMonitor};
pub use priority::Priority;
