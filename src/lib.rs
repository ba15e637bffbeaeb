//! Adaptive Cache - Pattern-Learning In-Process Cache
//!
//! A key/value cache that records when each key is read, predicts the next
//! read, classifies entries by importance and evicts by a configurable
//! strategy when a memory budget is reached. Payloads above a size threshold
//! are LZ4 compressed.
//!
//! # Features
//!
//! - LRU / LFU / FIFO / adaptive / predictive eviction
//! - Critical entries protected until eviction is otherwise insufficient
//! - Per-key access patterns and next-access prediction
//! - Lazy and scheduled TTL expiry
//! - Metrics, analytics report and tuning recommendations
//! - Access-pattern persistence across restarts
//! - Prometheus text exposition
//!
//! # Modules
//!
//! - [`cache`] - Entry store, codec, tracker, predictor, eviction engine
//! - [`persistence`] - Access-pattern storage adapters
//! - [`exporter`] - Prometheus exporter
//! - [`error`] - Error types

pub mod cache;
pub mod error;
pub mod exporter;
pub mod persistence;

pub use cache::{AdaptiveCache, CacheConfig, CacheHandle, EvictionStrategy, Priority, SetOptions};
pub use error::{Error, Result};
