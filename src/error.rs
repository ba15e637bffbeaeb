//! Error types for the adaptive cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the adaptive cache
///
/// Misses and expiry are never errors; `get` returns `None` for both.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // =========================================================================
    // Write Contract Violations
    // =========================================================================
    /// Key is empty
    #[error("Cache key must not be empty")]
    EmptyKey,

    /// TTL is not usable (zero)
    #[error("Invalid TTL for key {key}: {reason}")]
    InvalidTtl { key: String, reason: String },

    /// Entry metadata is out of range
    #[error("Invalid metadata for key {key}: {reason}")]
    InvalidMetadata { key: String, reason: String },

    /// Hard budget could not be satisfied
    #[error("Capacity exceeded for key {key}: need {required} bytes, budget {budget} bytes")]
    CapacityExceeded {
        key: String,
        required: u64,
        budget: u64,
    },

    // =========================================================================
    // Compression Errors
    // =========================================================================
    /// Compression failed
    #[error("Compression with {algorithm} failed: {reason}")]
    CompressionFailed { algorithm: String, reason: String },

    /// Decompression failed
    #[error("Decompression with {algorithm} failed: {reason}")]
    DecompressionFailed { algorithm: String, reason: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Access-pattern persistence failed
    #[error("Pattern persistence failed: {0}")]
    Persistence(String),
}
