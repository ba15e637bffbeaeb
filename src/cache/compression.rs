//! Payload Compression Codec
//!
//! LZ4 compression for payloads at or above a size threshold, with
//! automatic fallback to the raw form when compression does not help.
//!
//! # Example
//!
//! ```
//! use adaptive_cache::cache::compression::{CompressionConfig, PayloadCodec};
//!
//! let codec = PayloadCodec::with_config(CompressionConfig {
//!     min_size_bytes: 16,
//!     ..Default::default()
//! });
//!
//! let data = b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc";
//! let encoded = codec.encode(data);
//! assert!(encoded.compressed);
//!
//! let decoded = codec.decode(&encoded.payload, encoded.compressed);
//! assert_eq!(decoded.as_ref(), data);
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// No compression
    None,
    /// LZ4 - fast compression
    #[default]
    Lz4,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for payload compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Algorithm used for large payloads (`none` disables compression)
    pub default_algorithm: CompressionAlgorithm,
    /// Minimum serialized size to compress (smaller payloads are stored raw)
    pub min_size_bytes: u64,
    /// Compression level (algorithm-specific)
    pub level: i32,
    /// Store raw instead of failing the write when compression errors
    pub fallback_on_failure: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default_algorithm: CompressionAlgorithm::Lz4,
            min_size_bytes: 1024, // 1KB minimum
            level: 4,
            fallback_on_failure: true,
        }
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through compressor (no compression)
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 block compressor with a size-prefixed frame
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    /// Create with custom compression level
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::with_level(4)
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: "LZ4".into(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Payload Codec
// =============================================================================

/// Result of encoding a payload for storage
#[derive(Debug, Clone)]
pub struct Encoded {
    /// Bytes as they will be stored
    pub payload: Bytes,
    /// Whether `payload` is compressed
    pub compressed: bool,
    /// original / stored (1.0 when stored raw)
    pub ratio: f64,
}

impl Encoded {
    fn raw(data: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(data),
            compressed: false,
            ratio: 1.0,
        }
    }
}

/// Threshold-driven codec used by the entry store
pub struct PayloadCodec {
    config: CompressionConfig,
    compressor: Box<dyn Compressor>,
}

impl PayloadCodec {
    /// Create a codec with default config
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: CompressionConfig) -> Self {
        let compressor: Box<dyn Compressor> = match config.default_algorithm {
            CompressionAlgorithm::None => Box::new(NoopCompressor),
            CompressionAlgorithm::Lz4 => Box::new(Lz4Compressor::with_level(config.level)),
        };
        Self { config, compressor }
    }

    /// Create with a caller-supplied compressor
    pub fn with_compressor(config: CompressionConfig, compressor: Box<dyn Compressor>) -> Self {
        Self { config, compressor }
    }

    /// Encode a serialized value for storage.
    ///
    /// Payloads below the threshold, and payloads that do not shrink, are
    /// stored raw.
    pub fn encode(&self, data: &[u8]) -> Encoded {
        if (data.len() as u64) < self.config.min_size_bytes
            || self.compressor.algorithm() == CompressionAlgorithm::None
        {
            return Encoded::raw(data);
        }

        match self.compressor.compress(data) {
            Ok(compressed) if !compressed.is_empty() && compressed.len() < data.len() => {
                let ratio = data.len() as f64 / compressed.len() as f64;
                Encoded {
                    payload: Bytes::from(compressed),
                    compressed: true,
                    ratio,
                }
            }
            Ok(_) => Encoded::raw(data),
            Err(e) => {
                tracing::warn!(
                    algorithm = %self.compressor.algorithm(),
                    error = %e,
                    "Compression failed, storing uncompressed"
                );
                Encoded::raw(data)
            }
        }
    }

    /// Encode, propagating compression failures when fallback is disabled
    pub fn try_encode(&self, data: &[u8]) -> Result<Encoded> {
        if self.config.fallback_on_failure
            || (data.len() as u64) < self.config.min_size_bytes
            || self.compressor.algorithm() == CompressionAlgorithm::None
        {
            return Ok(self.encode(data));
        }

        let compressed = self.compressor.compress(data)?;
        if compressed.len() < data.len() {
            Ok(Encoded {
                ratio: data.len() as f64 / compressed.len() as f64,
                payload: Bytes::from(compressed),
                compressed: true,
            })
        } else {
            Ok(Encoded::raw(data))
        }
    }

    /// Decode a stored payload.
    ///
    /// A payload that fails to decompress is returned as stored.
    pub fn decode(&self, payload: &Bytes, compressed: bool) -> Bytes {
        if !compressed {
            return payload.clone();
        }

        match self.compressor.decompress(payload) {
            Ok(decompressed) => Bytes::from(decompressed),
            Err(e) => {
                tracing::warn!(
                    algorithm = %self.compressor.algorithm(),
                    error = %e,
                    "Decompression failed, returning stored bytes"
                );
                payload.clone()
            }
        }
    }

    /// Get configuration
    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}
