//! Configuration for candlestore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CandleError, Result};

/// Main configuration for a candlestore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all symbol files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── BTCUSD.ohlcv
    ///     └── ETHUSD.ohlcv
    pub data_dir: PathBuf,

    /// Size a new file is created with before it grows (bytes)
    pub initial_file_size: u64,

    // -------------------------------------------------------------------------
    // Codec Configuration
    // -------------------------------------------------------------------------
    /// Fixed-point multiplier for open/high/low/close
    pub price_scale: f64,

    /// Fixed-point multiplier for volume
    pub volume_scale: f64,

    /// Bit-pack price and volume deltas after delta encoding
    pub bitpack: bool,

    /// Use the vectorized price encoder when the CPU supports it
    pub use_simd: bool,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Persist decode checkpoints in the index block
    pub persist_index: bool,

    /// Rows between two persisted checkpoints
    pub checkpoint_stride: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./candlestore_data"),
            initial_file_size: 1024 * 1024, // 1 MB
            price_scale: 10_000.0,
            volume_scale: 100.0,
            bitpack: true,
            use_simd: true,
            persist_index: true,
            checkpoint_stride: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the codec cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.price_scale.is_finite() && self.price_scale > 0.0) {
            return Err(CandleError::Config(format!(
                "price_scale must be positive and finite, got {}",
                self.price_scale
            )));
        }
        if !(self.volume_scale.is_finite() && self.volume_scale > 0.0) {
            return Err(CandleError::Config(format!(
                "volume_scale must be positive and finite, got {}",
                self.volume_scale
            )));
        }
        if self.checkpoint_stride == 0 {
            return Err(CandleError::Config(
                "checkpoint_stride must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all symbol files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the initial file size (in bytes)
    pub fn initial_file_size(mut self, size: u64) -> Self {
        self.config.initial_file_size = size;
        self
    }

    /// Set the price fixed-point scale
    pub fn price_scale(mut self, scale: f64) -> Self {
        self.config.price_scale = scale;
        self
    }

    /// Set the volume fixed-point scale
    pub fn volume_scale(mut self, scale: f64) -> Self {
        self.config.volume_scale = scale;
        self
    }

    /// Enable or disable bit packing of deltas
    pub fn bitpack(mut self, enabled: bool) -> Self {
        self.config.bitpack = enabled;
        self
    }

    /// Enable or disable the vectorized encoder
    pub fn use_simd(mut self, enabled: bool) -> Self {
        self.config.use_simd = enabled;
        self
    }

    /// Enable or disable the persisted checkpoint index
    pub fn persist_index(mut self, enabled: bool) -> Self {
        self.config.persist_index = enabled;
        self
    }

    /// Set the number of rows between checkpoints
    pub fn checkpoint_stride(mut self, rows: u64) -> Self {
        self.config.checkpoint_stride = rows;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
