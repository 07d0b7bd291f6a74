//! Configuration for groupwal
//!
//! Centralized configuration with sensible defaults. Everything is passed
//! at construction; nothing is read from files or the environment.

use std::time::Duration;

use crate::codec::RecordFormat;
use crate::error::{Result, WalError};

/// Number of alignment chunks per slot (slot capacity / chunk size)
pub const CHUNKS_PER_SLOT: usize = 64;

/// Main configuration for a group committer
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Ring Configuration
    // -------------------------------------------------------------------------
    /// Capacity of each slot in bytes (power of two, at least 64).
    /// One full slot is written with a single Writer call.
    pub slot_capacity: usize,

    /// Number of slots in the ring (power of two)
    pub ring_size: usize,

    // -------------------------------------------------------------------------
    // Record Configuration
    // -------------------------------------------------------------------------
    /// Minimum padded length of a record (device write granularity)
    pub min_write_size: usize,

    // -------------------------------------------------------------------------
    // Waiting Configuration
    // -------------------------------------------------------------------------
    /// How long a filler waits for its group before flushing it early
    /// (milliseconds)
    pub wait_timeout_ms: u64,
}

/// Sync strategy for the file-backed writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N writes (balanced durability/performance)
    EveryNWrites { count: usize },

    /// Never fsync; leave it to the OS (benchmarks only)
    Never,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slot_capacity: 16 * 1024, // 16 KB
            ring_size: 16,
            min_write_size: 512,
            wait_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the ring geometry and timeout
    pub fn validate(&self) -> Result<()> {
        if !self.slot_capacity.is_power_of_two() || self.slot_capacity < CHUNKS_PER_SLOT {
            return Err(WalError::Config(format!(
                "slot_capacity must be a power of two >= {}, got {}",
                CHUNKS_PER_SLOT, self.slot_capacity
            )));
        }
        if !self.ring_size.is_power_of_two() {
            return Err(WalError::Config(format!(
                "ring_size must be a power of two, got {}",
                self.ring_size
            )));
        }
        if self.wait_timeout_ms == 0 {
            return Err(WalError::Config("wait_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Alignment unit for padded records
    pub fn chunk_size(&self) -> usize {
        (self.slot_capacity / CHUNKS_PER_SLOT).max(1)
    }

    /// Distance between two generations of the same physical slot
    pub fn gap(&self) -> u64 {
        (self.slot_capacity as u64) * (self.ring_size as u64)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    /// Record padding rules derived from this config
    pub fn record_format(&self) -> RecordFormat {
        RecordFormat::new(self.min_write_size, self.chunk_size())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the slot capacity (in bytes)
    pub fn slot_capacity(mut self, bytes: usize) -> Self {
        self.config.slot_capacity = bytes;
        self
    }

    /// Set the number of slots in the ring
    pub fn ring_size(mut self, slots: usize) -> Self {
        self.config.ring_size = slots;
        self
    }

    /// Set the minimum padded record length (in bytes)
    pub fn min_write_size(mut self, bytes: usize) -> Self {
        self.config.min_write_size = bytes;
        self
    }

    /// Set the per-wait timeout (in milliseconds)
    pub fn wait_timeout_ms(mut self, ms: u64) -> Self {
        self.config.wait_timeout_ms = ms;
        self
    }

    /// Set the per-wait timeout (in seconds)
    pub fn wait_timeout_secs(mut self, secs: u64) -> Self {
        self.config.wait_timeout_ms = secs * 1000;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
