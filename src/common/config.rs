//! Pool configuration.

use crate::common::{Error, Result};

/// Default block size in bytes (4KB).
///
/// Matches the OS page size on most systems, so a block maps onto one
/// page-cache page of the backing file.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Default number of simultaneously cached blocks.
pub const DEFAULT_CAPACITY: usize = 64;

/// Configuration for a [`BufferPool`](crate::BufferPool).
///
/// Both sizes are fixed for the life of the pool's contents; see
/// [`BufferPool::reconfigure`](crate::BufferPool::reconfigure).
///
/// # Example
/// ```
/// use blockpool::BufferPoolConfig;
///
/// let config = BufferPoolConfig::new()
///     .with_block_size(512)
///     .with_capacity(8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Bytes per block. Must be > 0.
    pub block_size: usize,

    /// Maximum number of cached blocks. Must be > 0.
    pub capacity: usize,

    /// `fsync` the backing file after every write-back.
    pub sync_on_flush: bool,
}

impl BufferPoolConfig {
    /// Configuration with default sizes.
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            capacity: DEFAULT_CAPACITY,
            sync_on_flush: false,
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_sync_on_flush(mut self, sync_on_flush: bool) -> Self {
        self.sync_on_flush = sync_on_flush;
        self
    }

    /// Check that both sizes are non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0"));
        }
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}
