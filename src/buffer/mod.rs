//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between callers and backing
//! files. It holds a bounded number of blocks, each a fixed-size window
//! of one file.
//!
//! # Components
//! - [`BufferPool`] - The block cache
//! - [`Block`] - One cached block + its pin count and dirty flag
//! - [`BlockRef`] / [`PinnedBlock`] - Checked handles into the pool
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod block;
mod block_ref;
mod buffer_pool;
pub mod replacer;
mod stats;

pub use block::Block;
pub use block_ref::{BlockRef, PinnedBlock};
pub use buffer_pool::BufferPool;
pub use stats::{BufferPoolStats, StatsSnapshot};
