//! blockpool - a fixed-capacity, pin-aware cache of file blocks.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        callers (records, pages, indexes)        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Buffer Pool (buffer/)                      │    │
//! │  │   BufferPool + Block + BlockRef/PinnedBlock + Stats     │    │
//! │  │        pin-aware LRU eviction, write-back on evict      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Storage Layer (storage/)                   │    │
//! │  │          BlockFile: open / read_at / write_at           │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, FileId, SlotId, Error, config)
//! - [`buffer`] - The block cache and its eviction policy
//! - [`storage`] - Backing file I/O
//!
//! # Quick Start
//! ```no_run
//! use blockpool::{BufferPool, BufferPoolConfig};
//!
//! let pool = BufferPool::new(BufferPoolConfig::new().with_block_size(5).with_capacity(2))?;
//!
//! let block = pool.get_file_block("foo", 2)?;
//! assert_eq!(block.read()?, b"d"); // "Hello World" has one byte in block 2
//! block.write(b"D")?;
//! block.release()?; // file now reads "Hello WorlD"
//! # Ok::<(), blockpool::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod storage;

pub use common::config::{DEFAULT_BLOCK_SIZE, DEFAULT_CAPACITY};
pub use common::{BlockId, BufferPoolConfig, Error, ErrorKind, FileId, Result, SlotId};

pub use buffer::{Block, BlockRef, BufferPool, BufferPoolStats, PinnedBlock, StatsSnapshot};
pub use storage::BlockFile;
