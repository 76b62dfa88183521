//! Common types shared across blockpool.
//!
//! - Configuration
//! - Error types
//! - Identifiers (BlockId, FileId, SlotId)

pub mod config;
pub mod error;
mod block_id;
mod slot_id;

pub use block_id::{BlockId, FileId};
pub use config::BufferPoolConfig;
pub use error::{Error, ErrorKind, Result};
pub use slot_id::SlotId;
