//! Error types for blockpool.

use thiserror::Error;

use crate::common::BlockId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
///
/// Callers that only care about "what went wrong" (retry after unpinning,
/// fix the calling code, surface an I/O failure) can match on this instead
/// of individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming error: unbalanced unpin, use after release, stale handle.
    InvalidState,
    /// The block is still pinned by someone.
    Busy,
    /// Every cached block is pinned and the pool is full.
    ResourceExhausted,
    /// The backing file failed.
    Io,
    /// A caller-supplied argument was rejected.
    InvalidArgument,
}

/// All possible errors in blockpool.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing file, surfaced verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempted to unpin a block that wasn't pinned.
    #[error("{0} is not pinned")]
    BlockNotPinned(BlockId),

    /// The block was released and its file handle closed.
    #[error("{0} has been released")]
    BlockReleased(BlockId),

    /// The handle refers to a slot that has since been evicted or reused.
    #[error("block handle is stale (slot {slot}, generation {generation})")]
    StaleHandle { slot: usize, generation: u64 },

    /// Tried to release a block someone still holds.
    #[error("{block} is pinned ({pin_count} holders)")]
    BlockPinned { block: BlockId, pin_count: u32 },

    /// Pool is at capacity and every cached block is pinned.
    #[error("no evictable block: all {capacity} cached blocks are pinned")]
    NoEvictableBlock { capacity: usize },

    /// Write larger than the block.
    #[error("write of {len} bytes exceeds block size {block_size}")]
    WriteOverflow { len: usize, block_size: usize },

    /// Rejected pool configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Reconfiguration requested while blocks are still cached.
    #[error("cannot reconfigure a pool holding {0} blocks")]
    PoolNotEmpty(usize),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::BlockNotPinned(_) | Error::BlockReleased(_) | Error::StaleHandle { .. } => {
                ErrorKind::InvalidState
            }
            Error::BlockPinned { .. } | Error::PoolNotEmpty(_) => ErrorKind::Busy,
            Error::NoEvictableBlock { .. } => ErrorKind::ResourceExhausted,
            Error::WriteOverflow { .. } | Error::InvalidConfig(_) => ErrorKind::InvalidArgument,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FileId;
    use std::path::PathBuf;

    fn block_id(n: u64) -> BlockId {
        BlockId::new(FileId::from_canonical(PathBuf::from("/data/foo")), n)
    }

    #[test]
    fn test_error_display() {
        let err = Error::NoEvictableBlock { capacity: 2 };
        assert_eq!(
            format!("{}", err),
            "no evictable block: all 2 cached blocks are pinned"
        );

        let err = Error::BlockNotPinned(block_id(3));
        assert_eq!(format!("{}", err), "Block(/data/foo#3) is not pinned");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::BlockNotPinned(block_id(0)).kind(), ErrorKind::InvalidState);
        assert_eq!(Error::BlockReleased(block_id(0)).kind(), ErrorKind::InvalidState);
        assert_eq!(
            Error::StaleHandle { slot: 0, generation: 1 }.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            Error::BlockPinned { block: block_id(0), pin_count: 1 }.kind(),
            ErrorKind::Busy
        );
        assert_eq!(
            Error::NoEvictableBlock { capacity: 1 }.kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            Error::WriteOverflow { len: 6, block_size: 5 }.kind(),
            ErrorKind::InvalidArgument
        );
    }
}
