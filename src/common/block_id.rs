//! Block and file identifier types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::common::Result;

/// Canonical identity of a backing file.
///
/// Two spellings of the same file (`foo`, `./foo`, `/abs/dir/foo`, a symlink)
/// resolve to the same `FileId`, which is what makes them collide in the
/// buffer pool's cache.
///
/// Cloning is cheap: the path is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<Path>);

impl FileId {
    /// Resolve `path` through the filesystem.
    ///
    /// # Errors
    /// Fails with `Error::Io` if the file does not exist.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical = std::fs::canonicalize(path)?;
        Ok(Self::from_canonical(canonical))
    }

    /// Wrap a path that is already canonical. No filesystem access.
    #[inline]
    pub fn from_canonical(path: PathBuf) -> Self {
        FileId(Arc::from(path))
    }

    /// The canonical path.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Identifies one block of one file: the buffer pool's cache key.
///
/// Block `n` covers bytes `[n × block_size, (n + 1) × block_size)` of the file.
///
/// # Example
/// ```
/// use blockpool::{BlockId, FileId};
/// use std::path::PathBuf;
///
/// let file = FileId::from_canonical(PathBuf::from("/data/foo"));
/// let block_id = BlockId::new(file, 2);
/// assert_eq!(block_id.byte_offset(5), Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub file: FileId,
    pub block_number: u64,
}

impl BlockId {
    #[inline]
    pub fn new(file: FileId, block_number: u64) -> Self {
        BlockId { file, block_number }
    }

    /// Byte offset of this block within its file.
    ///
    /// `None` past the largest seekable position (`i64::MAX`); no file can
    /// reach such a block, so callers treat it as past end-of-file.
    #[inline]
    pub fn byte_offset(&self, block_size: usize) -> Option<u64> {
        self.block_number
            .checked_mul(block_size as u64)
            .filter(|&offset| offset <= i64::MAX as u64)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({}#{})", self.file, self.block_number)
    }
}
