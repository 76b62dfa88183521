//! Block - one cached window of one file.
//!
//! A [`Block`] holds the bytes of a block plus the metadata needed for
//! buffer management:
//! - How many of those bytes actually exist on disk (`effective_bytes`)
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//! - The open handle to the backing file, until release

use crate::common::{BlockId, Error, FileId, Result};
use crate::storage::BlockFile;

/// A fixed-size window into a file, cached in memory.
///
/// # Lifecycle
/// ```text
/// load ──▶ LOADED (pin_count = 0) ⇄ PINNED (pin_count > 0)
///              │
///              └── release ──▶ RELEASED (terminal)
/// ```
///
/// Every operation on a released block fails with `Error::BlockReleased`.
///
/// # Partial blocks
/// The last block of a file whose length is not a multiple of `block_size`
/// has `effective_bytes < block_size`. A block entirely past end-of-file
/// loads as an empty block (`effective_bytes == 0`): reads return nothing
/// and writes are never persisted. The file is never extended.
///
/// # Example
/// ```no_run
/// use blockpool::Block;
///
/// let mut block = Block::open(5, "foo", 0)?;
/// block.write(b"abcde")?;
/// block.release()?; // flushes, then closes the file
/// # Ok::<(), blockpool::Error>(())
/// ```
#[derive(Debug)]
pub struct Block {
    id: BlockId,
    block_size: usize,

    /// Always `block_size` long; only `[..effective_bytes]` mirrors the file.
    data: Vec<u8>,
    effective_bytes: usize,

    /// Whether the data has been written since loading or the last flush.
    dirty: bool,
    pin_count: u32,

    /// `None` once released.
    file: Option<BlockFile>,
}

impl Block {
    /// Load block `block_number` of the file at `path`.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `block_size` is 0
    /// - I/O errors if the file doesn't exist or can't be read
    pub fn open<P: AsRef<std::path::Path>>(
        block_size: usize,
        path: P,
        block_number: u64,
    ) -> Result<Self> {
        let file = FileId::resolve(path)?;
        Self::load(BlockId::new(file, block_number), block_size, false)
    }

    /// Load the block identified by `id`.
    ///
    /// With `sync_on_write`, every flush is followed by `fsync()`.
    pub fn load(id: BlockId, block_size: usize, sync_on_write: bool) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0"));
        }

        let mut file = BlockFile::open(id.file.path(), sync_on_write)?;
        let mut data = vec![0u8; block_size];
        let effective_bytes = match id.byte_offset(block_size) {
            Some(offset) => file.read_at(offset, &mut data)?,
            None => 0,
        };

        Ok(Self {
            id,
            block_size,
            data,
            effective_bytes,
            dirty: false,
            pin_count: 0,
            file: Some(file),
        })
    }

    // ========================================================================
    // Identity and size
    // ========================================================================

    #[inline]
    pub fn id(&self) -> &BlockId {
        &self.id
    }

    #[inline]
    pub fn block_number(&self) -> u64 {
        self.id.block_number
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of bytes of this block that exist in the file.
    #[inline]
    pub fn effective_bytes(&self) -> usize {
        self.effective_bytes
    }

    // ========================================================================
    // Data access
    // ========================================================================

    /// The current contents, truncated to `effective_bytes`.
    pub fn read(&self) -> Result<&[u8]> {
        self.ensure_open()?;
        Ok(&self.data[..self.effective_bytes])
    }

    /// Overwrite the buffer from offset 0 with `data`.
    ///
    /// Always marks the block dirty, even if the content is unchanged.
    /// Bytes past `effective_bytes` stay in memory but are never written back.
    ///
    /// # Errors
    /// - `Error::WriteOverflow` if `data` is longer than `block_size`
    /// - `Error::BlockReleased` after release
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if data.len() > self.block_size {
            return Err(Error::WriteOverflow {
                len: data.len(),
                block_size: self.block_size,
            });
        }

        self.data[..data.len()].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    /// Write `effective_bytes` back to the file if dirty.
    ///
    /// Returns `true` if a write-back happened. The dirty flag is only cleared
    /// once the write succeeded.
    pub fn flush(&mut self) -> Result<bool> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::BlockReleased(self.id.clone()))?;

        if !self.dirty {
            return Ok(false);
        }

        // blocks past end-of-file have nothing to persist
        let offset = match self.id.byte_offset(self.block_size) {
            Some(offset) if self.effective_bytes > 0 => offset,
            _ => {
                self.dirty = false;
                return Ok(false);
            }
        };
        file.write_at(offset, &self.data[..self.effective_bytes])?;
        self.dirty = false;

        tracing::debug!(
            "Flushed {} ({} bytes at offset {})",
            self.id,
            self.effective_bytes,
            offset
        );
        Ok(true)
    }

    // ========================================================================
    // Pin count operations
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    pub fn pin(&mut self) -> Result<u32> {
        self.ensure_open()?;
        self.pin_count += 1;
        Ok(self.pin_count)
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Errors
    /// `Error::BlockNotPinned` if the pin count is already 0.
    pub fn unpin(&mut self) -> Result<u32> {
        self.ensure_open()?;
        if self.pin_count == 0 {
            return Err(Error::BlockNotPinned(self.id.clone()));
        }
        self.pin_count -= 1;
        Ok(self.pin_count)
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.file.is_none()
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Flush if dirty, then close the backing file.
    ///
    /// If the flush fails the block stays open and dirty, so the only copy
    /// of the data is not lost.
    ///
    /// # Errors
    /// - `Error::BlockPinned` if anyone still holds a pin
    /// - `Error::BlockReleased` if already released
    pub fn release(&mut self) -> Result<()> {
        if self.pin_count > 0 && !self.is_released() {
            return Err(Error::BlockPinned {
                block: self.id.clone(),
                pin_count: self.pin_count,
            });
        }
        self.release_unchecked()
    }

    /// Release regardless of the pin count. Used by pool teardown.
    pub(crate) fn release_unchecked(&mut self) -> Result<()> {
        self.flush()?;

        // flush() succeeded, so the file is still present
        if let Some(file) = self.file.take() {
            file.close()?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::BlockReleased(self.id.clone()));
        }
        Ok(())
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        if self.dirty && !self.is_released() {
            if let Err(e) = self.flush() {
                tracing::error!("Lost write for {} dropped while dirty: {}", self.id, e);
            }
        }
    }
}
