//! Checked handles to cached blocks.
//!
//! - [`BlockRef`] - A (slot, generation) handle into the pool
//! - [`PinnedBlock`] - A `BlockRef` holding a pin, dropped on drop
//!
//! Handles never alias the block directly. Every call takes the pool lock
//! and re-checks that the slot still holds the same block, so a handle to
//! an evicted or released block fails with `Error::StaleHandle` instead of
//! reaching whatever replaced it.

use std::fmt;

use crate::buffer::buffer_pool::BufferPool;
use crate::buffer::Block;
use crate::common::{BlockId, Result, SlotId};

/// Handle to a block cached in a [`BufferPool`].
///
/// Two handles compare equal iff they designate the same cached instance,
/// so all holders of equal handles see each other's writes.
///
/// # Example
/// ```no_run
/// # use blockpool::{BufferPool, BufferPoolConfig};
/// # let pool = BufferPool::new(BufferPoolConfig::new())?;
/// let a = pool.get_file_block("foo", 0)?;
/// let b = pool.get_file_block("./foo", 0)?;
/// assert_eq!(a, b);
/// # Ok::<(), blockpool::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct BlockRef<'a> {
    pool: &'a BufferPool,
    slot: SlotId,
    generation: u64,
}

impl<'a> BlockRef<'a> {
    pub(crate) fn new(pool: &'a BufferPool, slot: SlotId, generation: u64) -> Self {
        Self {
            pool,
            slot,
            generation,
        }
    }

    #[inline]
    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the block is still cached.
    pub fn is_valid(&self) -> bool {
        self.with_block(|_| Ok(())).is_ok()
    }

    pub fn block_id(&self) -> Result<BlockId> {
        self.with_block(|block| Ok(block.id().clone()))
    }

    // ========================================================================
    // Data access
    // ========================================================================

    /// Copy of the current contents, truncated to `effective_bytes`.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.with_block(|block| Ok(block.read()?.to_vec()))
    }

    /// See [`Block::write`].
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.with_block(|block| block.write(data))
    }

    /// Write back if dirty. Returns `true` if a write-back happened.
    pub fn flush(&self) -> Result<bool> {
        let flushed = self.with_block(Block::flush)?;
        if flushed {
            self.pool.stats.record_write();
        }
        Ok(flushed)
    }

    pub fn effective_bytes(&self) -> Result<usize> {
        self.with_block(|block| Ok(block.effective_bytes()))
    }

    pub fn is_dirty(&self) -> Result<bool> {
        self.with_block(|block| Ok(block.is_dirty()))
    }

    // ========================================================================
    // Pinning and release
    // ========================================================================

    /// Pin the block, making it ineligible for eviction. Returns the new count.
    pub fn pin(&self) -> Result<u32> {
        let mut state = self.pool.state.lock();
        let pins = state.block_mut(self.slot, self.generation)?.pin()?;
        state.set_evictable(self.slot, false);
        tracing::trace!("Pinned {} ({} holders)", self.slot, pins);
        Ok(pins)
    }

    /// Drop one pin. Returns the new count.
    ///
    /// # Errors
    /// `Error::BlockNotPinned` if the pin count is already 0.
    pub fn unpin(&self) -> Result<u32> {
        let mut state = self.pool.state.lock();
        let pins = state.block_mut(self.slot, self.generation)?.unpin()?;
        if pins == 0 {
            state.set_evictable(self.slot, true);
        }
        tracing::trace!("Unpinned {} ({} holders)", self.slot, pins);
        Ok(pins)
    }

    pub fn pin_count(&self) -> Result<u32> {
        self.with_block(|block| Ok(block.pin_count()))
    }

    /// Flush, close and remove the block from the pool.
    ///
    /// This handle and all equal ones become stale.
    ///
    /// # Errors
    /// `Error::BlockPinned` while anyone holds a pin.
    pub fn release(&self) -> Result<()> {
        let mut state = self.pool.state.lock();
        // validate the handle before touching the slot
        state.block_mut(self.slot, self.generation)?;
        state.release_slot(self.slot, false, &self.pool.stats)
    }

    fn with_block<R>(&self, f: impl FnOnce(&mut Block) -> Result<R>) -> Result<R> {
        let mut state = self.pool.state.lock();
        f(state.block_mut(self.slot, self.generation)?)
    }
}

impl PartialEq for BlockRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.pool, other.pool)
            && self.slot == other.slot
            && self.generation == other.generation
    }
}

impl Eq for BlockRef<'_> {}

impl fmt::Debug for BlockRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRef")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .finish()
    }
}

/// A pinned block. Unpinned automatically when dropped.
///
/// # Example
/// ```no_run
/// # use blockpool::{BufferPool, BufferPoolConfig};
/// # let pool = BufferPool::new(BufferPoolConfig::new())?;
/// {
///     let block = pool.pin_file_block("foo", 0)?;
///     block.write(b"data")?;
///     // block can't be evicted here
/// } // unpinned
/// # Ok::<(), blockpool::Error>(())
/// ```
#[derive(Debug)]
pub struct PinnedBlock<'a> {
    block: BlockRef<'a>,
}

impl<'a> PinnedBlock<'a> {
    pub(crate) fn new(block: BlockRef<'a>) -> Self {
        Self { block }
    }

    /// The underlying handle. Don't unpin through it; the guard does that.
    pub fn handle(&self) -> BlockRef<'a> {
        self.block
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.block.read()
    }

    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.block.write(data)
    }

    pub fn flush(&self) -> Result<bool> {
        self.block.flush()
    }

    pub fn block_id(&self) -> Result<BlockId> {
        self.block.block_id()
    }
}

impl Drop for PinnedBlock<'_> {
    fn drop(&mut self) {
        // fails if the pool was freed while the guard was alive
        if let Err(e) = self.block.unpin() {
            tracing::warn!("Could not unpin {:?} on drop: {}", self.block, e);
        }
    }
}
