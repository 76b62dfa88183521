//! Buffer Pool - the block caching layer.
//!
//! The [`BufferPool`] provides:
//! - Block caching between backing files and memory
//! - One shared instance per (file, block number) while cached
//! - Pin-aware LRU eviction with write-back of dirty blocks
//! - Teardown that flushes everything

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{Block, BlockRef, BufferPoolStats, PinnedBlock};
use crate::common::{BlockId, BufferPoolConfig, Error, FileId, Result, SlotId};

/// A slot in the pool, holding at most one block.
///
/// `generation` identifies the current occupant. It is never reused, so a
/// [`BlockRef`] to an evicted block can't accidentally reach its successor.
struct Slot {
    generation: u64,
    block: Option<Block>,
}

/// Everything guarded by the pool lock.
pub(crate) struct PoolState {
    config: BufferPoolConfig,

    /// Fixed table of `capacity` slots.
    slots: Vec<Slot>,

    /// Maps cached block ids to their slot.
    block_table: HashMap<BlockId, SlotId>,

    /// Empty slots. Popped from the back.
    free_list: Vec<SlotId>,

    replacer: LruReplacer,

    next_generation: u64,
}

impl PoolState {
    fn new(config: BufferPoolConfig, next_generation: u64) -> Self {
        Self {
            config,
            slots: (0..config.capacity)
                .map(|_| Slot {
                    generation: 0,
                    block: None,
                })
                .collect(),
            block_table: HashMap::new(),
            // reversed so slot 0 is handed out first
            free_list: (0..config.capacity).rev().map(SlotId::new).collect(),
            replacer: LruReplacer::new(),
            next_generation,
        }
    }

    /// Look up the block behind a handle.
    ///
    /// # Errors
    /// `Error::StaleHandle` if the slot is empty or holds a different block.
    pub(crate) fn block_mut(&mut self, slot: SlotId, generation: u64) -> Result<&mut Block> {
        match self.slots.get_mut(slot.0) {
            Some(Slot {
                generation: current,
                block: Some(block),
            }) if *current == generation => Ok(block),
            _ => Err(Error::StaleHandle {
                slot: slot.0,
                generation,
            }),
        }
    }

    pub(crate) fn set_evictable(&mut self, slot: SlotId, evictable: bool) {
        self.replacer.set_evictable(slot, evictable);
    }

    /// Put a freshly loaded block into an empty slot. Returns its generation.
    fn install(&mut self, slot: SlotId, block: Block) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;

        self.block_table.insert(block.id().clone(), slot);
        self.replacer.record_access(slot);
        self.replacer.set_evictable(slot, !block.is_pinned());
        self.slots[slot.0] = Slot {
            generation,
            block: Some(block),
        };
        generation
    }

    /// Release the block in `slot` and, once its file is closed, drop it
    /// from the cache.
    ///
    /// With `force`, the pin count is ignored. A failed flush leaves the
    /// block cached, open and dirty.
    pub(crate) fn release_slot(
        &mut self,
        slot: SlotId,
        force: bool,
        stats: &BufferPoolStats,
    ) -> Result<()> {
        let Some(block) = self.slots[slot.0].block.as_mut() else {
            return Ok(());
        };

        let was_dirty = block.is_dirty();
        let result = if force {
            block.release_unchecked()
        } else {
            block.release()
        };
        if was_dirty && !block.is_dirty() && block.effective_bytes() > 0 {
            stats.record_write();
        }

        if block.is_released() {
            self.detach(slot);
        }
        result
    }

    fn detach(&mut self, slot: SlotId) {
        if let Some(block) = self.slots[slot.0].block.take() {
            self.block_table.remove(block.id());
            self.replacer.remove(slot);
            self.free_list.push(slot);
        }
    }

    fn len(&self) -> usize {
        self.block_table.len()
    }
}

/// A fixed-capacity cache of file blocks.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                          BufferPool                          │
/// │  ┌──────────────────┐  ┌──────────────────────────────────┐  │
/// │  │   block_table    │  │         slots: Vec<Slot>         │  │
/// │  │ BlockId → SlotId │─▶│  [Slot0] [Slot1] [Slot2] ...     │  │
/// │  └──────────────────┘  └──────────────────────────────────┘  │
/// │  ┌──────────────────┐  ┌──────────────────┐                  │
/// │  │    free_list     │  │     replacer     │                  │
/// │  │   Vec<SlotId>    │  │   LruReplacer    │                  │
/// │  └──────────────────┘  └──────────────────┘                  │
/// │        all of the above behind one Mutex<PoolState>          │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// The pool state sits behind a single `parking_lot::Mutex`, so choosing an
/// eviction victim and evicting it are atomic with respect to pins. `stats`
/// are atomics and need no lock. Nothing blocks waiting for a free slot: if
/// every block is pinned, the request fails immediately.
///
/// # Usage
/// ```no_run
/// use blockpool::{BufferPool, BufferPoolConfig};
///
/// let pool = BufferPool::new(BufferPoolConfig::new().with_block_size(5).with_capacity(2))?;
///
/// let block = pool.get_file_block("foo", 0)?;
/// block.pin()?;
/// block.write(b"Jello")?;
/// block.unpin()?;
///
/// pool.free()?; // writes back "Jello"
/// # Ok::<(), blockpool::Error>(())
/// ```
pub struct BufferPool {
    pub(crate) state: Mutex<PoolState>,
    pub(crate) stats: BufferPoolStats,
}

impl BufferPool {
    /// Create an empty pool.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `block_size` or `capacity` is 0.
    pub fn new(config: BufferPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(PoolState::new(config, 1)),
            stats: BufferPoolStats::new(),
        })
    }

    // ========================================================================
    // Public API: Fetch blocks
    // ========================================================================

    /// Get block `block_number` of the file at `path`.
    ///
    /// Equivalent paths (`foo`, `./foo`, absolute, through symlinks) map to
    /// the same cached block. The block is not pinned.
    ///
    /// On a miss with the pool full, the least recently accessed unpinned
    /// block is flushed, closed and evicted.
    ///
    /// # Errors
    /// - `Error::NoEvictableBlock` if the pool is full and every block is pinned
    /// - I/O errors from opening/reading the file, or from flushing the victim;
    ///   in both cases the cached blocks are left as they were
    pub fn get_file_block<P: AsRef<Path>>(
        &self,
        path: P,
        block_number: u64,
    ) -> Result<BlockRef<'_>> {
        let id = BlockId::new(FileId::resolve(path)?, block_number);
        let mut state = self.state.lock();
        let (slot, generation) = self.fetch_locked(&mut state, id)?;
        Ok(BlockRef::new(self, slot, generation))
    }

    /// Get a block and pin it in one step.
    ///
    /// The pin is dropped with the returned guard.
    pub fn pin_file_block<P: AsRef<Path>>(
        &self,
        path: P,
        block_number: u64,
    ) -> Result<PinnedBlock<'_>> {
        let id = BlockId::new(FileId::resolve(path)?, block_number);
        let mut state = self.state.lock();
        let (slot, generation) = self.fetch_locked(&mut state, id)?;

        state.block_mut(slot, generation)?.pin()?;
        state.set_evictable(slot, false);

        Ok(PinnedBlock::new(BlockRef::new(self, slot, generation)))
    }

    // ========================================================================
    // Public API: Flush and teardown
    // ========================================================================

    /// Write a cached block back if dirty. Does nothing if it isn't cached.
    pub fn flush_block<P: AsRef<Path>>(&self, path: P, block_number: u64) -> Result<()> {
        let id = BlockId::new(FileId::resolve(path)?, block_number);
        let mut state = self.state.lock();

        let Some(&slot) = state.block_table.get(&id) else {
            return Ok(());
        };
        if let Some(block) = state.slots[slot.0].block.as_mut() {
            if block.flush()? {
                self.stats.record_write();
            }
        }
        Ok(())
    }

    /// Write back every dirty block. Blocks stay cached.
    pub fn flush_all(&self) -> Result<()> {
        let mut state = self.state.lock();
        for slot in state.slots.iter_mut() {
            if let Some(block) = slot.block.as_mut() {
                if block.flush()? {
                    self.stats.record_write();
                }
            }
        }
        Ok(())
    }

    /// Release every cached block, pinned or not, and empty the cache.
    ///
    /// Outstanding handles become stale. A block whose flush fails stays
    /// cached (still dirty) and the first such error is returned after all
    /// other blocks were released.
    pub fn free(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut first_err = None;

        for idx in 0..state.slots.len() {
            let slot = SlotId::new(idx);
            let Some(block) = state.slots[idx].block.as_ref() else {
                continue;
            };
            let id = block.id().clone();
            if block.is_pinned() {
                tracing::warn!(
                    "Freeing {} with {} outstanding pins",
                    id,
                    block.pin_count()
                );
            }

            if let Err(e) = state.release_slot(slot, true, &self.stats) {
                tracing::error!("Failed to release {} during teardown: {}", id, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Change block size or capacity.
    ///
    /// # Errors
    /// `Error::PoolNotEmpty` unless the pool holds no blocks.
    pub fn reconfigure(&self, config: BufferPoolConfig) -> Result<()> {
        config.validate()?;
        let mut state = self.state.lock();
        if state.len() > 0 {
            return Err(Error::PoolNotEmpty(state.len()));
        }

        let next_generation = state.next_generation;
        *state = PoolState::new(config, next_generation);
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn config(&self) -> BufferPoolConfig {
        self.state.lock().config
    }

    pub fn block_size(&self) -> usize {
        self.config().block_size
    }

    pub fn capacity(&self) -> usize {
        self.config().capacity
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the block is cached. Does not count as an access.
    pub fn contains<P: AsRef<Path>>(&self, path: P, block_number: u64) -> bool {
        match FileId::resolve(path) {
            Ok(file) => self
                .state
                .lock()
                .block_table
                .contains_key(&BlockId::new(file, block_number)),
            Err(_) => false,
        }
    }

    /// Pin count of a cached block, or None if it isn't cached.
    pub fn pin_count<P: AsRef<Path>>(&self, path: P, block_number: u64) -> Option<u32> {
        let id = BlockId::new(FileId::resolve(path).ok()?, block_number);
        let state = self.state.lock();
        let slot = state.block_table.get(&id)?;
        state.slots[slot.0].block.as_ref().map(Block::pin_count)
    }

    /// Ids of all cached blocks, least recently accessed first.
    pub fn cached_blocks(&self) -> Vec<BlockId> {
        let state = self.state.lock();
        state
            .replacer
            .lru_order()
            .into_iter()
            .filter_map(|slot| state.slots[slot.0].block.as_ref())
            .map(|block| block.id().clone())
            .collect()
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Resolve `id` to a slot, loading (and evicting) on a miss.
    fn fetch_locked(&self, state: &mut PoolState, id: BlockId) -> Result<(SlotId, u64)> {
        if let Some(&slot) = state.block_table.get(&id) {
            state.replacer.record_access(slot);
            self.stats.record_hit();
            tracing::trace!("Cache hit for {} in {}", id, slot);
            return Ok((slot, state.slots[slot.0].generation));
        }

        self.stats.record_miss();

        // Choose the victim first: if everything is pinned, nothing is touched.
        let victim = if state.free_list.is_empty() {
            let victim = state.replacer.victim().ok_or(Error::NoEvictableBlock {
                capacity: state.config.capacity,
            })?;
            Some(victim)
        } else {
            None
        };

        // Load before evicting, so a bad file doesn't cost a cached block.
        let block = Block::load(
            id,
            state.config.block_size,
            state.config.sync_on_flush,
        )?;
        self.stats.record_read();

        if let Some(victim) = victim {
            self.evict(state, victim)?;
        }

        let slot = state.free_list.pop().ok_or(Error::NoEvictableBlock {
            capacity: state.config.capacity,
        })?;

        tracing::debug!(
            "Loaded {} into {} ({} effective bytes)",
            block.id(),
            slot,
            block.effective_bytes()
        );
        let generation = state.install(slot, block);
        Ok((slot, generation))
    }

    /// Flush, close and drop the block in `victim`.
    fn evict(&self, state: &mut PoolState, victim: SlotId) -> Result<()> {
        let victim_id = state.slots[victim.0].block.as_ref().map(|b| b.id().clone());

        state.release_slot(victim, false, &self.stats)?;

        self.stats.record_eviction();
        if let Some(id) = victim_id {
            tracing::debug!("Evicted {} from {}", id, victim);
        }
        Ok(())
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            tracing::error!("Buffer pool dropped with unflushed blocks: {}", e);
        }
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BufferPool")
            .field("config", &state.config)
            .field("len", &state.len())
            .finish()
    }
}
