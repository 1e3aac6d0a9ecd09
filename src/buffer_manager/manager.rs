use std::collections::HashMap;

use tracing::{debug, trace};

use super::{BufferFrame, BufferStats};
use crate::{
    datafile::Datafile,
    error::{Result, StoreError},
    page::{DataBlock, PageId},
    replacement::PolicyState,
};

/// Fixed-size cache of datafile pages.
pub struct BufferManager {
    datafile: Box<dyn Datafile>,
    buffer_pool: Vec<BufferFrame>,
    resident_table: HashMap<PageId, usize>,
    policy: PolicyState,
    stats: BufferStats,
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("capacity", &self.buffer_pool.len())
            .field("resident", &self.resident_table.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl BufferManager {
    pub fn new(datafile: Box<dyn Datafile>, num_buffers: usize) -> Result<Self> {
        if num_buffers == 0 {
            return Err(StoreError::config("buffer pool needs at least one frame"));
        }
        Ok(Self {
            datafile,
            buffer_pool: (0..num_buffers).map(|_| BufferFrame::new()).collect(),
            resident_table: HashMap::with_capacity(num_buffers),
            policy: PolicyState::new(num_buffers),
            stats: BufferStats::new(),
        })
    }

    /// Return the page `block_id`, reading it from the datafile on a miss.
    ///
    /// On a miss with every frame bound, the page bound longest ago is
    /// evicted first, and written back if dirty.
    pub fn fetch(&mut self, block_id: PageId) -> Result<&mut DataBlock> {
        if let Some(&frame_idx) = self.resident_table.get(&block_id) {
            self.stats.hits += 1;
            self.policy.record_hit(frame_idx);
            trace!(block_id, frame_idx, "buffer hit");
            return Ok(&mut self.buffer_pool[frame_idx].page);
        }

        self.stats.misses += 1;
        let page_count = self.datafile.page_count();
        if u32::from(block_id) >= page_count {
            return Err(StoreError::PageOutOfRange {
                page_id: block_id.into(),
                page_count,
            });
        }

        let frame_idx = match self.choose_unbound_frame() {
            Some(frame_idx) => frame_idx,
            None => self.evict()?,
        };
        self.buffer_pool[frame_idx].assign_to_block(block_id, self.datafile.as_mut())?;
        self.resident_table.insert(block_id, frame_idx);
        self.policy.on_frame_assigned(frame_idx);
        trace!(block_id, frame_idx, "buffer miss");
        Ok(&mut self.buffer_pool[frame_idx].page)
    }

    /// Flag the frame bound to `block_id` as modified.
    ///
    /// The page must have been fetched and still be resident.
    pub fn mark_dirty(&mut self, block_id: PageId) -> Result<()> {
        let frame_idx = self
            .resident_table
            .get(&block_id)
            .copied()
            .ok_or(StoreError::PageNotResident { page_id: block_id })?;
        self.buffer_pool[frame_idx].meta.dirty = true;
        Ok(())
    }

    /// Write every dirty frame back to the datafile. Nothing is evicted.
    ///
    /// Stops at the first I/O error; frames flushed before it stay clean.
    pub fn sync(&mut self) -> Result<()> {
        let mut flushed = 0;
        for frame in &mut self.buffer_pool {
            if frame.flush(self.datafile.as_mut())? {
                flushed += 1;
                self.stats.flushes += 1;
            }
        }
        self.datafile.sync()?;
        debug!(flushed, "synced buffer pool");
        Ok(())
    }

    /// Write `block_id` back if it is resident and dirty.
    pub fn flush(&mut self, block_id: PageId) -> Result<()> {
        if let Some(&frame_idx) = self.resident_table.get(&block_id) {
            if self.buffer_pool[frame_idx].flush(self.datafile.as_mut())? {
                self.stats.flushes += 1;
            }
        }
        Ok(())
    }

    /// Sync and release the datafile.
    pub fn close(mut self) -> Result<()> {
        self.sync()?;
        self.datafile.close()
    }

    pub fn is_resident(&self, block_id: PageId) -> bool {
        self.resident_table.contains_key(&block_id)
    }

    pub fn is_dirty(&self, block_id: PageId) -> bool {
        self.resident_table
            .get(&block_id)
            .is_some_and(|&frame_idx| self.buffer_pool[frame_idx].is_dirty())
    }

    pub fn resident_count(&self) -> usize {
        self.resident_table.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer_pool.len()
    }

    /// Pages addressable in the underlying datafile.
    pub fn page_count(&self) -> u32 {
        self.datafile.page_count()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    fn choose_unbound_frame(&self) -> Option<usize> {
        self.buffer_pool
            .iter()
            .position(|frame| !frame.meta.in_use())
    }

    /// Unbind the oldest frame, writing it back first if it is dirty.
    fn evict(&mut self) -> Result<usize> {
        let frame_idx = self
            .policy
            .evict_frame()
            .expect("a full buffer pool always has a bound frame to evict");
        let frame = &mut self.buffer_pool[frame_idx];
        match frame.flush(self.datafile.as_mut()) {
            Ok(true) => self.stats.flushes += 1,
            Ok(false) => {}
            Err(e) => {
                self.policy.restore_victim(frame_idx);
                return Err(e);
            }
        }
        if let Some(old_block) = frame.unbind() {
            self.resident_table.remove(&old_block);
            debug!(block_id = old_block, frame_idx, "evicted page");
        }
        self.stats.evictions += 1;
        Ok(frame_idx)
    }
}
