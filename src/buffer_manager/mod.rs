//! Buffer pool for datafile pages.
//!
//! The pool holds a fixed number of frames, each able to cache one page. It
//! tracks which frames are dirty, evicts in FIFO order when every frame is
//! bound, and writes dirty pages back on eviction or on `sync`.
//!
//! # Shared Types
//!
//! - `FrameMeta`: Per-frame metadata (bound page id, dirty flag)
//! - `BufferFrame`: A buffer pool frame containing page data and metadata
//! - `BufferStats`: Hit/miss/eviction/flush counters for the pool
//!
//! A page returned by `fetch` is borrowed from the pool, so it cannot outlive
//! the next pool call that might evict it. Callers keep page ids, not pages.

mod manager;

pub use manager::BufferManager;

use crate::{
    datafile::Datafile,
    error::Result,
    page::{DataBlock, PageId},
};

// ============================================================================
// FrameMeta
// ============================================================================

#[derive(Debug, Default)]
pub struct FrameMeta {
    pub(crate) block_id: Option<PageId>,
    pub(crate) dirty: bool,
}

impl FrameMeta {
    pub fn in_use(&self) -> bool {
        self.block_id.is_some()
    }
}

// ============================================================================
// BufferFrame
// ============================================================================

#[derive(Debug)]
pub struct BufferFrame {
    page: DataBlock,
    meta: FrameMeta,
}

impl BufferFrame {
    pub fn new() -> Self {
        Self {
            page: DataBlock::new(0),
            meta: FrameMeta::default(),
        }
    }

    pub fn block_id(&self) -> Option<PageId> {
        self.meta.block_id
    }

    pub fn is_dirty(&self) -> bool {
        self.meta.dirty
    }

    /// Write the frame back if it is dirty. Returns whether a write happened.
    pub(crate) fn flush(&mut self, datafile: &mut dyn Datafile) -> Result<bool> {
        if !self.meta.dirty {
            return Ok(false);
        }
        let block_id = self
            .meta
            .block_id
            .expect("dirty frame must be bound to a page");
        datafile.write_block(block_id, self.page.bytes())?;
        self.meta.dirty = false;
        Ok(true)
    }

    /// Load `block_id` from the datafile into this (unbound) frame.
    pub(crate) fn assign_to_block(
        &mut self,
        block_id: PageId,
        datafile: &mut dyn Datafile,
    ) -> Result<()> {
        assert!(
            !self.meta.in_use(),
            "frame still bound to page {:?}",
            self.meta.block_id
        );
        datafile.read_block(block_id, self.page.bytes_mut())?;
        self.page.set_id(block_id);
        self.meta.block_id = Some(block_id);
        self.meta.dirty = false;
        Ok(())
    }

    /// Forget the bound page. The frame must already be clean.
    pub(crate) fn unbind(&mut self) -> Option<PageId> {
        assert!(!self.meta.dirty, "unbinding a dirty frame loses writes");
        self.meta.block_id.take()
    }
}

impl Default for BufferFrame {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BufferStats
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub flushes: usize,
}

impl BufferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod buffer_frame_tests {
    use super::*;
    use crate::datafile::MemoryDatafile;

    #[test]
    fn test_flush_only_writes_dirty_frames() {
        let mut datafile = MemoryDatafile::new(4);
        let mut frame = BufferFrame::new();
        frame.assign_to_block(2, &mut datafile).unwrap();
        assert!(!frame.flush(&mut datafile).unwrap());
        assert_eq!(datafile.write_count(), 0);

        frame.page.write_u32(0, 77);
        frame.meta.dirty = true;
        assert!(frame.flush(&mut datafile).unwrap());
        assert!(!frame.is_dirty());
        assert_eq!(datafile.snapshot(2)[3], 77);
    }

    #[test]
    fn test_unbind_clears_block_id() {
        let mut datafile = MemoryDatafile::new(4);
        let mut frame = BufferFrame::new();
        frame.assign_to_block(1, &mut datafile).unwrap();
        assert_eq!(frame.block_id(), Some(1));
        assert_eq!(frame.unbind(), Some(1));
        assert!(!frame.meta.in_use());
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = BufferStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
        stats.hits = 3;
        stats.misses = 1;
        assert_eq!(stats.hit_rate(), 75.0);
        stats.reset();
        assert_eq!(stats, BufferStats::default());
    }
}
