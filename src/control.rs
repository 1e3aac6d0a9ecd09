//! Control block: the well-known page 0.
//!
//! | Offset | Field                        | Type |
//! |--------|------------------------------|------|
//! | 0      | next_id                      | u32  |
//! | 4      | next_available_record_page   | u16  |
//! | 6      | first_record_page            | u16  |
//! | 8      | index_root                   | u16  |
//! | 10     | index_first_leaf             | u16  |
//! | 12     | magic                        | u32  |
//! | 16     | datafile_pages               | u32  |
//! | 20     | index_leaf_capacity          | u16  |
//! | 22     | index_branch_capacity        | u16  |

use crate::{
    buffer_manager::BufferManager,
    error::Result,
    page::{DataBlock, PageId},
};

pub const CONTROL_PAGE: PageId = 0;

/// Marks a formatted datafile.
pub const MAGIC: u32 = u32::from_be_bytes(*b"BLKD");

const NEXT_ID: usize = 0;
const NEXT_AVAILABLE_RECORD_PAGE: usize = 4;
const FIRST_RECORD_PAGE: usize = 6;
const INDEX_ROOT: usize = 8;
const INDEX_FIRST_LEAF: usize = 10;
const MAGIC_OFFSET: usize = 12;
const DATAFILE_PAGES: usize = 16;
const INDEX_LEAF_CAPACITY: usize = 20;
const INDEX_BRANCH_CAPACITY: usize = 22;

/// Copy of the control block fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInfo {
    pub next_id: u32,
    pub next_available_record_page: PageId,
    pub first_record_page: PageId,
    pub index_root: PageId,
    pub index_first_leaf: PageId,
    pub datafile_pages: u32,
    pub index_leaf_capacity: u16,
    pub index_branch_capacity: u16,
}

/// Typed view over the control block page.
pub struct ControlBlock<'a> {
    page: &'a mut DataBlock,
}

impl<'a> ControlBlock<'a> {
    pub fn new(page: &'a mut DataBlock) -> Self {
        debug_assert_eq!(page.id(), CONTROL_PAGE);
        Self { page }
    }

    /// Read the control block through the pool.
    pub fn snapshot(pool: &mut BufferManager) -> Result<ControlInfo> {
        Ok(ControlBlock::new(pool.fetch(CONTROL_PAGE)?).info())
    }

    /// Apply `f` to the control block and mark it dirty.
    pub fn modify<R>(
        pool: &mut BufferManager,
        f: impl FnOnce(&mut ControlBlock<'_>) -> R,
    ) -> Result<R> {
        let result = f(&mut ControlBlock::new(pool.fetch(CONTROL_PAGE)?));
        pool.mark_dirty(CONTROL_PAGE)?;
        Ok(result)
    }

    pub fn is_formatted(&self) -> bool {
        self.page.read_u32(MAGIC_OFFSET) == MAGIC
    }

    /// Reset the page to a fresh control block. Record ids start at 1.
    pub fn format(&mut self, datafile_pages: u32) {
        self.page.clear();
        self.page.write_u32(MAGIC_OFFSET, MAGIC);
        self.page.write_u32(DATAFILE_PAGES, datafile_pages);
        self.set_next_id(1);
    }

    pub fn info(&self) -> ControlInfo {
        ControlInfo {
            next_id: self.next_id(),
            next_available_record_page: self.next_available_record_page(),
            first_record_page: self.first_record_page(),
            index_root: self.index_root(),
            index_first_leaf: self.index_first_leaf(),
            datafile_pages: self.datafile_pages(),
            index_leaf_capacity: self.page.read_u16(INDEX_LEAF_CAPACITY),
            index_branch_capacity: self.page.read_u16(INDEX_BRANCH_CAPACITY),
        }
    }

    pub fn next_id(&self) -> u32 {
        self.page.read_u32(NEXT_ID)
    }

    pub fn set_next_id(&mut self, id: u32) {
        self.page.write_u32(NEXT_ID, id);
    }

    /// Hand out the next record id and advance the counter.
    pub fn take_next_id(&mut self) -> u32 {
        let id = self.next_id();
        let next = id.checked_add(1).expect("record id space exhausted");
        self.set_next_id(next);
        id
    }

    pub fn next_available_record_page(&self) -> PageId {
        self.page.read_u16(NEXT_AVAILABLE_RECORD_PAGE)
    }

    pub fn set_next_available_record_page(&mut self, page_id: PageId) {
        self.page.write_u16(NEXT_AVAILABLE_RECORD_PAGE, page_id);
    }

    pub fn first_record_page(&self) -> PageId {
        self.page.read_u16(FIRST_RECORD_PAGE)
    }

    pub fn set_first_record_page(&mut self, page_id: PageId) {
        self.page.write_u16(FIRST_RECORD_PAGE, page_id);
    }

    pub fn index_root(&self) -> PageId {
        self.page.read_u16(INDEX_ROOT)
    }

    pub fn set_index_root(&mut self, page_id: PageId) {
        self.page.write_u16(INDEX_ROOT, page_id);
    }

    pub fn index_first_leaf(&self) -> PageId {
        self.page.read_u16(INDEX_FIRST_LEAF)
    }

    pub fn set_index_first_leaf(&mut self, page_id: PageId) {
        self.page.write_u16(INDEX_FIRST_LEAF, page_id);
    }

    pub fn datafile_pages(&self) -> u32 {
        self.page.read_u32(DATAFILE_PAGES)
    }

    /// Index node capacity as (leaf, branch); zero until the index is
    /// created.
    pub fn index_capacity(&self) -> (u16, u16) {
        (
            self.page.read_u16(INDEX_LEAF_CAPACITY),
            self.page.read_u16(INDEX_BRANCH_CAPACITY),
        )
    }

    pub fn set_index_capacity(&mut self, leaf: u16, branch: u16) {
        self.page.write_u16(INDEX_LEAF_CAPACITY, leaf);
        self.page.write_u16(INDEX_BRANCH_CAPACITY, branch);
    }
}
