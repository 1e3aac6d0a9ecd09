//! Variable-length records stored in slotted pages.
//!
//! Record pages form a doubly linked chain rooted at the control block. A
//! record that does not fit in one page is split into fragments, each one a
//! regular slot whose header points at the next fragment.

pub mod allocator;
pub mod page;

use std::fmt;

use crate::page::{PageId, PAGE_SIZE};

pub use allocator::{PageSummary, RecordAllocator};
pub use page::RecordPage;

/// Bytes of the page trailer: utilization, slot count, next and prev ids.
pub const MIN_UTILIZATION: usize = 8;

/// Bytes of one header slot in the directory.
pub const RECORD_HEADER_SIZE: usize = 12;

/// Largest fragment that fits in an otherwise empty page.
pub const MAX_DATA: usize = PAGE_SIZE - MIN_UTILIZATION - RECORD_HEADER_SIZE;

/// Physical address of a record, or of the first fragment of a chained one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub record_id: u32,
    pub data_block_id: PageId,
    pub local_id: u16,
}

impl RowId {
    pub fn new(record_id: u32, data_block_id: PageId, local_id: u16) -> Self {
        Self {
            record_id,
            data_block_id,
            local_id,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} at {}:{}",
            self.record_id, self.data_block_id, self.local_id
        )
    }
}

/// Continuation pointer stored in a header slot. Page 0 means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainPointer {
    pub data_block_id: PageId,
    pub local_id: u16,
}

impl ChainPointer {
    pub fn new(data_block_id: PageId, local_id: u16) -> Self {
        Self {
            data_block_id,
            local_id,
        }
    }
}
