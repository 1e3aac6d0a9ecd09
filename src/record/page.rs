//! Slotted record page.
//!
//! ```text
//! 0                                                               4096
//! +------------------+-----------+------------+-------------------+
//! | record bytes --> |   free    | <-- header | prev next slots u |
//! +------------------+-----------+------------+-------------------+
//! ```
//!
//! Record bytes grow forward from offset 0 and are never compacted: a
//! removed record leaves an unreachable gap. Header slots grow backward from
//! the trailer, slot `i` at `HEADERS_END - (i + 1) * RECORD_HEADER_SIZE`:
//!
//! | Offset | Field                    | Type |
//! |--------|--------------------------|------|
//! | 0      | record_id (0 = empty)    | u32  |
//! | 4      | start                    | u16  |
//! | 6      | length                   | u16  |
//! | 8      | chain data_block_id      | u16  |
//! | 10     | chain local_id           | u16  |

use super::{ChainPointer, MIN_UTILIZATION, RECORD_HEADER_SIZE};
use crate::{
    error::{Result, StoreError},
    page::{DataBlock, PageId, PAGE_SIZE},
};

const UTILIZATION: usize = PAGE_SIZE - 2;
const TOTAL_SLOTS: usize = PAGE_SIZE - 4;
const NEXT_PAGE: usize = PAGE_SIZE - 6;
const PREV_PAGE: usize = PAGE_SIZE - 8;
const HEADERS_END: usize = PAGE_SIZE - MIN_UTILIZATION;

const SLOT_RECORD_ID: usize = 0;
const SLOT_START: usize = 4;
const SLOT_LENGTH: usize = 6;
const SLOT_CHAIN_PAGE: usize = 8;
const SLOT_CHAIN_LOCAL: usize = 10;

/// Decoded header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub record_id: u32,
    pub start: u16,
    pub length: u16,
    pub chain: Option<ChainPointer>,
}

impl Slot {
    pub fn is_live(&self) -> bool {
        self.record_id != 0
    }
}

/// Typed view of a page holding records.
pub struct RecordPage<'a> {
    page: &'a mut DataBlock,
}

impl<'a> RecordPage<'a> {
    pub fn new(page: &'a mut DataBlock) -> Self {
        Self { page }
    }

    pub fn id(&self) -> PageId {
        self.page.id()
    }

    /// Bytes accounted as used: trailer, header slots and live record bytes.
    /// A zeroed page reports the trailer size.
    pub fn utilization(&self) -> u16 {
        self.page.read_u16(UTILIZATION).max(MIN_UTILIZATION as u16)
    }

    fn set_utilization(&mut self, value: usize) {
        debug_assert!(value <= PAGE_SIZE);
        self.page.write_u16(UTILIZATION, value as u16);
    }

    pub fn total_slots(&self) -> u16 {
        self.page.read_u16(TOTAL_SLOTS)
    }

    pub fn next_page(&self) -> PageId {
        self.page.read_u16(NEXT_PAGE)
    }

    pub fn set_next_page(&mut self, page_id: PageId) {
        self.page.write_u16(NEXT_PAGE, page_id);
    }

    pub fn prev_page(&self) -> PageId {
        self.page.read_u16(PREV_PAGE)
    }

    pub fn set_prev_page(&mut self, page_id: PageId) {
        self.page.write_u16(PREV_PAGE, page_id);
    }

    fn slot_offset(local_id: u16) -> usize {
        HEADERS_END - (usize::from(local_id) + 1) * RECORD_HEADER_SIZE
    }

    fn directory_start(&self) -> usize {
        HEADERS_END - usize::from(self.total_slots()) * RECORD_HEADER_SIZE
    }

    /// End of the data region. Tombstones keep their extent, so removed
    /// bytes are never handed out again.
    fn data_end(&self) -> usize {
        (0..self.total_slots())
            .map(|local_id| {
                let offset = Self::slot_offset(local_id);
                usize::from(self.page.read_u16(offset + SLOT_START))
                    + usize::from(self.page.read_u16(offset + SLOT_LENGTH))
            })
            .max()
            .unwrap_or(0)
    }

    /// Contiguous bytes between the data region and the header directory.
    pub fn free_space(&self) -> u16 {
        (self.directory_start() - self.data_end()) as u16
    }

    /// Whether a `len`-byte record fits, counting a new header slot.
    pub fn fits(&self, len: usize) -> bool {
        usize::from(self.free_space()) >= len + RECORD_HEADER_SIZE
    }

    /// Header slot `local_id`. Panics if the slot was never allocated.
    pub fn slot(&self, local_id: u16) -> Slot {
        let total = self.total_slots();
        assert!(
            local_id < total,
            "local id {local_id} out of range on page {} ({total} slots)",
            self.id()
        );
        let offset = Self::slot_offset(local_id);
        let chain_page = self.page.read_u16(offset + SLOT_CHAIN_PAGE);
        Slot {
            record_id: self.page.read_u32(offset + SLOT_RECORD_ID),
            start: self.page.read_u16(offset + SLOT_START),
            length: self.page.read_u16(offset + SLOT_LENGTH),
            chain: (chain_page != 0).then(|| {
                ChainPointer::new(chain_page, self.page.read_u16(offset + SLOT_CHAIN_LOCAL))
            }),
        }
    }

    /// All header slots with their local ids, tombstones included.
    pub fn slots(&self) -> impl Iterator<Item = (u16, Slot)> + '_ {
        (0..self.total_slots()).map(move |local_id| (local_id, self.slot(local_id)))
    }

    pub fn live_count(&self) -> usize {
        self.slots().filter(|(_, slot)| slot.is_live()).count()
    }

    /// Store `bytes` under `record_id`, reusing the first empty slot if any.
    ///
    /// Returns the bytes written and the local id. The caller checks
    /// [`fits`](Self::fits) first; a record that does not fit panics.
    pub fn add(&mut self, record_id: u32, bytes: &[u8]) -> (usize, u16) {
        assert_ne!(record_id, 0, "record id 0 marks an empty slot");
        let reused = self
            .slots()
            .find(|(_, slot)| !slot.is_live())
            .map(|(local_id, _)| local_id);
        let header_growth = if reused.is_some() {
            0
        } else {
            RECORD_HEADER_SIZE
        };
        assert!(
            bytes.len() + header_growth <= usize::from(self.free_space()),
            "{} byte record does not fit on page {}",
            bytes.len(),
            self.id()
        );

        let start = self.data_end();
        let local_id = match reused {
            Some(local_id) => local_id,
            None => {
                let local_id = self.total_slots();
                self.page.write_u16(TOTAL_SLOTS, local_id + 1);
                local_id
            }
        };
        self.page.write_bytes(start, bytes);

        let offset = Self::slot_offset(local_id);
        self.page.write_u32(offset + SLOT_RECORD_ID, record_id);
        self.page.write_u16(offset + SLOT_START, start as u16);
        self.page.write_u16(offset + SLOT_LENGTH, bytes.len() as u16);
        self.page.write_u16(offset + SLOT_CHAIN_PAGE, 0);
        self.page.write_u16(offset + SLOT_CHAIN_LOCAL, 0);

        let utilization = usize::from(self.utilization()) + bytes.len() + header_growth;
        self.set_utilization(utilization);
        (bytes.len(), local_id)
    }

    /// Record bytes stored in `local_id`.
    pub fn read(&self, local_id: u16) -> Result<&[u8]> {
        let slot = self.slot(local_id);
        if !slot.is_live() {
            return Err(StoreError::SlotEmpty {
                page_id: self.id(),
                local_id,
            });
        }
        Ok(self
            .page
            .read_bytes(usize::from(slot.start), usize::from(slot.length)))
    }

    /// Overwrite the record in `local_id` with `bytes`, which may be shorter
    /// than the current contents but never longer.
    pub fn rewrite(&mut self, local_id: u16, bytes: &[u8]) {
        let slot = self.slot(local_id);
        assert!(slot.is_live(), "rewriting empty slot {local_id}");
        assert!(
            bytes.len() <= usize::from(slot.length),
            "rewrite of {} bytes into a {} byte slot",
            bytes.len(),
            slot.length
        );
        self.page.write_bytes(usize::from(slot.start), bytes);
        self.page
            .write_u16(Self::slot_offset(local_id) + SLOT_LENGTH, bytes.len() as u16);
        let utilization =
            usize::from(self.utilization()) - usize::from(slot.length) + bytes.len();
        self.set_utilization(utilization);
    }

    /// Tombstone `local_id`. Only the record bytes are returned to the
    /// utilization count; the header slot stays for reuse.
    pub fn remove(&mut self, local_id: u16) -> Result<()> {
        let slot = self.slot(local_id);
        if !slot.is_live() {
            return Err(StoreError::SlotEmpty {
                page_id: self.id(),
                local_id,
            });
        }
        let offset = Self::slot_offset(local_id);
        self.page.write_u32(offset + SLOT_RECORD_ID, 0);
        self.page.write_u16(offset + SLOT_CHAIN_PAGE, 0);
        self.page.write_u16(offset + SLOT_CHAIN_LOCAL, 0);
        let utilization = (usize::from(self.utilization()) - usize::from(slot.length))
            .max(MIN_UTILIZATION);
        self.set_utilization(utilization);
        Ok(())
    }

    pub fn chain(&self, local_id: u16) -> Option<ChainPointer> {
        self.slot(local_id).chain
    }

    pub fn set_chain(&mut self, local_id: u16, chain: Option<ChainPointer>) {
        let slot = self.slot(local_id);
        assert!(slot.is_live(), "chaining from empty slot {local_id}");
        let offset = Self::slot_offset(local_id);
        let (page_id, next_local) = chain.map_or((0, 0), |c| (c.data_block_id, c.local_id));
        self.page.write_u16(offset + SLOT_CHAIN_PAGE, page_id);
        self.page.write_u16(offset + SLOT_CHAIN_LOCAL, next_local);
    }

    /// Forget every slot and link.
    pub fn reset(&mut self) {
        self.page.clear();
    }
}
