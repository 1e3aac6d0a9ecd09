//! Free-space bitmap: one bit per page id, set while the page is in use.
//!
//! The bitmap lives in consecutive pages starting at [`BITMAP_BASE_PAGE`] and
//! is always read and written through the buffer pool. Bits are numbered
//! most-significant first within each byte.

use tracing::{debug, warn};

use crate::{
    buffer_manager::BufferManager,
    error::{Result, StoreError},
    page::{PageId, PAGE_SIZE},
};

/// Page ids tracked by one bitmap page.
pub const BITS_PER_PAGE: usize = PAGE_SIZE * 8;

/// First page of the bitmap. Page 0 is the control block.
pub const BITMAP_BASE_PAGE: PageId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpaceMap {
    base: PageId,
    pages: u16,
    tracked: u32,
}

impl FreeSpaceMap {
    /// Bitmap for a datafile of `page_count` pages, sized to cover all of it.
    pub fn for_datafile(page_count: u32) -> Self {
        let pages = page_count.div_ceil(BITS_PER_PAGE as u32) as u16;
        Self::new(BITMAP_BASE_PAGE, pages, page_count)
    }

    pub fn new(base: PageId, pages: u16, tracked: u32) -> Self {
        assert!(
            tracked as usize <= usize::from(pages) * BITS_PER_PAGE,
            "{pages} bitmap pages cannot track {tracked} page ids"
        );
        Self {
            base,
            pages,
            tracked,
        }
    }

    /// Ids of the pages holding the bitmap itself.
    pub fn bitmap_pages(&self) -> impl Iterator<Item = PageId> {
        self.base..self.base + self.pages
    }

    pub fn tracked(&self) -> u32 {
        self.tracked
    }

    /// Owning bitmap page, byte offset and bit mask for `id`.
    fn locate(&self, id: PageId) -> (PageId, usize, u8) {
        assert!(
            u32::from(id) < self.tracked,
            "page {id} is outside the {} tracked pages",
            self.tracked
        );
        let id = usize::from(id);
        let page_bit_page = id / BITS_PER_PAGE;
        let bit_offset = id % BITS_PER_PAGE;
        (
            self.base + page_bit_page as PageId,
            bit_offset / 8,
            0x80 >> (bit_offset % 8),
        )
    }

    /// Zero the bitmap and mark the control block and bitmap pages used.
    pub fn format(&self, pool: &mut BufferManager) -> Result<()> {
        for page_id in self.bitmap_pages() {
            pool.fetch(page_id)?.clear();
            pool.mark_dirty(page_id)?;
        }
        self.mark_used(pool, 0)?;
        for page_id in self.bitmap_pages() {
            self.mark_used(pool, page_id)?;
        }
        Ok(())
    }

    pub fn is_in_use(&self, pool: &mut BufferManager, id: PageId) -> Result<bool> {
        let (page_id, byte, mask) = self.locate(id);
        Ok(pool.fetch(page_id)?.read_u8(byte) & mask != 0)
    }

    pub fn mark_used(&self, pool: &mut BufferManager, id: PageId) -> Result<()> {
        self.update_bit(pool, id, true)
    }

    pub fn mark_free(&self, pool: &mut BufferManager, id: PageId) -> Result<()> {
        self.update_bit(pool, id, false)
    }

    fn update_bit(&self, pool: &mut BufferManager, id: PageId, used: bool) -> Result<()> {
        let (page_id, byte, mask) = self.locate(id);
        let page = pool.fetch(page_id)?;
        let current = page.read_u8(byte);
        let updated = if used { current | mask } else { current & !mask };
        page.write_u8(byte, updated);
        pool.mark_dirty(page_id)
    }

    /// Lowest page id whose bit is clear, or None when every page is used.
    pub fn first_free(&self, pool: &mut BufferManager) -> Result<Option<PageId>> {
        for (page_idx, page_id) in self.bitmap_pages().enumerate() {
            let page = pool.fetch(page_id)?;
            for (byte_idx, &byte) in page.bytes().iter().enumerate() {
                if byte == 0xFF {
                    continue;
                }
                let bit = byte.leading_ones() as usize;
                let id = page_idx * BITS_PER_PAGE + byte_idx * 8 + bit;
                if id >= self.tracked as usize {
                    return Ok(None);
                }
                return Ok(Some(id as PageId));
            }
        }
        Ok(None)
    }

    pub fn all_in_use(&self, pool: &mut BufferManager) -> Result<bool> {
        Ok(self.first_free(pool)?.is_none())
    }

    /// Claim the first free page and zero it.
    pub fn allocate(&self, pool: &mut BufferManager) -> Result<PageId> {
        let page_id = self.first_free(pool)?.ok_or(StoreError::OutOfSpace)?;
        self.mark_used(pool, page_id)?;
        pool.fetch(page_id)?.clear();
        pool.mark_dirty(page_id)?;
        debug!(page_id, "allocated page");
        Ok(page_id)
    }

    /// Return `id` to the free pool.
    pub fn release(&self, pool: &mut BufferManager, id: PageId) -> Result<()> {
        if !self.is_in_use(pool, id)? {
            warn!(page_id = id, "releasing a page that is already free");
        }
        self.mark_free(pool, id)?;
        debug!(page_id = id, "released page");
        Ok(())
    }

    /// Number of pages marked used.
    pub fn count_in_use(&self, pool: &mut BufferManager) -> Result<u32> {
        let mut count = 0;
        let mut remaining = self.tracked as usize;
        for page_id in self.bitmap_pages() {
            let page = pool.fetch(page_id)?;
            let bits = remaining.min(BITS_PER_PAGE);
            let full_bytes = bits / 8;
            count += page.bytes()[..full_bytes]
                .iter()
                .map(|byte| byte.count_ones())
                .sum::<u32>();
            let tail_bits = bits % 8;
            if tail_bits > 0 {
                let tail_mask = !(0xFFu8 >> tail_bits);
                count += (page.read_u8(full_bytes) & tail_mask).count_ones();
            }
            remaining -= bits;
        }
        Ok(count)
    }

    /// Number of pages still available to `allocate`.
    pub fn count_free(&self, pool: &mut BufferManager) -> Result<u32> {
        Ok(self.tracked - self.count_in_use(pool)?)
    }
}
