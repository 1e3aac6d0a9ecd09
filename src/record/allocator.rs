//! Record placement across the chain of record pages.
//!
//! Inserts walk the chain from the control block's next-available page and
//! append a new page through the free-space bitmap when the tail is full.
//! Records longer than [`MAX_DATA`] become chained rows: `MAX_DATA` sized
//! fragments linked through the continuation pointer of their header slots.

use tracing::debug;

use super::{page::RecordPage, ChainPointer, RowId, MAX_DATA};
use crate::{
    buffer_manager::BufferManager,
    control::ControlBlock,
    error::{Result, StoreError},
    free_space::FreeSpaceMap,
    page::PageId,
};

/// One fragment of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fragment {
    page_id: PageId,
    local_id: u16,
    length: u16,
}

/// Occupancy of one record page, as reported by [`RecordAllocator::pages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub page_id: PageId,
    pub utilization: u16,
    pub free_space: u16,
    pub slots: u16,
    pub live_slots: usize,
    pub next: PageId,
    pub prev: PageId,
}

pub struct RecordAllocator<'a> {
    pool: &'a mut BufferManager,
    space: FreeSpaceMap,
}

impl<'a> RecordAllocator<'a> {
    pub fn new(pool: &'a mut BufferManager, space: FreeSpaceMap) -> Self {
        Self { pool, space }
    }

    /// Allocate the first record page and point the control block at it.
    pub fn format(&mut self) -> Result<PageId> {
        let page_id = self.space.allocate(self.pool)?;
        ControlBlock::modify(self.pool, |control| {
            control.set_first_record_page(page_id);
            control.set_next_available_record_page(page_id);
        })?;
        debug!(page_id, "created record chain");
        Ok(page_id)
    }

    /// Store `bytes` under `record_id` and return the address of its first
    /// fragment. Either every fragment is written or none is.
    pub fn insert(&mut self, record_id: u32, bytes: &[u8]) -> Result<RowId> {
        let fragments = self.place_all(record_id, bytes)?;
        let head = fragments[0];
        if fragments.len() > 1 {
            debug!(record_id, fragments = fragments.len(), "stored chained row");
        }
        Ok(RowId::new(record_id, head.page_id, head.local_id))
    }

    /// Bytes of the record at `row_id`, fragments concatenated in order.
    pub fn find(&mut self, row_id: RowId) -> Result<Vec<u8>> {
        let fragments = self.fragments(row_id)?;
        let mut bytes =
            Vec::with_capacity(fragments.iter().map(|f| usize::from(f.length)).sum());
        for fragment in fragments {
            let page = RecordPage::new(self.pool.fetch(fragment.page_id)?);
            bytes.extend_from_slice(page.read(fragment.local_id)?);
        }
        Ok(bytes)
    }

    /// Replace the contents of `row_id`, keeping its address.
    ///
    /// Existing fragments are overwritten up to their current length. Bytes
    /// beyond that go to new fragments, written before anything else is
    /// touched, so running out of space leaves the record as it was.
    /// Fragments no longer needed are removed.
    pub fn update(&mut self, row_id: RowId, bytes: &[u8]) -> Result<()> {
        let existing = self.fragments(row_id)?;

        let mut remaining = bytes;
        let mut used = Vec::with_capacity(existing.len());
        for (idx, fragment) in existing.iter().enumerate() {
            if idx > 0 && remaining.is_empty() {
                break;
            }
            let take = remaining.len().min(usize::from(fragment.length));
            let (chunk, rest) = remaining.split_at(take);
            used.push((*fragment, chunk));
            remaining = rest;
        }
        let surplus = &existing[used.len()..];

        let extra = if remaining.is_empty() {
            None
        } else {
            Some(self.place_all(row_id.record_id, remaining)?[0])
        };

        for (fragment, chunk) in &used {
            RecordPage::new(self.pool.fetch(fragment.page_id)?).rewrite(fragment.local_id, chunk);
            self.pool.mark_dirty(fragment.page_id)?;
        }
        let (last, _) = *used.last().expect("the head fragment is always kept");
        let continuation = extra.map(|head| ChainPointer::new(head.page_id, head.local_id));
        self.set_chain(last, continuation)?;

        for fragment in surplus {
            self.discard(*fragment)?;
        }
        debug!(
            record_id = row_id.record_id,
            kept = used.len(),
            dropped = surplus.len(),
            grown = extra.is_some(),
            "updated record"
        );
        Ok(())
    }

    /// Remove the record at `row_id` and every continuation fragment.
    pub fn remove(&mut self, row_id: RowId) -> Result<()> {
        for fragment in self.fragments(row_id)? {
            self.discard(fragment)?;
        }
        Ok(())
    }

    /// Walk the record chain from its first page.
    pub fn pages(&mut self) -> Result<Vec<PageSummary>> {
        let mut summaries = Vec::new();
        let mut page_id = ControlBlock::snapshot(self.pool)?.first_record_page;
        while page_id != 0 {
            let page = RecordPage::new(self.pool.fetch(page_id)?);
            let summary = PageSummary {
                page_id,
                utilization: page.utilization(),
                free_space: page.free_space(),
                slots: page.total_slots(),
                live_slots: page.live_count(),
                next: page.next_page(),
                prev: page.prev_page(),
            };
            assert!(
                summaries.len() < self.pool.page_count() as usize,
                "record chain loops back on page {page_id}"
            );
            page_id = summary.next;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    /// Place `bytes` as one or more linked fragments. On failure the
    /// fragments already written are removed again.
    fn place_all(&mut self, record_id: u32, bytes: &[u8]) -> Result<Vec<Fragment>> {
        let mut placed: Vec<Fragment> = Vec::new();
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![bytes]
        } else {
            bytes.chunks(MAX_DATA).collect()
        };
        for chunk in chunks {
            match self.place(record_id, chunk) {
                Ok(fragment) => placed.push(fragment),
                Err(e) => {
                    for fragment in placed {
                        self.discard(fragment)?;
                    }
                    return Err(e);
                }
            }
        }
        for pair in placed.windows(2) {
            self.set_chain(pair[0], Some(ChainPointer::new(pair[1].page_id, pair[1].local_id)))?;
        }
        Ok(placed)
    }

    /// Write one fragment on the first page from next-available onwards
    /// with room for it, extending the chain if needed.
    fn place(&mut self, record_id: u32, chunk: &[u8]) -> Result<Fragment> {
        debug_assert!(chunk.len() <= MAX_DATA);
        let mut page_id = ControlBlock::snapshot(self.pool)?.next_available_record_page;
        loop {
            let mut page = RecordPage::new(self.pool.fetch(page_id)?);
            if page.fits(chunk.len()) {
                let (written, local_id) = page.add(record_id, chunk);
                self.pool.mark_dirty(page_id)?;
                return Ok(Fragment {
                    page_id,
                    local_id,
                    length: written as u16,
                });
            }
            match page.next_page() {
                0 => page_id = self.append_page(page_id)?,
                next => page_id = next,
            }
        }
    }

    /// Allocate a page and link it after `tail`. Nothing is linked unless the
    /// allocation succeeds.
    fn append_page(&mut self, tail: PageId) -> Result<PageId> {
        let page_id = self.space.allocate(self.pool)?;

        RecordPage::new(self.pool.fetch(tail)?).set_next_page(page_id);
        self.pool.mark_dirty(tail)?;
        RecordPage::new(self.pool.fetch(page_id)?).set_prev_page(tail);
        self.pool.mark_dirty(page_id)?;
        ControlBlock::modify(self.pool, |control| {
            control.set_next_available_record_page(page_id)
        })?;
        debug!(page_id, prev = tail, "linked new record page");
        Ok(page_id)
    }

    fn set_chain(&mut self, fragment: Fragment, chain: Option<ChainPointer>) -> Result<()> {
        RecordPage::new(self.pool.fetch(fragment.page_id)?).set_chain(fragment.local_id, chain);
        self.pool.mark_dirty(fragment.page_id)
    }

    /// Fragments of the record at `row_id`, first to last.
    fn fragments(&mut self, row_id: RowId) -> Result<Vec<Fragment>> {
        let not_found = || StoreError::RecordNotFound { row_id };
        let page_id = row_id.data_block_id;
        if row_id.record_id == 0
            || page_id == 0
            || u32::from(page_id) >= self.space.tracked()
            || !self.space.is_in_use(self.pool, page_id)?
        {
            return Err(not_found());
        }

        let page = RecordPage::new(self.pool.fetch(page_id)?);
        if row_id.local_id >= page.total_slots() {
            return Err(not_found());
        }
        let head = page.slot(row_id.local_id);
        if head.record_id != row_id.record_id {
            return Err(not_found());
        }

        let mut fragments = vec![Fragment {
            page_id,
            local_id: row_id.local_id,
            length: head.length,
        }];
        let mut next = head.chain;
        while let Some(pointer) = next {
            let slot = RecordPage::new(self.pool.fetch(pointer.data_block_id)?)
                .slot(pointer.local_id);
            assert_eq!(
                slot.record_id, row_id.record_id,
                "chained fragment {}:{} belongs to another record",
                pointer.data_block_id, pointer.local_id
            );
            fragments.push(Fragment {
                page_id: pointer.data_block_id,
                local_id: pointer.local_id,
                length: slot.length,
            });
            next = slot.chain;
        }
        Ok(fragments)
    }

    /// Tombstone one fragment and reclaim its page if nothing live is left.
    fn discard(&mut self, fragment: Fragment) -> Result<()> {
        let mut page = RecordPage::new(self.pool.fetch(fragment.page_id)?);
        page.remove(fragment.local_id)?;
        let empty = page.live_count() == 0;
        self.pool.mark_dirty(fragment.page_id)?;
        if empty {
            self.reclaim(fragment.page_id)?;
        }
        Ok(())
    }

    /// Unlink an empty page from the chain and return it to the bitmap. The
    /// only page of the chain is reset in place instead.
    fn reclaim(&mut self, page_id: PageId) -> Result<()> {
        let mut page = RecordPage::new(self.pool.fetch(page_id)?);
        let (prev, next) = (page.prev_page(), page.next_page());
        if prev == 0 && next == 0 {
            page.reset();
            return self.pool.mark_dirty(page_id);
        }
        page.reset();
        self.pool.mark_dirty(page_id)?;

        if prev != 0 {
            RecordPage::new(self.pool.fetch(prev)?).set_next_page(next);
            self.pool.mark_dirty(prev)?;
        }
        if next != 0 {
            RecordPage::new(self.pool.fetch(next)?).set_prev_page(prev);
            self.pool.mark_dirty(next)?;
        }
        ControlBlock::modify(self.pool, |control| {
            if control.first_record_page() == page_id {
                control.set_first_record_page(next);
            }
            if control.next_available_record_page() == page_id {
                control.set_next_available_record_page(if next != 0 { next } else { prev });
            }
        })?;
        self.space.release(self.pool, page_id)?;
        debug!(page_id, prev, next, "reclaimed empty record page");
        Ok(())
    }
}

#[cfg(test)]
mod allocator_tests {
    use super::*;
    use crate::{datafile::MemoryDatafile, record::RECORD_HEADER_SIZE};

    struct Fixture {
        datafile: MemoryDatafile,
        pool: BufferManager,
        space: FreeSpaceMap,
    }

    impl Fixture {
        fn new(page_count: u32, pool_size: usize) -> Self {
            let datafile = MemoryDatafile::new(page_count);
            let mut pool = BufferManager::new(Box::new(datafile.clone()), pool_size).unwrap();
            let space = FreeSpaceMap::for_datafile(page_count);
            ControlBlock::modify(&mut pool, |control| control.format(page_count)).unwrap();
            space.format(&mut pool).unwrap();
            RecordAllocator::new(&mut pool, space).format().unwrap();
            Self {
                datafile,
                pool,
                space,
            }
        }

        fn allocator(&mut self) -> RecordAllocator<'_> {
            RecordAllocator::new(&mut self.pool, self.space)
        }

        /// Throw the pool away and read everything back from the datafile.
        fn reload(&mut self) {
            self.pool.sync().unwrap();
            self.pool = BufferManager::new(Box::new(self.datafile.clone()), 4).unwrap();
        }
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_insert_and_find() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let first = records.insert(1, b"{\"name\":\"a\"}").unwrap();
        let second = records.insert(2, b"").unwrap();
        assert_eq!(first, RowId::new(1, 2, 0));
        assert_eq!(second, RowId::new(2, 2, 1));
        assert_eq!(records.find(first).unwrap(), b"{\"name\":\"a\"}");
        assert!(records.find(second).unwrap().is_empty());
    }

    /// A page filled by one max-size record pushes the next record onto a
    /// freshly linked page, and the links survive a reload.
    #[test]
    fn test_full_page_links_new_page() {
        let mut fx = Fixture::new(64, 8);
        let big = pattern(MAX_DATA, 1);
        let (a, b) = {
            let mut records = fx.allocator();
            (records.insert(1, &big).unwrap(), records.insert(2, b"123456789").unwrap())
        };
        assert_eq!(a.data_block_id, 2);
        assert_eq!(b.data_block_id, 3);

        fx.reload();
        let chain = fx.allocator().pages().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!((chain[0].page_id, chain[0].prev, chain[0].next), (2, 0, 3));
        assert_eq!((chain[1].page_id, chain[1].prev, chain[1].next), (3, 2, 0));
        assert_eq!(chain[0].free_space, 0);

        let mut records = fx.allocator();
        assert_eq!(records.find(a).unwrap(), big);
        assert_eq!(records.find(b).unwrap(), b"123456789");
        assert_eq!(ControlBlock::snapshot(&mut fx.pool).unwrap().next_available_record_page, 3);
    }

    #[test]
    fn test_chained_row_round_trip() {
        let mut fx = Fixture::new(64, 4);
        let data = pattern(3 * MAX_DATA, 7);
        let row_id = fx.allocator().insert(1, &data).unwrap();

        let fragments = fx.allocator().fragments(row_id).unwrap();
        assert_eq!(fragments.len(), 3, "two continuation fragments");
        assert!(fragments.iter().all(|f| usize::from(f.length) == MAX_DATA));

        fx.reload();
        assert_eq!(fx.allocator().find(row_id).unwrap(), data);
    }

    #[test]
    fn test_remove_then_find_is_not_found() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let keep = records.insert(1, b"keep").unwrap();
        let gone = records.insert(2, b"gone").unwrap();
        records.remove(gone).unwrap();
        assert!(matches!(
            records.find(gone),
            Err(StoreError::RecordNotFound { .. })
        ));
        assert!(records.remove(gone).unwrap_err().is_not_found());
        assert_eq!(records.find(keep).unwrap(), b"keep");

        let reused = records.insert(3, b"new").unwrap();
        assert_eq!(reused.local_id, gone.local_id);
        assert!(records.find(gone).is_err(), "stale row id does not match");
    }

    #[test]
    fn test_remove_chained_row_reclaims_pages() {
        let mut fx = Fixture::new(64, 8);
        let data = pattern(2 * MAX_DATA + 10, 3);
        let before = fx.space.count_in_use(&mut fx.pool).unwrap();
        let small = fx.allocator().insert(1, b"small").unwrap();
        let row_id = fx.allocator().insert(2, &data).unwrap();
        // small shares page 2, the fragments take pages 3, 4 and 5.
        assert_eq!(fx.allocator().pages().unwrap().len(), 4);

        fx.allocator().remove(row_id).unwrap();
        let chain = fx.allocator().pages().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].next, 0);
        assert_eq!(fx.space.count_in_use(&mut fx.pool).unwrap(), before);
        assert_eq!(ControlBlock::snapshot(&mut fx.pool).unwrap().next_available_record_page, 2);
        assert_eq!(fx.allocator().find(small).unwrap(), b"small");
    }

    #[test]
    fn test_reclaiming_first_page_moves_chain_head() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let first = records.insert(1, &pattern(MAX_DATA, 0)).unwrap();
        let second = records.insert(2, b"tail").unwrap();
        records.remove(first).unwrap();

        let chain = records.pages().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!((chain[0].page_id, chain[0].prev), (second.data_block_id, 0));
        let control = ControlBlock::snapshot(&mut fx.pool).unwrap();
        assert_eq!(control.first_record_page, second.data_block_id);
        assert!(!fx.space.is_in_use(&mut fx.pool, first.data_block_id).unwrap());
    }

    #[test]
    fn test_removing_last_record_resets_sole_page() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let row_id = records.insert(1, b"only").unwrap();
        records.remove(row_id).unwrap();
        let chain = records.pages().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].slots, 0);
        assert!(fx.space.is_in_use(&mut fx.pool, 2).unwrap());
    }

    #[test]
    fn test_update_shrink_grow_keeps_row_id() {
        let mut fx = Fixture::new(64, 8);
        let original = pattern(2 * MAX_DATA + 100, 5);
        let row_id = fx.allocator().insert(1, &original).unwrap();

        fx.allocator().update(row_id, b"short").unwrap();
        assert_eq!(fx.allocator().find(row_id).unwrap(), b"short");
        assert_eq!(fx.allocator().fragments(row_id).unwrap().len(), 1);

        let grown = pattern(MAX_DATA + 500, 9);
        fx.allocator().update(row_id, &grown).unwrap();
        assert_eq!(fx.allocator().find(row_id).unwrap(), grown);

        fx.allocator().update(row_id, &[]).unwrap();
        assert!(fx.allocator().find(row_id).unwrap().is_empty());
    }

    #[test]
    fn test_update_does_not_disturb_neighbours() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let a = records.insert(1, b"aaaa").unwrap();
        let b = records.insert(2, b"bbbbbbbb").unwrap();
        let c = records.insert(3, b"cc").unwrap();
        records.update(b, b"BBBBBBBBBBBBBBBBBBBB").unwrap();
        assert_eq!(records.find(a).unwrap(), b"aaaa");
        assert_eq!(records.find(b).unwrap(), b"BBBBBBBBBBBBBBBBBBBB");
        assert_eq!(records.find(c).unwrap(), b"cc");
    }

    #[test]
    fn test_out_of_space_leaves_chain_unlinked() {
        // Pages 0 to 2 are taken by the control block, bitmap and chain head.
        let mut fx = Fixture::new(8, 4);
        let mut records = fx.allocator();
        let first = records.insert(1, &pattern(MAX_DATA, 1)).unwrap();
        for id in 2..=5 {
            records.insert(id, &pattern(MAX_DATA, id as u8)).unwrap();
        }
        let chain_before = records.pages().unwrap();
        assert_eq!(chain_before.len(), 5);

        let err = records.insert(6, &pattern(2 * MAX_DATA, 0)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfSpace));
        assert!(err.is_fatal());
        assert_eq!(records.pages().unwrap(), chain_before);
        assert_eq!(records.find(first).unwrap(), pattern(MAX_DATA, 1));
    }

    #[test]
    fn test_partial_chained_insert_is_rolled_back() {
        let mut fx = Fixture::new(8, 4);
        let mut records = fx.allocator();
        for id in 1..=4 {
            records.insert(id, &pattern(MAX_DATA, 0)).unwrap();
        }
        let small = records.insert(5, b"x").unwrap();
        // One free page left but the record needs three.
        let err = records.insert(6, &pattern(3 * MAX_DATA, 0)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfSpace));
        assert_eq!(records.find(small).unwrap(), b"x");
        let live: usize = records.pages().unwrap().iter().map(|p| p.live_slots).sum();
        assert_eq!(live, 5);
    }

    #[test]
    fn test_update_out_of_space_keeps_record() {
        let mut fx = Fixture::new(8, 4);
        let mut records = fx.allocator();
        let row_id = records.insert(1, b"tiny").unwrap();
        for id in 2..=5 {
            records.insert(id, &pattern(MAX_DATA, 0)).unwrap();
        }
        let err = records.update(row_id, &pattern(3 * MAX_DATA, 0)).unwrap_err();
        assert!(matches!(err, StoreError::OutOfSpace));
        assert_eq!(records.find(row_id).unwrap(), b"tiny");
    }

    #[test]
    fn test_small_records_share_a_page() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let per_page = (MAX_DATA + RECORD_HEADER_SIZE) / (100 + RECORD_HEADER_SIZE);
        let ids: Vec<RowId> = (1..=per_page as u32 + 1)
            .map(|id| records.insert(id, &[id as u8; 100]).unwrap())
            .collect();
        assert!(ids[..per_page].iter().all(|r| r.data_block_id == 2));
        assert_eq!(ids[per_page].data_block_id, 3);
    }

    #[test]
    fn test_bogus_row_ids_are_not_found() {
        let mut fx = Fixture::new(64, 8);
        let mut records = fx.allocator();
        let row_id = records.insert(1, b"data").unwrap();
        for bogus in [
            RowId::new(0, 2, 0),
            RowId::new(1, 0, 0),
            RowId::new(1, 2, 9),
            RowId::new(2, 2, 0),
            RowId::new(1, 40, 0),
            RowId::new(1, 999, 0),
        ] {
            assert!(records.find(bogus).unwrap_err().is_not_found(), "{bogus}");
        }
        assert_eq!(records.find(row_id).unwrap(), b"data");
    }
}
