//! The storage engine as one handle.
//!
//! A [`BlockStore`] owns the buffer pool and hands short-lived views of it to
//! the record allocator and the record-id index for each call. Every record
//! gets a fresh id from the control block, and the index maps that id to
//! the record's [`RowId`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::{
    btree::{BTree, Capacity, PagedAdapter, TreeShape},
    buffer_manager::{BufferManager, BufferStats},
    config::{StoreConfig, MIN_DATAFILE_PAGES},
    control::{ControlBlock, ControlInfo, CONTROL_PAGE},
    datafile::{Datafile, FileDatafile, MemoryDatafile},
    error::{Result, StoreError},
    free_space::FreeSpaceMap,
    page::MAX_PAGES,
    record::{PageSummary, RecordAllocator, RowId},
};

type Index<'a> = BTree<u32, RowId, PagedAdapter<'a, u32, RowId>>;

pub struct BlockStore {
    pool: BufferManager,
    space: FreeSpaceMap,
    index_capacity: Capacity,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("pool", &self.pool)
            .field("index_capacity", &self.index_capacity)
            .finish()
    }
}

/// The index capacity recorded at format time. A capacity in the config
/// must agree with it, since node fill is checked against it.
fn stored_capacity(control: &ControlInfo, requested: Option<Capacity>) -> Result<Capacity> {
    let stored = Capacity::new(
        control.index_leaf_capacity.into(),
        control.index_branch_capacity.into(),
    );
    stored.validate()?;
    match requested {
        Some(requested) if requested != stored => Err(StoreError::config(format!(
            "index was built with capacity {stored:?}, config asks for {requested:?}"
        ))),
        _ => Ok(stored),
    }
}

impl BlockStore {
    /// Open the datafile at `path`, creating and formatting it if needed.
    /// An existing file keeps its own size.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let datafile = FileDatafile::open(path.as_ref(), config.datafile_pages)?;
        info!(
            path = %path.as_ref().display(),
            created = datafile.created(),
            pages = datafile.page_count(),
            "opened datafile"
        );
        Self::with_datafile(Box::new(datafile), config)
    }

    /// A store over fresh in-memory pages.
    pub fn open_in_memory(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let datafile = MemoryDatafile::new(config.datafile_pages);
        Self::with_datafile(Box::new(datafile), config)
    }

    /// A store over any datafile. Page 0 without a control block means the
    /// datafile is formatted from scratch.
    pub fn with_datafile(datafile: Box<dyn Datafile>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let page_count = datafile.page_count();
        if !(MIN_DATAFILE_PAGES..=MAX_PAGES).contains(&page_count) {
            return Err(StoreError::config(format!(
                "datafile has {page_count} pages, expected {MIN_DATAFILE_PAGES}..={MAX_PAGES}"
            )));
        }
        let index_capacity = PagedAdapter::<u32, RowId>::capacity(config.index_capacity)?;
        let pool = BufferManager::new(datafile, config.pool_size)?;
        let mut store = Self {
            pool,
            space: FreeSpaceMap::for_datafile(page_count),
            index_capacity,
        };

        if ControlBlock::new(store.pool.fetch(CONTROL_PAGE)?).is_formatted() {
            let control = store.control()?;
            if control.datafile_pages != page_count {
                return Err(StoreError::config(format!(
                    "datafile was formatted for {} pages but has {page_count}",
                    control.datafile_pages
                )));
            }
            store.index_capacity = stored_capacity(&control, config.index_capacity)?;
            debug!(next_id = control.next_id, "loaded control block");
        } else {
            store.format(page_count)?;
        }
        Ok(store)
    }

    fn format(&mut self, page_count: u32) -> Result<()> {
        let capacity = self.index_capacity;
        ControlBlock::modify(&mut self.pool, |control| {
            control.format(page_count);
            control.set_index_capacity(capacity.leaf as u16, capacity.branch as u16);
        })?;
        self.space.format(&mut self.pool)?;
        let first_record_page = self.records().format()?;
        self.index()?;
        self.pool.sync()?;
        info!(pages = page_count, first_record_page, "formatted datafile");
        Ok(())
    }

    fn records(&mut self) -> RecordAllocator<'_> {
        RecordAllocator::new(&mut self.pool, self.space)
    }

    fn index(&mut self) -> Result<Index<'_>> {
        BTree::new(
            PagedAdapter::new(&mut self.pool, self.space),
            self.index_capacity,
        )
    }

    /// Store `bytes` as a new record.
    pub fn insert(&mut self, bytes: &[u8]) -> Result<RowId> {
        let record_id = ControlBlock::modify(&mut self.pool, |control| control.take_next_id())?;
        let row_id = self.records().insert(record_id, bytes)?;
        if let Err(e) = self.index()?.insert(record_id, row_id) {
            if let Err(cleanup) = self.records().remove(row_id) {
                warn!(%row_id, error = %cleanup, "failed to discard unindexed record");
            }
            return Err(e);
        }
        debug!(%row_id, len = bytes.len(), "inserted record");
        Ok(row_id)
    }

    /// Bytes of the record at `row_id`.
    pub fn find(&mut self, row_id: RowId) -> Result<Vec<u8>> {
        self.records().find(row_id)
    }

    /// Replace the bytes of the record at `row_id`. Its address is kept.
    pub fn update(&mut self, row_id: RowId, bytes: &[u8]) -> Result<()> {
        self.records().update(row_id, bytes)?;
        debug!(%row_id, len = bytes.len(), "updated record");
        Ok(())
    }

    /// Remove the record at `row_id` and its index entry.
    pub fn remove(&mut self, row_id: RowId) -> Result<()> {
        match self.index()?.find(&row_id.record_id) {
            Ok(indexed) if indexed == row_id => {}
            Ok(_) => return Err(StoreError::RecordNotFound { row_id }),
            Err(e) if e.is_not_found() => return Err(StoreError::RecordNotFound { row_id }),
            Err(e) => return Err(e),
        }
        self.records().remove(row_id)?;
        self.index()?.delete(&row_id.record_id)?;
        debug!(%row_id, "removed record");
        Ok(())
    }

    /// Address of record `record_id`.
    pub fn lookup(&mut self, record_id: u32) -> Result<RowId> {
        self.index()?.find(&record_id)
    }

    /// Bytes of record `record_id`.
    pub fn get(&mut self, record_id: u32) -> Result<Vec<u8>> {
        let row_id = self.lookup(record_id)?;
        self.find(row_id)
    }

    /// Visit every record in ascending record-id order.
    pub fn scan(&mut self, mut visit: impl FnMut(RowId, &[u8])) -> Result<()> {
        let rows = self.index()?.entries()?;
        for (_, row_id) in rows {
            let bytes = self.find(row_id)?;
            visit(row_id, &bytes);
        }
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&mut self) -> Result<usize> {
        self.index()?.len()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        self.index()?.is_empty()
    }

    /// Verify the record-id index, panicking on a broken invariant.
    pub fn check_index(&mut self) -> Result<TreeShape> {
        self.index()?.check()
    }

    /// Write every dirty page back to the datafile.
    pub fn sync(&mut self) -> Result<()> {
        self.pool.sync()
    }

    pub fn close(self) -> Result<()> {
        self.pool.close()?;
        info!("closed store");
        Ok(())
    }

    pub fn stats(&self) -> BufferStats {
        self.pool.stats()
    }

    pub fn control(&mut self) -> Result<ControlInfo> {
        ControlBlock::snapshot(&mut self.pool)
    }

    /// The chain of record pages, first to last.
    pub fn pages(&mut self) -> Result<Vec<PageSummary>> {
        self.records().pages()
    }

    /// Pages marked used in the free-space bitmap.
    pub fn pages_in_use(&mut self) -> Result<u32> {
        self.space.count_in_use(&mut self.pool)
    }

    pub fn page_count(&self) -> u32 {
        self.pool.page_count()
    }

    pub fn index_capacity(&self) -> Capacity {
        self.index_capacity
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use crate::record::MAX_DATA;

    fn config() -> StoreConfig {
        StoreConfig::new()
            .with_datafile_pages(256)
            .with_pool_size(8)
            .with_index_capacity(Capacity::new(4, 4))
    }

    #[test]
    fn test_format_layout() {
        let mut store = BlockStore::open_in_memory(config()).unwrap();
        let control = store.control().unwrap();
        assert_eq!(control.next_id, 1);
        assert_eq!(control.first_record_page, 2);
        assert_eq!(control.next_available_record_page, 2);
        assert_eq!(control.index_root, 3);
        assert_eq!(control.index_first_leaf, 3);
        assert_eq!(control.datafile_pages, 256);
        assert_eq!(
            (control.index_leaf_capacity, control.index_branch_capacity),
            (4, 4)
        );
        assert_eq!(store.pages_in_use().unwrap(), 4);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_insert_get_update_remove() {
        let mut store = BlockStore::open_in_memory(config()).unwrap();
        let a = store.insert(br#"{"name":"a"}"#).unwrap();
        let b = store.insert(br#"{"name":"b"}"#).unwrap();
        assert_eq!((a.record_id, b.record_id), (1, 2));
        assert_eq!(store.lookup(2).unwrap(), b);
        assert_eq!(store.get(1).unwrap(), br#"{"name":"a"}"#);

        store.update(a, br#"{"name":"a","tags":["x","y"]}"#).unwrap();
        assert_eq!(store.find(a).unwrap(), br#"{"name":"a","tags":["x","y"]}"#);
        assert_eq!(store.lookup(1).unwrap(), a, "update keeps the row id");

        store.remove(a).unwrap();
        assert!(store.get(1).unwrap_err().is_not_found());
        assert!(matches!(
            store.remove(a),
            Err(StoreError::RecordNotFound { .. })
        ));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_scan_in_record_id_order() {
        let mut store = BlockStore::open_in_memory(config()).unwrap();
        for i in 0..30u8 {
            store.insert(&vec![i; usize::from(i) * 50]).unwrap();
        }
        let mut seen = Vec::new();
        store
            .scan(|row_id, bytes| seen.push((row_id.record_id, bytes.len())))
            .unwrap();
        let expected: Vec<(u32, usize)> = (0..30).map(|i| (i + 1, i as usize * 50)).collect();
        assert_eq!(seen, expected);
        assert_eq!(store.check_index().unwrap().entries, 30);
    }

    #[test]
    fn test_chained_record_through_store() {
        let mut store = BlockStore::open_in_memory(config()).unwrap();
        let data: Vec<u8> = (0..3 * MAX_DATA).map(|i| (i % 251) as u8).collect();
        let row_id = store.insert(&data).unwrap();
        assert_eq!(store.get(row_id.record_id).unwrap(), data);
        store.remove(row_id).unwrap();
        assert_eq!(store.pages().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_records_and_counter() {
        let datafile = MemoryDatafile::new(256);
        let row_id = {
            let mut store = BlockStore::with_datafile(Box::new(datafile.clone()), config()).unwrap();
            let row_id = store.insert(b"persisted").unwrap();
            store.close().unwrap();
            row_id
        };

        let mut store = BlockStore::with_datafile(Box::new(datafile), config()).unwrap();
        assert_eq!(store.find(row_id).unwrap(), b"persisted");
        assert_eq!(store.insert(b"next").unwrap().record_id, 2);
    }

    #[test]
    fn test_reopen_uses_stored_index_capacity() {
        let datafile = MemoryDatafile::new(256);
        BlockStore::with_datafile(Box::new(datafile.clone()), config())
            .unwrap()
            .close()
            .unwrap();

        let defaults = StoreConfig::new().with_datafile_pages(256).with_pool_size(8);
        let store = BlockStore::with_datafile(Box::new(datafile.clone()), defaults).unwrap();
        assert_eq!(store.index_capacity(), Capacity::new(4, 4));
        drop(store);

        let mismatched = config().with_index_capacity(Capacity::new(8, 8));
        assert!(matches!(
            BlockStore::with_datafile(Box::new(datafile), mismatched),
            Err(StoreError::Config { .. })
        ));
    }

    #[test]
    fn test_remove_rejects_mismatched_row_id() {
        let mut store = BlockStore::open_in_memory(config()).unwrap();
        let row_id = store.insert(b"x").unwrap();
        let forged = RowId::new(row_id.record_id, row_id.data_block_id, row_id.local_id + 1);
        assert!(store.remove(forged).unwrap_err().is_not_found());
        assert_eq!(store.find(row_id).unwrap(), b"x");
    }

    #[test]
    fn test_out_of_space_is_fatal_and_harmless() {
        let mut store = BlockStore::open_in_memory(
            StoreConfig::new()
                .with_datafile_pages(8)
                .with_pool_size(4)
                .with_index_capacity(Capacity::new(4, 4)),
        )
        .unwrap();
        let mut stored = Vec::new();
        let err = loop {
            match store.insert(&vec![7; MAX_DATA]) {
                Ok(row_id) => stored.push(row_id),
                Err(e) => break e,
            }
        };
        assert!(err.is_fatal());
        assert!(!stored.is_empty());
        for row_id in &stored {
            assert_eq!(store.find(*row_id).unwrap().len(), MAX_DATA);
        }
        assert_eq!(store.len().unwrap(), stored.len());
    }

    #[test]
    fn test_index_out_of_space_keeps_earlier_records() {
        let mut store = BlockStore::open_in_memory(
            StoreConfig::new()
                .with_datafile_pages(8)
                .with_pool_size(4)
                .with_index_capacity(Capacity::new(2, 2)),
        )
        .unwrap();
        let mut stored = Vec::new();
        let err = loop {
            match store.insert(b"x") {
                Ok(row_id) => stored.push(row_id),
                Err(e) => break e,
            }
        };
        // The fifth insert has to split a leaf and the full root.
        assert!(matches!(err, StoreError::OutOfSpace));
        assert_eq!(stored.len(), 4);

        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(store.check_index().unwrap().entries, 4);
        for row_id in &stored {
            assert_eq!(store.lookup(row_id.record_id).unwrap(), *row_id);
            assert_eq!(store.get(row_id.record_id).unwrap(), b"x");
        }
        assert!(matches!(store.get(5), Err(StoreError::KeyNotFound { .. })));
        let mut scanned = Vec::new();
        store.scan(|row_id, _| scanned.push(row_id)).unwrap();
        assert_eq!(scanned, stored);

        store.remove(stored[0]).unwrap();
        let row_id = store.insert(b"y").unwrap();
        assert_eq!(store.get(row_id.record_id).unwrap(), b"y");
        assert_eq!(store.check_index().unwrap().entries, 4);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(BlockStore::open_in_memory(config().with_pool_size(1)).is_err());
        assert!(BlockStore::open_in_memory(config().with_datafile_pages(4)).is_err());
        assert!(matches!(
            BlockStore::open_in_memory(config().with_index_capacity(Capacity::new(1000, 4))),
            Err(StoreError::CapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_wrong_size_datafile_is_rejected() {
        let datafile = MemoryDatafile::new(256);
        BlockStore::with_datafile(Box::new(datafile.clone()), config())
            .unwrap()
            .close()
            .unwrap();
        // Same pages, but the handle claims a different size.
        let mut resized = MemoryDatafile::new(128);
        let mut buf = [0u8; crate::page::PAGE_SIZE];
        let mut source = datafile;
        source.read_block(0, &mut buf).unwrap();
        resized.write_block(0, &buf).unwrap();
        assert!(matches!(
            BlockStore::with_datafile(Box::new(resized), config()),
            Err(StoreError::Config { .. })
        ));
    }
}
