//! Store configuration.

use crate::{
    btree::Capacity,
    error::{Result, StoreError},
    free_space::BITS_PER_PAGE,
    page::{DEFAULT_DATAFILE_PAGES, MAX_PAGES},
};

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest datafile that can hold a control block, a bitmap page, a record
/// page and an index root.
pub const MIN_DATAFILE_PAGES: u32 = 8;

/// Configuration for a [`crate::BlockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of page frames in the buffer pool.
    pub pool_size: usize,
    /// Total pages in the datafile.
    pub datafile_pages: u32,
    /// Capacity of the record-id index nodes. `None` fills whole pages.
    pub index_capacity: Option<Capacity>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            datafile_pages: DEFAULT_DATAFILE_PAGES,
            index_capacity: None,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of buffer pool frames.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the datafile size in pages.
    pub fn with_datafile_pages(mut self, datafile_pages: u32) -> Self {
        self.datafile_pages = datafile_pages;
        self
    }

    /// Sets an explicit index node capacity.
    pub fn with_index_capacity(mut self, capacity: Capacity) -> Self {
        self.index_capacity = Some(capacity);
        self
    }

    /// Number of pages the free-space bitmap occupies.
    pub fn bitmap_pages(&self) -> u16 {
        self.datafile_pages.div_ceil(BITS_PER_PAGE as u32) as u16
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < 2 {
            return Err(StoreError::config(format!(
                "pool_size must be at least 2, got {}",
                self.pool_size
            )));
        }
        if !(MIN_DATAFILE_PAGES..=MAX_PAGES).contains(&self.datafile_pages) {
            return Err(StoreError::config(format!(
                "datafile_pages must be within {}..={}, got {}",
                MIN_DATAFILE_PAGES, MAX_PAGES, self.datafile_pages
            )));
        }
        if let Some(capacity) = self.index_capacity {
            capacity.validate()?;
        }
        Ok(())
    }
}
