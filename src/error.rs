//! Error taxonomy for the storage engine.
//!
//! Recoverable conditions (missing keys, duplicate keys, missing records,
//! I/O failures) are returned as [`StoreError`]. Broken structural invariants
//! are not errors: they panic, because carrying on would corrupt the file.

use std::io;

use thiserror::Error;

use crate::{page::PageId, record::RowId};

/// Result type for storage engine operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the buffer pool, allocator, index and store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error while reading or writing the datafile.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Page id is past the end of the datafile.
    #[error("page {page_id} is outside the datafile ({page_count} pages)")]
    PageOutOfRange { page_id: u32, page_count: u32 },

    /// `mark_dirty` was called for a page that is not in the pool.
    #[error("page {page_id} is not resident in the buffer pool")]
    PageNotResident { page_id: PageId },

    /// No free page is left in the free-space bitmap.
    #[error("datafile is full, no free page left")]
    OutOfSpace,

    /// Key is not present in the index.
    #[error("key {key} not found")]
    KeyNotFound { key: String },

    /// Key is already present in the index.
    #[error("key {key} already exists")]
    DuplicateKey { key: String },

    /// No live record at the given row id.
    #[error("no record at {row_id}")]
    RecordNotFound { row_id: RowId },

    /// Header slot exists but is a tombstone.
    #[error("slot {local_id} on page {page_id} is empty")]
    SlotEmpty { page_id: PageId, local_id: u16 },

    /// Node capacity does not fit in a page.
    #[error("node capacity {requested} exceeds the {max} entries that fit in a page")]
    CapacityExceeded { requested: usize, max: usize },

    /// Page 0 does not carry a control block.
    #[error("datafile is not formatted")]
    NotFormatted,

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl StoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn key_not_found(key: impl std::fmt::Debug) -> Self {
        Self::KeyNotFound {
            key: format!("{key:?}"),
        }
    }

    pub fn duplicate_key(key: impl std::fmt::Debug) -> Self {
        Self::DuplicateKey {
            key: format!("{key:?}"),
        }
    }

    /// Returns true if the enclosing operation must be abandoned.
    ///
    /// The pool never rolls back a partially completed flush and the
    /// allocator cannot make progress once the bitmap is exhausted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::OutOfSpace)
    }

    /// Returns true if the error only reports an absent key or record.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::KeyNotFound { .. } | Self::RecordNotFound { .. } | Self::SlotEmpty { .. }
        )
    }
}
