//! A single-file page storage engine.
//!
//! The datafile is a fixed array of 4 KiB pages:
//!
//! ```text
//! page 0        control block (record id counter, chain and index roots)
//! page 1..      free-space bitmap, one bit per page
//! the rest      record pages and index nodes, handed out by the bitmap
//! ```
//!
//! Pages are cached in a [`BufferManager`] with FIFO eviction. Records live
//! in slotted pages managed by the [`RecordAllocator`], and a B+Tree maps
//! each record id to its [`RowId`]. [`BlockStore`] ties the pieces together.

pub mod btree;
pub mod buffer_manager;
pub mod config;
pub mod control;
pub mod datafile;
pub mod error;
pub mod free_space;
pub mod page;
pub mod record;
pub mod replacement;
pub mod store;

pub use btree::{BTree, Capacity, MemoryAdapter, NodeAdapter, PagedAdapter, TreeShape};
pub use buffer_manager::{BufferManager, BufferStats};
pub use config::StoreConfig;
pub use control::{ControlBlock, ControlInfo};
pub use datafile::{Datafile, FileDatafile, MemoryDatafile};
pub use error::{Result, StoreError};
pub use free_space::FreeSpaceMap;
pub use page::{DataBlock, PageId, PAGE_SIZE};
pub use record::{PageSummary, RecordAllocator, RecordPage, RowId, MAX_DATA};
pub use store::BlockStore;
