//! Buffer pool replacement policy.
//!
//! # Interface
//!
//! The policy exposes a `PolicyState` struct with three methods:
//! - `record_hit()`: Called on cache hit to update access tracking
//! - `on_frame_assigned()`: Called when a frame is newly bound to a page
//! - `evict_frame()`: Selects and returns a victim frame for eviction
//!
//! The pool evicts in first-in, first-out order of binding: a page that is
//! fetched again while resident keeps its original place in the queue.

mod fifo;

pub use fifo::PolicyState;
