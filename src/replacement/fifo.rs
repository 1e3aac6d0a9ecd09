//! FIFO replacement policy.
//!
//! # Algorithm
//!
//! - On hit: Nothing, recency does not matter
//! - On allocation: Push the frame to the back of the queue
//! - On eviction: Pop the frame at the front of the queue
//!
//! # Complexity
//!
//! All operations are O(1).

use std::collections::VecDeque;

/// FIFO policy state: frame indexes in the order they were bound.
#[derive(Debug, Default)]
pub struct PolicyState {
    queue: VecDeque<usize>,
}

impl PolicyState {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Records a cache hit. FIFO ignores recency.
    pub fn record_hit(&mut self, _frame_idx: usize) {}

    /// Notifies the policy that a frame has been bound to a new page.
    pub fn on_frame_assigned(&mut self, frame_idx: usize) {
        debug_assert!(
            !self.queue.contains(&frame_idx),
            "frame {frame_idx} assigned twice without eviction"
        );
        self.queue.push_back(frame_idx);
    }

    /// Selects the frame bound longest ago. Returns None if no frame is bound.
    pub fn evict_frame(&mut self) -> Option<usize> {
        self.queue.pop_front()
    }

    /// Puts back a victim whose eviction failed, at the head of the queue.
    pub fn restore_victim(&mut self, frame_idx: usize) {
        self.queue.push_front(frame_idx);
    }

    /// Number of frames currently tracked.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
