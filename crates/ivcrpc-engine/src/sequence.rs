use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out request sequence numbers.
///
/// Numbers increase by one per call and wrap through the full `u32` range;
/// zero is valid after wraparound. Whether a number is still in use is the
/// pending table's business, not the tracker's.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    next: AtomicU32,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn next(&self) -> u32 {
        // fetch_add wraps on overflow.
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
