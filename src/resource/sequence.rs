use std::sync::atomic::{AtomicU64, Ordering};

/// Stamps outgoing requests so only the newest answer is applied.
///
/// A response may land after a later request was issued (fast paging,
/// typing into search). Each request takes a number; when its answer
/// arrives it is kept only if no newer number has been issued since.
#[derive(Debug, Default)]
pub struct Sequencer {
    latest: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, seq: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == seq
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
