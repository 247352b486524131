//! Event identity allocation for locally originated events.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing event identifiers for one origin.
///
/// The counter starts at 0 and the first identifier handed out is 1. There is
/// no reset. A single allocator is owned by the session context and shared by
/// the confirm responder and the telemetry sampler, so both flows draw from
/// the same sequence and never repeat a value.
#[derive(Debug, Default)]
pub struct EidAllocator {
    last: AtomicU64,
}

impl EidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next identifier.
    pub fn next_eid(&self) -> u64 {
        self.last.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last identifier handed out, 0 if none yet.
    pub fn last_issued(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}
