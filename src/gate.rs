/// Global admission bound on concurrent sandboxed jobs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 10;

/// Process-wide in-flight counter with a hard capacity. No queueing:
/// over-limit requests are rejected outright.
#[derive(Debug)]
pub struct AdmissionGate {
    active: AtomicUsize,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Claims a slot, or `None` when the gate is full. Rejected attempts
    /// never net-increment the counter.
    pub fn try_acquire(self: &Arc<Self>) -> Option<Permit> {
        if self.active.fetch_add(1, Ordering::SeqCst) >= self.capacity {
            self.active.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(Permit {
            gate: Arc::clone(self),
        })
    }

    /// Currently admitted jobs.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// RAII admission slot; releases its gate exactly once on drop.
#[derive(Debug)]
pub struct Permit {
    gate: Arc<AdmissionGate>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.gate.active.fetch_sub(1, Ordering::SeqCst);
    }
}
