//! Fault injection.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// A failure the server produces instead of handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status and an error body.
    Status(u16),
    /// Answer 200 with a body that is not valid JSON.
    Corrupt,
}

/// Queue of faults consumed one per request.
///
/// Faulted requests never reach the list, so the revision does not move.
#[derive(Debug, Default)]
pub struct FaultInjector {
    queue: Mutex<VecDeque<Fault>>,
}

impl FaultInjector {
    /// Creates an empty injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` requests fail with `status`.
    pub fn fail_next(&self, count: usize, status: u16) {
        self.push(count, Fault::Status(status));
    }

    /// Makes the next `count` requests return an undecodable body.
    pub fn corrupt_next(&self, count: usize) {
        self.push(count, Fault::Corrupt);
    }

    fn push(&self, count: usize, fault: Fault) {
        let mut queue = self.queue.lock();
        queue.extend(std::iter::repeat(fault).take(count));
    }

    /// Takes the fault for the current request, if any.
    pub fn take(&self) -> Option<Fault> {
        self.queue.lock().pop_front()
    }

    /// Number of faults still queued.
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }

    /// Drops every queued fault.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}
