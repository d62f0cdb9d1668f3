//! Revision and retry bookkeeping.

use std::time::Instant;
use tasksync_protocol::Revision;

/// Lifecycle of one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationPhase {
    /// Submitted, not yet attempted.
    Idle,
    /// An attempt is waiting for the transport.
    Sending,
    /// The last attempt failed and a retry timer is running.
    RetryScheduled,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
}

impl OperationPhase {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationPhase::Success | OperationPhase::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: OperationPhase) -> bool {
        use OperationPhase::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (RetryScheduled, Sending)
                | (Sending, Success)
                | (Sending, Failed)
                | (Sending, RetryScheduled)
        )
    }
}

/// Snapshot of the shared revision state, published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// Last revision acknowledged by the server.
    pub revision: Revision,
    /// True while the most recent attempt failed and a retry is pending.
    pub dirty: bool,
    /// False once the current operation hit the delay ceiling.
    pub retry_enabled: bool,
}

/// Mutable state shared by every operation of one engine.
///
/// Owned by the gate worker and only touched from jobs it runs, so no lock
/// guards it.
#[derive(Debug, Clone)]
pub struct RevisionState {
    revision: Revision,
    dirty: bool,
    retry_enabled: bool,
}

impl RevisionState {
    /// Creates the initial state.
    pub fn new() -> Self {
        Self {
            revision: Revision::INITIAL,
            dirty: false,
            retry_enabled: true,
        }
    }

    /// Last revision acknowledged by the server.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Whether the last attempt failed and should be retried.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the current operation may still retry.
    pub fn retry_enabled(&self) -> bool {
        self.retry_enabled
    }

    /// Resets the retry budget at the start of a new top-level operation.
    pub fn begin_operation(&mut self) {
        self.retry_enabled = true;
    }

    /// Records a successful attempt and the revision the server returned.
    pub fn record_success(&mut self, revision: Revision) {
        self.revision = revision;
        self.dirty = false;
    }

    /// Records a failed attempt.
    pub fn record_failure(&mut self) {
        self.dirty = true;
    }

    /// Records the outcome of a backoff computation.
    pub fn set_retry_enabled(&mut self, enabled: bool) {
        self.retry_enabled = enabled;
    }

    /// Records that an operation stopped retrying.
    pub fn record_exhausted(&mut self) {
        self.dirty = false;
        self.retry_enabled = false;
    }

    /// Returns a snapshot for observers.
    pub fn snapshot(&self) -> EngineStatus {
        EngineStatus {
            revision: self.revision,
            dirty: self.dirty,
            retry_enabled: self.retry_enabled,
        }
    }
}

impl Default for RevisionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Transport attempts made, retries included.
    pub attempts: u64,
    /// Operations that finished successfully.
    pub successes: u64,
    /// Retries scheduled after a failed attempt.
    pub retries_scheduled: u64,
    /// Operations that finished with a transport failure.
    pub terminal_failures: u64,
    /// Successful responses whose body could not be decoded.
    pub decode_failures: u64,
    /// Last successful operation time.
    pub last_success: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions() {
        use OperationPhase::*;
        assert!(Idle.can_transition_to(Sending));
        assert!(Sending.can_transition_to(RetryScheduled));
        assert!(RetryScheduled.can_transition_to(Sending));
        assert!(Sending.can_transition_to(Success));
        assert!(!Idle.can_transition_to(Success));
        assert!(!RetryScheduled.can_transition_to(Failed));
        assert!(!Success.can_transition_to(Sending));
        assert!(Failed.is_terminal());
        assert!(!RetryScheduled.is_terminal());
    }

    #[test]
    fn success_clears_dirty() {
        let mut state = RevisionState::new();
        assert_eq!(state.revision(), Revision::INITIAL);

        state.record_failure();
        assert!(state.is_dirty());

        state.record_success(Revision::new(4));
        assert!(!state.is_dirty());
        assert_eq!(state.snapshot().revision, Revision::new(4));
    }

    #[test]
    fn exhaustion_and_reset() {
        let mut state = RevisionState::new();
        state.record_failure();
        state.record_exhausted();
        assert!(!state.is_dirty());
        assert!(!state.retry_enabled());

        state.begin_operation();
        assert!(state.retry_enabled());
    }
}
