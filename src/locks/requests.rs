use crate::locks::resource::LockSession;
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How a submitted lock operation ended for the local caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Acquired,
    Deadlock,
}

#[derive(Debug, Default)]
struct WaitSlot {
    outcome: Mutex<Option<LockOutcome>>,
    signal: Condvar,
}

/// Registry of locally pending lock operations, keyed by session.
///
/// The thread applying the committed stream completes slots; caller threads
/// block on them. Operations replicated from other nodes have no local slot
/// and complete into nothing, which is the normal cross-node case.
#[derive(Debug, Default)]
pub struct PendingLockRequests {
    slots: Mutex<BTreeMap<LockSession, Arc<WaitSlot>>>,
}

impl PendingLockRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pending operation for `session`, replacing any stale slot
    /// left behind by a timed-out predecessor.
    pub fn register(&self, session: LockSession) -> LockWaiter {
        let slot = Arc::new(WaitSlot::default());
        self.slots.lock().insert(session, slot.clone());
        LockWaiter { session, slot }
    }

    /// Delivers an outcome to the local waiter for `session`, if one exists.
    /// At most one delivery per registered slot.
    pub fn complete(&self, session: LockSession, outcome: LockOutcome) {
        let slot = self.slots.lock().remove(&session);
        if let Some(slot) = slot {
            *slot.outcome.lock() = Some(outcome);
            slot.signal.notify_all();
        }
    }
}

/// Blocking handle for one submitted lock operation.
#[derive(Debug)]
pub struct LockWaiter {
    session: LockSession,
    slot: Arc<WaitSlot>,
}

impl LockWaiter {
    pub fn session(&self) -> LockSession {
        self.session
    }

    /// Blocks until the state machine delivers an outcome or `timeout`
    /// elapses. A timed-out session may stay queued until its availability
    /// or deadlock conditions change; the caller owns that policy.
    pub fn wait(&self, timeout: Duration) -> Result<LockOutcome, LockWaitError> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(outcome) = *outcome {
                return Ok(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LockWaitError::Timeout {
                    session: self.session,
                    waited: timeout,
                });
            }
            self.slot.signal.wait_for(&mut outcome, deadline - now);
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockWaitError {
    #[error("lock wait for session {session:?} timed out after {waited:?}")]
    Timeout {
        session: LockSession,
        waited: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completed_outcome_is_observed() {
        let requests = PendingLockRequests::new();
        let waiter = requests.register(LockSession(1));
        requests.complete(LockSession(1), LockOutcome::Acquired);
        assert_eq!(waiter.wait(Duration::ZERO).unwrap(), LockOutcome::Acquired);
    }

    #[test]
    fn wait_times_out_without_completion() {
        let requests = PendingLockRequests::new();
        let waiter = requests.register(LockSession(1));
        let err = waiter.wait(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, LockWaitError::Timeout { .. }));
    }

    #[test]
    fn completion_for_unknown_session_is_ignored() {
        let requests = PendingLockRequests::new();
        requests.complete(LockSession(42), LockOutcome::Acquired);
    }

    #[test]
    fn waiter_wakes_from_another_thread() {
        let requests = Arc::new(PendingLockRequests::new());
        let waiter = requests.register(LockSession(7));
        let remote = requests.clone();
        let handle = thread::spawn(move || {
            remote.complete(LockSession(7), LockOutcome::Deadlock);
        });
        let outcome = waiter.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, LockOutcome::Deadlock);
        handle.join().unwrap();
    }
}
