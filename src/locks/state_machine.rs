use crate::locks::requests::{LockOutcome, PendingLockRequests};
use crate::locks::resource::{LockMode, LockResource, LockSession, ResourceLockState};
use crate::locks::wait_graph::WaitGraph;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOperation {
    Acquire,
    Release,
}

/// One replicated lock operation; the payload type carried through the log
/// for the lock subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub operation: LockOperation,
    pub mode: LockMode,
    pub resource: LockResource,
    pub session: LockSession,
}

impl LockRequest {
    pub fn acquire(mode: LockMode, resource: LockResource, session: LockSession) -> Self {
        Self {
            operation: LockOperation::Acquire,
            mode,
            resource,
            session,
        }
    }

    pub fn release(mode: LockMode, resource: LockResource, session: LockSession) -> Self {
        Self {
            operation: LockOperation::Release,
            mode,
            resource,
            session,
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Deterministic lock manager fed by the committed stream.
///
/// Every node applies the same operations in the same order and reaches the
/// same holder tables, queues and wait graph. Nothing here reads a clock,
/// draws randomness or touches disk; completion callbacks are the only
/// externally visible side effect and fire only for locally pending callers.
#[derive(Debug)]
pub struct LockStateMachine {
    resources: BTreeMap<LockResource, ResourceLockState>,
    wait_graph: WaitGraph,
    requests: Arc<PendingLockRequests>,
    last_applied: i64,
}

impl LockStateMachine {
    pub fn new(requests: Arc<PendingLockRequests>) -> Self {
        Self {
            resources: BTreeMap::new(),
            wait_graph: WaitGraph::new(),
            requests,
            last_applied: -1,
        }
    }

    pub fn last_applied(&self) -> i64 {
        self.last_applied
    }

    /// Applies one committed operation. The replication layer guarantees
    /// exactly-once, in-order delivery per log index; that ordering is
    /// assumed here, not re-verified.
    pub fn apply(&mut self, request: &LockRequest, log_index: i64) {
        match request.operation {
            LockOperation::Acquire => self.apply_acquire(request),
            LockOperation::Release => self.apply_release(request),
        }
        self.last_applied = log_index;
    }

    fn apply_acquire(&mut self, request: &LockRequest) {
        let state = self.resources.entry(request.resource).or_default();
        if state.available_for(request.mode, request.session) {
            if !state.holds_any(request.session) {
                self.wait_graph.lock_acquired(request.resource, request.session);
            }
            state.issue(request.session, request.mode);
            self.wait_graph.stop_wait(request.session);
            self.requests.complete(request.session, LockOutcome::Acquired);
        } else if let Err(deadlock) = self
            .wait_graph
            .check_wait_on(request.resource, request.session)
        {
            warn!(
                "event=lock_deadlock session={:?} resource={:?}",
                deadlock.session, deadlock.resource
            );
            self.requests.complete(request.session, LockOutcome::Deadlock);
        } else {
            self.wait_graph.begin_wait(request.resource, request.session);
            state.enqueue(request.session, request.mode);
        }
    }

    fn apply_release(&mut self, request: &LockRequest) {
        let Some(state) = self.resources.get_mut(&request.resource) else {
            warn!(
                "event=lock_release_unknown_resource resource={:?} session={:?}",
                request.resource, request.session
            );
            return;
        };
        if state.release(request.session, request.mode) {
            self.wait_graph
                .lock_released(request.resource, request.session);
        }

        // Hand the lock down the queue in FIFO order, stopping at the first
        // waiter whose mode is not yet available.
        while let Some((waiting, mode)) = state.peek_waiting() {
            if !state.available_for(mode, waiting) {
                break;
            }
            state.dequeue();
            if !state.holds_any(waiting) {
                self.wait_graph.lock_acquired(request.resource, waiting);
            }
            state.issue(waiting, mode);
            self.wait_graph.stop_wait(waiting);
            self.requests.complete(waiting, LockOutcome::Acquired);
        }

        if state.is_idle() {
            self.resources.remove(&request.resource);
        }
    }
}
