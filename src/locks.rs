//! Distributed lock manager: a deterministic state machine over the
//! committed stream, plus the local completion plumbing callers block on.

pub mod requests;
pub mod resource;
pub mod state_machine;
pub mod wait_graph;

pub use requests::{LockOutcome, LockWaitError, LockWaiter, PendingLockRequests};
pub use resource::{LockMode, LockResource, LockSession, ResourceLockState};
pub use state_machine::{LockOperation, LockRequest, LockStateMachine};
pub use wait_graph::{DeadlockDetected, WaitGraph};
