//! Durability and replication core for a distributed graph database:
//! segmented physical storage for the replicated log, crash recovery, a
//! dual-file store for small auxiliary replicated state, and the
//! deterministic lock state machine that consumes the committed stream.

pub mod health;
pub mod locks;
pub mod state;
pub mod storage;

pub use health::{Health, HealthError};
pub use locks::{
    DeadlockDetected, LockMode, LockOperation, LockOutcome, LockRequest, LockResource,
    LockSession, LockStateMachine, LockWaitError, LockWaiter, PendingLockRequests,
    ResourceLockState, WaitGraph,
};
pub use state::{
    open_id_allocation_store, open_lock_token_store, open_membership_store, open_term_store,
    open_vote_store, DurableStateStore, IdAllocationError, IdAllocationState, IdAllocationStore,
    IdKind, LockTokenState, LockTokenStore, MembershipState, MembershipStore, StateMarshal,
    StateStoreError, TermState, TermStore, VoteError, VoteState, VoteStore,
};
pub use storage::{
    LogConfig, LogCursor, LogError, LogRecord, RangeError, RecoveryError, SegmentFile,
    SegmentFileError, SegmentFileSet, SegmentHeader, SegmentRanges, SegmentedLog, Watermark,
    HEADER_LENGTH,
};
