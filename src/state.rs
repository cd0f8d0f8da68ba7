//! Durable auxiliary state: a generic dual-file store plus the concrete
//! replicated state kinds persisted through it.

pub mod id_alloc;
pub mod lock_token;
pub mod membership;
pub mod store;
pub mod term;
pub mod vote;

pub use id_alloc::{
    open_id_allocation_store, IdAllocationError, IdAllocationMarshal, IdAllocationState,
    IdAllocationStore, IdKind,
};
pub use lock_token::{open_lock_token_store, LockTokenMarshal, LockTokenState, LockTokenStore};
pub use membership::{
    open_membership_store, MembershipMarshal, MembershipState, MembershipStore,
};
pub use store::{DurableStateStore, StateMarshal, StateStoreError};
pub use term::{open_term_store, TermMarshal, TermState, TermStore};
pub use vote::{open_vote_store, VoteError, VoteMarshal, VoteState, VoteStore};
