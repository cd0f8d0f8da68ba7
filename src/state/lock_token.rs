use crate::health::Health;
use crate::state::store::{DurableStateStore, StateMarshal, StateStoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DIRECTORY_NAME: &str = "lock-token-state";
pub const FILENAME: &str = "lock-token";

/// Cluster-wide lock token: which member currently owns the right to hand
/// out locks, stamped with the committed index that granted it. A candidate
/// claims the token by replicating a request for `current_id + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTokenState {
    pub log_index: i64,
    pub owner: Option<String>,
    pub candidate_id: u32,
}

impl Default for LockTokenState {
    fn default() -> Self {
        Self {
            log_index: -1,
            owner: None,
            candidate_id: 0,
        }
    }
}

impl LockTokenState {
    pub fn next_candidate_id(&self) -> u32 {
        self.candidate_id.wrapping_add(1)
    }

    /// Applies a replicated token request. Only a request for the next
    /// candidate id takes the token; stale requests lose the race and leave
    /// the state unchanged. Returns whether the token changed hands.
    pub fn apply_request(&mut self, owner: impl Into<String>, id: u32, log_index: i64) -> bool {
        if id != self.next_candidate_id() {
            return false;
        }
        self.owner = Some(owner.into());
        self.candidate_id = id;
        self.log_index = log_index;
        true
    }

    pub fn is_owned_by(&self, member: &str) -> bool {
        self.owner.as_deref() == Some(member)
    }
}

#[derive(Debug, Default)]
pub struct LockTokenMarshal;

impl StateMarshal for LockTokenMarshal {
    type State = LockTokenState;

    fn start_state(&self) -> LockTokenState {
        LockTokenState::default()
    }

    fn ordinal(&self, state: &LockTokenState) -> u64 {
        state.log_index.max(0) as u64
    }

    fn encode(&self, state: &LockTokenState) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(state)?)
    }

    fn decode(&self, bytes: &[u8]) -> Option<LockTokenState> {
        serde_json::from_slice(bytes).ok()
    }
}

pub type LockTokenStore = DurableStateStore<LockTokenMarshal>;

pub fn open_lock_token_store(
    root: impl AsRef<Path>,
    rotation: usize,
    health: Health,
) -> Result<LockTokenStore, StateStoreError> {
    DurableStateStore::open(
        root.as_ref().join(DIRECTORY_NAME),
        FILENAME,
        rotation,
        LockTokenMarshal,
        health,
    )
}
