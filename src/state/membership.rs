use crate::health::Health;
use crate::state::store::{DurableStateStore, StateMarshal, StateStoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

pub const DIRECTORY_NAME: &str = "membership-state";
pub const FILENAME: &str = "membership";

/// Snapshot of the voting membership as of a committed log index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipState {
    pub log_index: i64,
    pub members: BTreeSet<String>,
}

impl Default for MembershipState {
    fn default() -> Self {
        Self {
            log_index: -1,
            members: BTreeSet::new(),
        }
    }
}

impl MembershipState {
    pub fn set_members(
        &mut self,
        members: impl IntoIterator<Item = impl Into<String>>,
        log_index: i64,
    ) {
        self.members = members.into_iter().map(Into::into).collect();
        self.log_index = log_index;
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }
}

#[derive(Debug, Default)]
pub struct MembershipMarshal;

impl StateMarshal for MembershipMarshal {
    type State = MembershipState;

    fn start_state(&self) -> MembershipState {
        MembershipState::default()
    }

    fn ordinal(&self, state: &MembershipState) -> u64 {
        state.log_index.max(0) as u64
    }

    fn encode(&self, state: &MembershipState) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(state)?)
    }

    fn decode(&self, bytes: &[u8]) -> Option<MembershipState> {
        serde_json::from_slice(bytes).ok()
    }
}

pub type MembershipStore = DurableStateStore<MembershipMarshal>;

pub fn open_membership_store(
    root: impl AsRef<Path>,
    rotation: usize,
    health: Health,
) -> Result<MembershipStore, StateStoreError> {
    DurableStateStore::open(
        root.as_ref().join(DIRECTORY_NAME),
        FILENAME,
        rotation,
        MembershipMarshal,
        health,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn durable_round_trip() {
        let temp = tempdir().unwrap();
        {
            let mut store = open_membership_store(temp.path(), 10, Health::new()).unwrap();
            let mut state = store.initial_state().clone();
            state.set_members(["node-a", "node-b", "node-c"], 17);
            store.persist(&state).unwrap();
        }
        let store = open_membership_store(temp.path(), 10, Health::new()).unwrap();
        let state = store.initial_state();
        assert_eq!(state.log_index, 17);
        assert!(state.contains("node-b"));
        assert!(!state.contains("node-d"));
    }
}
