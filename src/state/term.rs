use crate::health::Health;
use crate::state::store::{DurableStateStore, StateMarshal, StateStoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DIRECTORY_NAME: &str = "term-state";
pub const FILENAME: &str = "term";

/// Latest Raft term this node has seen. Terms only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TermState {
    pub term: u64,
}

impl TermState {
    /// Adopts `term` if it is newer; returns whether anything changed.
    pub fn update(&mut self, term: u64) -> bool {
        if term > self.term {
            self.term = term;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub struct TermMarshal;

impl StateMarshal for TermMarshal {
    type State = TermState;

    fn start_state(&self) -> TermState {
        TermState::default()
    }

    fn ordinal(&self, state: &TermState) -> u64 {
        state.term
    }

    fn encode(&self, state: &TermState) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(state)?)
    }

    fn decode(&self, bytes: &[u8]) -> Option<TermState> {
        serde_json::from_slice(bytes).ok()
    }
}

pub type TermStore = DurableStateStore<TermMarshal>;

pub fn open_term_store(
    root: impl AsRef<Path>,
    rotation: usize,
    health: Health,
) -> Result<TermStore, StateStoreError> {
    DurableStateStore::open(
        root.as_ref().join(DIRECTORY_NAME),
        FILENAME,
        rotation,
        TermMarshal,
        health,
    )
}
