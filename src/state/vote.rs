use crate::health::Health;
use crate::state::store::{DurableStateStore, StateMarshal, StateStoreError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DIRECTORY_NAME: &str = "vote-state";
pub const FILENAME: &str = "vote";

/// Which member this node voted for in its current term. At most one vote
/// per term; changing an already-cast vote within a term is a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteState {
    pub term: u64,
    pub voted_for: Option<String>,
}

impl VoteState {
    pub fn cast_vote(&mut self, term: u64, candidate: impl Into<String>) -> Result<(), VoteError> {
        let candidate = candidate.into();
        if term < self.term {
            return Err(VoteError::TermRegression {
                current: self.term,
                attempted: term,
            });
        }
        if term == self.term {
            match &self.voted_for {
                Some(existing) if *existing != candidate => {
                    return Err(VoteError::AlreadyVoted {
                        term,
                        existing: existing.clone(),
                        attempted: candidate,
                    });
                }
                _ => {}
            }
        }
        self.term = term;
        self.voted_for = Some(candidate);
        Ok(())
    }

    /// Entering a newer term clears any previous vote.
    pub fn advance_term(&mut self, term: u64) {
        if term > self.term {
            self.term = term;
            self.voted_for = None;
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("vote term regression: current={current}, attempted={attempted}")]
    TermRegression { current: u64, attempted: u64 },
    #[error("already voted for {existing} in term {term}, cannot vote for {attempted}")]
    AlreadyVoted {
        term: u64,
        existing: String,
        attempted: String,
    },
}

#[derive(Debug, Default)]
pub struct VoteMarshal;

impl StateMarshal for VoteMarshal {
    type State = VoteState;

    fn start_state(&self) -> VoteState {
        VoteState::default()
    }

    fn ordinal(&self, state: &VoteState) -> u64 {
        state.term
    }

    fn encode(&self, state: &VoteState) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(state)?)
    }

    fn decode(&self, bytes: &[u8]) -> Option<VoteState> {
        serde_json::from_slice(bytes).ok()
    }
}

pub type VoteStore = DurableStateStore<VoteMarshal>;

pub fn open_vote_store(
    root: impl AsRef<Path>,
    rotation: usize,
    health: Health,
) -> Result<VoteStore, StateStoreError> {
    DurableStateStore::open(
        root.as_ref().join(DIRECTORY_NAME),
        FILENAME,
        rotation,
        VoteMarshal,
        health,
    )
}
