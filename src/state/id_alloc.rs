use crate::health::Health;
use crate::state::store::{DurableStateStore, StateMarshal, StateStoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

pub const DIRECTORY_NAME: &str = "id-allocation-state";
pub const FILENAME: &str = "id-allocation";

/// Graph entity families that draw from cluster-wide id ranges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum IdKind {
    Node,
    Relationship,
    Property,
    Schema,
}

/// First unallocated id per kind, as of a committed log index. Replicated
/// allocations hand out contiguous ranges; every node tracks the same high
/// water marks by applying the same operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocationState {
    pub log_index: i64,
    first_unallocated: BTreeMap<IdKind, u64>,
}

impl Default for IdAllocationState {
    fn default() -> Self {
        Self {
            log_index: -1,
            first_unallocated: BTreeMap::new(),
        }
    }
}

impl IdAllocationState {
    pub fn first_unallocated(&self, kind: IdKind) -> u64 {
        self.first_unallocated.get(&kind).copied().unwrap_or(0)
    }

    /// Records a replicated range allocation. The range must start exactly at
    /// the current high water mark; anything else means the committed stream
    /// was applied out of order.
    pub fn record_allocation(
        &mut self,
        kind: IdKind,
        range_start: u64,
        range_length: u64,
        log_index: i64,
    ) -> Result<(), IdAllocationError> {
        let expected = self.first_unallocated(kind);
        if range_start != expected {
            return Err(IdAllocationError::RangeMismatch {
                kind,
                expected,
                attempted: range_start,
            });
        }
        self.first_unallocated
            .insert(kind, range_start + range_length);
        self.log_index = log_index;
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdAllocationError {
    #[error("{kind:?} range must start at {expected}, attempted {attempted}")]
    RangeMismatch {
        kind: IdKind,
        expected: u64,
        attempted: u64,
    },
}

#[derive(Debug, Default)]
pub struct IdAllocationMarshal;

impl StateMarshal for IdAllocationMarshal {
    type State = IdAllocationState;

    fn start_state(&self) -> IdAllocationState {
        IdAllocationState::default()
    }

    fn ordinal(&self, state: &IdAllocationState) -> u64 {
        state.log_index.max(0) as u64
    }

    fn encode(&self, state: &IdAllocationState) -> Result<Vec<u8>, StateStoreError> {
        Ok(serde_json::to_vec(state)?)
    }

    fn decode(&self, bytes: &[u8]) -> Option<IdAllocationState> {
        serde_json::from_slice(bytes).ok()
    }
}

pub type IdAllocationStore = DurableStateStore<IdAllocationMarshal>;

pub fn open_id_allocation_store(
    root: impl AsRef<Path>,
    rotation: usize,
    health: Health,
) -> Result<IdAllocationStore, StateStoreError> {
    DurableStateStore::open(
        root.as_ref().join(DIRECTORY_NAME),
        FILENAME,
        rotation,
        IdAllocationMarshal,
        health,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocations_advance_per_kind() {
        let mut state = IdAllocationState::default();
        state
            .record_allocation(IdKind::Node, 0, 1024, 5)
            .unwrap();
        state
            .record_allocation(IdKind::Node, 1024, 1024, 6)
            .unwrap();
        state
            .record_allocation(IdKind::Relationship, 0, 512, 7)
            .unwrap();

        assert_eq!(state.first_unallocated(IdKind::Node), 2048);
        assert_eq!(state.first_unallocated(IdKind::Relationship), 512);
        assert_eq!(state.log_index, 7);
    }

    #[test]
    fn misaligned_range_is_rejected() {
        let mut state = IdAllocationState::default();
        state.record_allocation(IdKind::Node, 0, 100, 1).unwrap();
        let err = state
            .record_allocation(IdKind::Node, 50, 100, 2)
            .unwrap_err();
        assert_eq!(
            err,
            IdAllocationError::RangeMismatch {
                kind: IdKind::Node,
                expected: 100,
                attempted: 50
            }
        );
    }

    #[test]
    fn durable_round_trip() {
        let temp = tempdir().unwrap();
        {
            let mut store = open_id_allocation_store(temp.path(), 10, Health::new()).unwrap();
            let mut state = store.initial_state().clone();
            state.record_allocation(IdKind::Node, 0, 4096, 3).unwrap();
            store.persist(&state).unwrap();
        }
        let store = open_id_allocation_store(temp.path(), 10, Health::new()).unwrap();
        assert_eq!(store.initial_state().first_unallocated(IdKind::Node), 4096);
        assert_eq!(store.initial_state().log_index, 3);
    }
}
