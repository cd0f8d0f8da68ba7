use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// One logical client across the cluster. The id is assigned by the node
/// that opened the session and is opaque here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LockSession(pub u64);

/// A lockable entity: a typed id, e.g. a node or relationship record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LockResource {
    pub kind: u32,
    pub id: u64,
}

impl LockResource {
    pub fn new(kind: u32, id: u64) -> Self {
        Self { kind, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LockHolding {
    shared: u32,
    exclusive: u32,
}

impl LockHolding {
    fn increment(&mut self, mode: LockMode) {
        match mode {
            LockMode::Shared => self.shared += 1,
            LockMode::Exclusive => self.exclusive += 1,
        }
    }

    fn decrement(&mut self, mode: LockMode) {
        match mode {
            LockMode::Shared => self.shared = self.shared.saturating_sub(1),
            LockMode::Exclusive => self.exclusive = self.exclusive.saturating_sub(1),
        }
    }

    fn is_free(&self) -> bool {
        self.shared == 0 && self.exclusive == 0
    }
}

/// Holder table and FIFO wait queue for one resource.
///
/// Invariant: a session holding exclusively is the only holder; a session
/// whose counts both reach zero leaves the holder table.
#[derive(Debug, Default)]
pub struct ResourceLockState {
    holders: BTreeMap<LockSession, LockHolding>,
    waiting: VecDeque<(LockSession, LockMode)>,
}

impl ResourceLockState {
    pub fn available_for(&self, mode: LockMode, session: LockSession) -> bool {
        if self.holders.is_empty() {
            return true;
        }
        match mode {
            LockMode::Exclusive => {
                self.holders.len() == 1 && self.holders.contains_key(&session)
            }
            LockMode::Shared => self
                .holders
                .values()
                .all(|holding| holding.exclusive == 0),
        }
    }

    pub fn issue(&mut self, session: LockSession, mode: LockMode) {
        self.holders.entry(session).or_default().increment(mode);
    }

    /// Decrements the holding; returns true when the session released its
    /// last lock and left the holder table.
    pub fn release(&mut self, session: LockSession, mode: LockMode) -> bool {
        let Some(holding) = self.holders.get_mut(&session) else {
            return false;
        };
        holding.decrement(mode);
        if holding.is_free() {
            self.holders.remove(&session);
            true
        } else {
            false
        }
    }

    pub fn holds_any(&self, session: LockSession) -> bool {
        self.holders.contains_key(&session)
    }

    pub fn enqueue(&mut self, session: LockSession, mode: LockMode) {
        self.waiting.push_back((session, mode));
    }

    pub fn peek_waiting(&self) -> Option<(LockSession, LockMode)> {
        self.waiting.front().copied()
    }

    pub fn dequeue(&mut self) -> Option<(LockSession, LockMode)> {
        self.waiting.pop_front()
    }

    pub fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.waiting.is_empty()
    }
}
