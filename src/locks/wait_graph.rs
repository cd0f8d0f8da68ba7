use crate::locks::resource::{LockResource, LockSession};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Wait-for graph used only for deadlock detection; queuing order lives in
/// each resource's FIFO queue. One instance per lock subsystem so replay
/// stays reproducible and testable in isolation.
#[derive(Debug, Default)]
pub struct WaitGraph {
    waits_on: BTreeMap<LockSession, LockResource>,
    holders: BTreeMap<LockResource, BTreeSet<LockSession>>,
}

impl WaitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_acquired(&mut self, resource: LockResource, session: LockSession) {
        self.holders.entry(resource).or_default().insert(session);
    }

    pub fn lock_released(&mut self, resource: LockResource, session: LockSession) {
        if let Some(holders) = self.holders.get_mut(&resource) {
            holders.remove(&session);
            if holders.is_empty() {
                self.holders.remove(&resource);
            }
        }
    }

    pub fn begin_wait(&mut self, resource: LockResource, session: LockSession) {
        self.waits_on.insert(session, resource);
    }

    pub fn stop_wait(&mut self, session: LockSession) {
        self.waits_on.remove(&session);
    }

    /// Would `session` waiting on `resource` close a cycle? Follows holder
    /// and wait edges from the other holders of `resource`; reaching a
    /// resource held by `session` again means deadlock. `session` holding
    /// `resource` itself is not a cycle, that is just an upgrade wait.
    pub fn check_wait_on(
        &self,
        resource: LockResource,
        session: LockSession,
    ) -> Result<(), DeadlockDetected> {
        let mut visited = BTreeSet::new();
        let mut frontier: Vec<LockSession> = self
            .holders
            .get(&resource)
            .map(|holders| {
                holders
                    .iter()
                    .copied()
                    .filter(|holder| *holder != session)
                    .collect()
            })
            .unwrap_or_default();
        while let Some(holder) = frontier.pop() {
            if !visited.insert(holder) {
                continue;
            }
            let Some(next) = self.waits_on.get(&holder) else {
                continue;
            };
            let Some(next_holders) = self.holders.get(next) else {
                continue;
            };
            for transitive in next_holders {
                if *transitive == session {
                    return Err(DeadlockDetected { session, resource });
                }
                frontier.push(*transitive);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("deadlock: session {session:?} cannot wait on {resource:?}")]
pub struct DeadlockDetected {
    pub session: LockSession,
    pub resource: LockResource,
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: LockSession = LockSession(1);
    const B: LockSession = LockSession(2);
    const C: LockSession = LockSession(3);

    fn resource(id: u64) -> LockResource {
        LockResource::new(0, id)
    }

    #[test]
    fn two_party_cycle_is_detected() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(2), B);
        graph.begin_wait(resource(2), A);

        // B asking for resource 1 closes the cycle: A holds 1 and waits on 2.
        let err = graph.check_wait_on(resource(1), B).unwrap_err();
        assert_eq!(err.session, B);
    }

    #[test]
    fn three_party_cycle_is_detected() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(2), B);
        graph.lock_acquired(resource(3), C);
        graph.begin_wait(resource(2), A);
        graph.begin_wait(resource(3), B);

        assert!(graph.check_wait_on(resource(1), C).is_err());
    }

    #[test]
    fn chain_without_cycle_is_fine() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(2), B);
        graph.begin_wait(resource(2), A);

        assert!(graph.check_wait_on(resource(2), C).is_ok());
    }

    #[test]
    fn sole_holder_upgrading_is_not_a_deadlock() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(1), B);

        // A waiting to upgrade while B still holds shared is just a wait.
        assert!(graph.check_wait_on(resource(1), A).is_ok());
    }

    #[test]
    fn crossed_upgrades_deadlock() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(1), B);
        graph.begin_wait(resource(1), A);

        // Both shared holders now want exclusive on the same resource.
        assert!(graph.check_wait_on(resource(1), B).is_err());
    }

    #[test]
    fn released_holder_breaks_the_cycle() {
        let mut graph = WaitGraph::new();
        graph.lock_acquired(resource(1), A);
        graph.lock_acquired(resource(2), B);
        graph.begin_wait(resource(2), A);
        graph.lock_released(resource(1), A);

        assert!(graph.check_wait_on(resource(1), B).is_ok());
    }
}
