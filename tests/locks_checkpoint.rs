use graft::{
    LockMode, LockOutcome, LockRequest, LockResource, LockSession, LockStateMachine,
    PendingLockRequests,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const RECORD: LockResource = LockResource { kind: 1, id: 77 };

fn apply_stream(machine: &mut LockStateMachine, requests: &[LockRequest]) {
    for (i, request) in requests.iter().enumerate() {
        machine.apply(request, i as i64);
    }
}

#[test]
fn fifo_fairness_across_four_exclusive_claimants() {
    let requests = Arc::new(PendingLockRequests::new());
    let mut machine = LockStateMachine::new(requests.clone());
    let sessions: Vec<LockSession> = (1..=4).map(LockSession).collect();
    let waiters: Vec<_> = sessions.iter().map(|s| requests.register(*s)).collect();

    let mut stream: Vec<LockRequest> = sessions
        .iter()
        .map(|s| LockRequest::acquire(LockMode::Exclusive, RECORD, *s))
        .collect();
    stream.push(LockRequest::release(LockMode::Exclusive, RECORD, sessions[0]));
    stream.push(LockRequest::release(LockMode::Exclusive, RECORD, sessions[1]));
    stream.push(LockRequest::release(LockMode::Exclusive, RECORD, sessions[2]));
    apply_stream(&mut machine, &stream);

    // Every claimant completed, in submission order: each waiter observed
    // its grant only after its predecessor released.
    for waiter in &waiters {
        assert_eq!(
            waiter.wait(Duration::ZERO).unwrap(),
            LockOutcome::Acquired
        );
    }
    assert_eq!(machine.last_applied(), stream.len() as i64 - 1);
}

#[test]
fn identical_streams_produce_identical_completions() {
    // Two independent nodes consuming the same committed stream must make
    // the same grant decisions, whether or not a caller is local.
    let stream = vec![
        LockRequest::acquire(LockMode::Shared, RECORD, LockSession(1)),
        LockRequest::acquire(LockMode::Exclusive, RECORD, LockSession(2)),
        LockRequest::acquire(LockMode::Shared, RECORD, LockSession(3)),
        LockRequest::release(LockMode::Shared, RECORD, LockSession(1)),
    ];

    let run = |local: &[u64]| -> Vec<(u64, Option<LockOutcome>)> {
        let requests = Arc::new(PendingLockRequests::new());
        let mut machine = LockStateMachine::new(requests.clone());
        let waiters: Vec<_> = local
            .iter()
            .map(|id| (*id, requests.register(LockSession(*id))))
            .collect();
        apply_stream(&mut machine, &stream);
        waiters
            .into_iter()
            .map(|(id, waiter)| (id, waiter.wait(Duration::ZERO).ok()))
            .collect()
    };

    let node_a = run(&[1, 2, 3]);
    assert_eq!(node_a[0].1, Some(LockOutcome::Acquired));
    // Shared claims coexist, so session 3 was granted alongside session 1;
    // the exclusive claim from session 2 keeps waiting even after session 1
    // releases, because session 3 still holds shared.
    assert_eq!(node_a[1].1, None);
    assert_eq!(node_a[2].1, Some(LockOutcome::Acquired));

    // A node with no local callers applies the same stream without effect
    // on any waiter, and without panicking.
    let node_b = run(&[]);
    assert!(node_b.is_empty());
}

#[test]
fn blocked_caller_unblocks_when_release_commits() {
    let requests = Arc::new(PendingLockRequests::new());
    let mut machine = LockStateMachine::new(requests.clone());

    machine.apply(
        &LockRequest::acquire(LockMode::Exclusive, RECORD, LockSession(1)),
        0,
    );
    let waiter = requests.register(LockSession(2));
    machine.apply(
        &LockRequest::acquire(LockMode::Exclusive, RECORD, LockSession(2)),
        1,
    );

    let handle = thread::spawn(move || waiter.wait(Duration::from_secs(5)));
    // The release arrives on the committed stream a little later.
    thread::sleep(Duration::from_millis(20));
    machine.apply(
        &LockRequest::release(LockMode::Exclusive, RECORD, LockSession(1)),
        2,
    );

    assert_eq!(handle.join().unwrap().unwrap(), LockOutcome::Acquired);
}

#[test]
fn timed_out_caller_gets_a_distinguishable_error() {
    let requests = Arc::new(PendingLockRequests::new());
    let mut machine = LockStateMachine::new(requests.clone());

    machine.apply(
        &LockRequest::acquire(LockMode::Exclusive, RECORD, LockSession(1)),
        0,
    );
    let waiter = requests.register(LockSession(2));
    machine.apply(
        &LockRequest::acquire(LockMode::Exclusive, RECORD, LockSession(2)),
        1,
    );

    let err = waiter.wait(Duration::from_millis(15)).unwrap_err();
    assert!(matches!(
        err,
        graft::LockWaitError::Timeout { session, .. } if session == LockSession(2)
    ));

    // The queue entry survives the local timeout; the grant still happens
    // when the release commits.
    let retry = requests.register(LockSession(2));
    machine.apply(
        &LockRequest::release(LockMode::Exclusive, RECORD, LockSession(1)),
        2,
    );
    assert_eq!(retry.wait(Duration::ZERO).unwrap(), LockOutcome::Acquired);
}
