//! End-to-end test: concurrent mutations of one case serialize cleanly.

use crate::support::*;
use signoff_engine::{BindSignature, CompleteStep, ReturnToStep};
use signoff_types::{CasePosition, SignoffError, UserId};
use std::sync::Arc;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_completions_yield_one_conflict() {
    let service = Arc::new(service());
    let case = open(&service);
    let version = case.version;
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for user in ["alice", "anna"] {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let id = case.case_id.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.complete_step(CompleteStep::new(id, 1, user, "A").expecting_version(version))
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => {
                assert!(e.is_retryable(), "unexpected error: {e}");
                assert!(matches!(e, SignoffError::Conflict { .. }));
                conflicts += 1;
            }
        }
    }
    assert_eq!((wins, conflicts), (1, 1));

    let state = service.get_state(&case.case_id, &actor("x", "A")).unwrap().state;
    assert_eq!(state.position, CasePosition::Step(2));
    assert_eq!(state.completed_steps.len(), 1);
    assert_eq!(state.version, version + 1);
    assert_eq!(
        service
            .audit_for(&case.case_id)
            .unwrap()
            .iter()
            .filter(|r| r.event.name() == "step_completed")
            .count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unversioned_duplicates_are_rejected_as_invalid_step() {
    let service = Arc::new(service());
    let case = open(&service);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        let id = case.case_id.clone();
        handles.push(tokio::spawn(async move {
            service.complete_step(CompleteStep::new(id, 1, "alice", "A"))
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert!(matches!(e, SignoffError::InvalidStep { requested: 1, .. })),
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stale_bind_after_advance_conflicts() {
    let service = Arc::new(service());
    let case = open(&service);
    let id = case.case_id.clone();
    service.register_signature(&UserId::new("bob"), PNG).unwrap();

    let state = service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();
    let seen = state.version;

    // The case moves on before the stale bind lands
    service
        .return_to_step(ReturnToStep::new(id.clone(), 1, "bob", "B", "recheck"))
        .unwrap();

    let stale = service.bind_signature(
        BindSignature::new(id.clone(), sig_field(), actor("bob", "B")).expecting_version(seen),
    );
    assert!(matches!(stale, Err(SignoffError::Conflict { .. })));
    assert!(service.case_signatures(&id).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_cases_do_not_interfere() {
    let service = Arc::new(service());
    let mut handles = Vec::new();
    for n in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            let case = open(&service);
            let user = format!("user-{n}");
            service
                .complete_step(CompleteStep::new(case.case_id.clone(), 1, user, "A"))
                .map(|s| s.position)
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), CasePosition::Step(2));
    }
    assert_eq!(service.pending_for(&actor("bob", "B")).len(), 16);
    assert!(service.verify_audit_chain().unwrap());
}
