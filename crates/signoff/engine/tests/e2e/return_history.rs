//! End-to-end test: returns keep signature history but demand fresh signatures.

use crate::support::*;
use signoff_engine::{BindSignature, CompleteStep, ReturnToStep};
use signoff_types::{CasePosition, SignoffError, UserId};

#[test]
fn resigning_after_return_supersedes_old_binding() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();
    service.register_signature(&UserId::new("bob"), PNG).unwrap();

    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();
    let first = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    service
        .complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"))
        .unwrap();

    let state = service
        .return_to_step(ReturnToStep::new(id.clone(), 1, "carol", "C", "redo"))
        .unwrap();
    assert!(state.completed_steps.is_empty());
    assert_eq!(service.signature_history(&id, &sig_field()).unwrap().len(), 1);

    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();

    // The first binding belongs to an earlier attempt
    let unsigned = service.complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"));
    assert!(matches!(unsigned, Err(SignoffError::SignatureRequired(_))));

    let second = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    assert_eq!(second.attempt, first.attempt + 1);
    let state = service
        .complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"))
        .unwrap();
    assert_eq!(state.position, CasePosition::Step(3));
    assert_eq!(state.completed_steps[&2].signature, Some(second.binding_id.clone()));

    let history = service.signature_history(&id, &sig_field()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].binding_id, first.binding_id);
    assert_eq!(
        service.case_signatures(&id).unwrap()[&sig_field()].binding_id,
        second.binding_id
    );
    assert!(service.verify_binding(&id, &sig_field()).unwrap());
}

#[test]
fn version_increments_on_every_mutation() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();
    service.register_signature(&UserId::new("bob"), PNG).unwrap();
    assert_eq!(case.version, 1);

    let v = service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A").expecting_version(1))
        .unwrap()
        .version;
    assert_eq!(v, 2);

    let b = service
        .bind_signature(
            BindSignature::new(id.clone(), sig_field(), actor("bob", "B")).expecting_version(v),
        )
        .unwrap();
    let v = service.get_state(&id, &actor("bob", "B")).unwrap().state.version;
    assert_eq!(v, 3);
    assert_eq!(b.step_number, 2);

    let v = service
        .return_to_step(ReturnToStep::new(id.clone(), 1, "bob", "B", "x").expecting_version(v))
        .unwrap()
        .version;
    assert_eq!(v, 4);
}
