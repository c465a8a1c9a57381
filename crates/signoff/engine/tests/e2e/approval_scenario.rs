//! End-to-end test: a case moves through fill, signed approval, filing and return.

use crate::support::*;
use serde_json::json;
use signoff_engine::{BindSignature, CompleteStep, ReturnToStep};
use signoff_types::{AuditEvent, CasePosition, SectionName, SignoffError, UserId};

#[test]
fn report_review_scenario() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();

    // Step 1 by role A
    let state = service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A").with_payload(json!({"x": 1})))
        .unwrap();
    assert_eq!(state.position, CasePosition::Step(2));
    assert_eq!(
        state.section(&SectionName::new("report")),
        Some(&json!({"x": 1}))
    );

    // Step 2 cannot complete unsigned
    let unsigned = service.complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"));
    assert!(matches!(unsigned, Err(SignoffError::SignatureRequired(_))));

    service
        .register_signature(&UserId::new("bob"), PNG)
        .unwrap();
    let binding = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    let state = service
        .complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"))
        .unwrap();
    assert_eq!(state.position, CasePosition::Step(3));
    assert_eq!(state.completed_steps[&2].signature, Some(binding.binding_id.clone()));
    assert_eq!(
        state.section(&SectionName::new("report")).unwrap()["sig"]["bindingId"],
        json!(binding.binding_id.0)
    );

    // Role A sends it back to step 1
    let state = service
        .return_to_step(ReturnToStep::new(id.clone(), 1, "alice", "A", "wrong figures"))
        .unwrap();
    assert_eq!(state.position, CasePosition::Step(1));
    assert!(!state.is_completed(1));
    assert!(!state.is_completed(2));
    assert_eq!(state.bindings.len(), 1);

    let events: Vec<&'static str> = service
        .audit_for(&id)
        .unwrap()
        .iter()
        .map(|r| r.event.name())
        .collect();
    assert_eq!(
        events,
        vec![
            "case_opened",
            "step_completed",
            "signature_bound",
            "step_completed",
            "case_returned"
        ]
    );
    assert!(service.verify_audit_chain().unwrap());
    assert_eq!(service.replay(&id).unwrap().position, state.position);
}

#[test]
fn permissions_follow_the_case() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();
    let bob = actor("bob", "B");

    let view = service.get_state(&id, &actor("alice", "A")).unwrap();
    assert!(view.permissions.can_approve);
    assert_eq!(view.permissions.next_action.map(|a| a.action), Some("fill".to_string()));

    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();
    let view = service.get_state(&id, &bob).unwrap();
    assert!(view.permissions.editable_sections.contains(&SectionName::new("report")));
    assert!(!view.permissions.can_approve);

    service.register_signature(&bob.user_id, PNG).unwrap();
    service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), bob.clone()))
        .unwrap();
    assert!(service.get_state(&id, &bob).unwrap().permissions.can_approve);
    assert_eq!(service.pending_for(&bob).len(), 1);
    assert!(service.pending_for(&actor("carol", "C")).is_empty());
}

#[test]
fn completed_case_is_terminal() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();

    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();
    service.register_signature(&UserId::new("bob"), JPEG).unwrap();
    service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    service
        .complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"))
        .unwrap();
    let done = service
        .complete_step(CompleteStep::new(id.clone(), 3, "carol", "C"))
        .unwrap();
    assert!(done.is_done());

    let events = service.audit_for(&id).unwrap();
    assert!(matches!(
        events.last().map(|r| &r.event),
        Some(AuditEvent::CaseCompleted)
    ));

    assert!(matches!(
        service.complete_step(CompleteStep::new(id.clone(), 3, "carol", "C")),
        Err(SignoffError::InvalidStep {
            current: CasePosition::Done,
            ..
        })
    ));
    assert!(matches!(
        service.return_to_step(ReturnToStep::new(id.clone(), 1, "carol", "C", "late")),
        Err(SignoffError::InvalidReturnTarget { .. })
    ));
    assert!(service.pending_for(&actor("carol", "C")).is_empty());
}

#[test]
fn role_mismatch_and_forbidden_return() {
    let service = service();
    let case = open(&service);
    let id = case.case_id.clone();

    assert!(matches!(
        service.complete_step(CompleteStep::new(id.clone(), 1, "bob", "B")),
        Err(SignoffError::RoleMismatch { .. })
    ));
    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A"))
        .unwrap();

    // No rule for step 2: only roles of steps 2 and 3 may return
    assert!(matches!(
        service.return_to_step(ReturnToStep::new(id.clone(), 1, "alice", "A", "oops")),
        Err(SignoffError::Forbidden(_))
    ));
    assert!(matches!(
        service.return_to_step(ReturnToStep::new(id.clone(), 2, "bob", "B", "self")),
        Err(SignoffError::InvalidReturnTarget { target: 2, .. })
    ));
    assert!(service
        .return_to_step(ReturnToStep::new(id, 1, "bob", "B", "incomplete"))
        .is_ok());
}
