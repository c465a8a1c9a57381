//! Property tests: any sequence of operations keeps the case position consistent.
//!
//! After every operation, successful or not, the case sits on the lowest
//! step without a completion (or is done), its version never decreases,
//! and replaying the audit trail reproduces the live position.

use crate::support::*;
use proptest::prelude::*;
use signoff_engine::{ApprovalService, BindSignature, CompleteStep, ReturnToStep};
use signoff_types::{CaseId, CaseState, StepNumber, UserId};

const ROLES: [&str; 4] = ["A", "B", "C", "Z"];

#[derive(Clone, Debug)]
enum Op {
    Complete { step: StepNumber, role: usize },
    Return { target: StepNumber, role: usize },
    Bind { role: usize },
    RegisterSignature,
    DeleteSignature,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..5, 0usize..4).prop_map(|(step, role)| Op::Complete { step, role }),
        2 => (0u32..4, 0usize..4).prop_map(|(target, role)| Op::Return { target, role }),
        2 => (0usize..4).prop_map(|role| Op::Bind { role }),
        1 => Just(Op::RegisterSignature),
        1 => Just(Op::DeleteSignature),
    ]
}

fn apply(service: &ApprovalService, id: &CaseId, op: &Op) {
    let user = UserId::new("signer");
    let _ = match op {
        Op::Complete { step, role } => service
            .complete_step(CompleteStep::new(id.clone(), *step, "u", ROLES[*role]))
            .map(|_| ()),
        Op::Return { target, role } => service
            .return_to_step(ReturnToStep::new(id.clone(), *target, "u", ROLES[*role], "prop"))
            .map(|_| ()),
        Op::Bind { role } => service
            .bind_signature(BindSignature::new(
                id.clone(),
                sig_field(),
                actor("signer", ROLES[*role]),
            ))
            .map(|_| ()),
        Op::RegisterSignature => service.register_signature(&user, PNG).map(|_| ()),
        Op::DeleteSignature => service.delete_signature(&user),
    };
}

fn snapshot(service: &ApprovalService, id: &CaseId) -> CaseState {
    service.get_state(id, &actor("observer", "Z")).unwrap().state
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The position always equals the lowest uncompleted step.
    #[test]
    fn position_tracks_completions(ops in prop::collection::vec(arb_op(), 1..40)) {
        let service = service();
        let id = open(&service).case_id;
        let total = report_template().step_count();
        let mut last_version = 1;

        for op in &ops {
            apply(&service, &id, op);
            let state = snapshot(&service, &id);

            prop_assert!(state.is_consistent(total), "inconsistent after {:?}: {:?}", op, state.position);
            prop_assert!(state.version >= last_version);
            last_version = state.version;

            let replayed = service.replay(&id).unwrap();
            prop_assert_eq!(replayed.position, state.position);
            let live: Vec<StepNumber> = state.completed_steps.keys().copied().collect();
            let replayed_steps: Vec<StepNumber> = replayed.completed_steps.into_iter().collect();
            prop_assert_eq!(live, replayed_steps);
        }

        prop_assert!(service.verify_audit_chain().unwrap());
    }

    /// Completing any step other than the current one is rejected.
    #[test]
    fn wrong_step_is_always_invalid(step in 0u32..10, role in 0usize..4) {
        let service = service();
        let id = open(&service).case_id;
        prop_assume!(step != 1);

        let result = service.complete_step(CompleteStep::new(id.clone(), step, "u", ROLES[role]));
        let is_invalid_step = matches!(result, Err(signoff_types::SignoffError::InvalidStep { .. }));
        prop_assert!(is_invalid_step);
        prop_assert_eq!(snapshot(&service, &id).version, 1);
    }

    /// Bindings are never removed by any operation.
    #[test]
    fn bindings_only_grow(ops in prop::collection::vec(arb_op(), 1..40)) {
        let service = service();
        let id = open(&service).case_id;
        let mut seen = 0;

        for op in &ops {
            apply(&service, &id, op);
            let count = snapshot(&service, &id).bindings.len();
            prop_assert!(count >= seen);
            seen = count;
        }
    }
}
