//! End-to-end test: bindings stay verifiable until their image bytes change.

use crate::support::*;
use serde_json::json;
use signoff_engine::{
    ApprovalService, BindSignature, CompleteStep, EngineConfig, DEFAULT_MAX_SIGNATURE_BYTES,
};
use signoff_types::{
    ErrorKind, FieldPath, ImageFormat, SectionName, SignoffError, StepDefinition, TemplateId,
    UserId, WorkflowTemplate,
};

fn at_signing_step(service: &signoff_engine::ApprovalService) -> signoff_types::CaseId {
    let case = open(service);
    service
        .complete_step(CompleteStep::new(case.case_id.clone(), 1, "alice", "A"))
        .unwrap();
    case.case_id
}

#[test]
fn verify_detects_altered_image() {
    let (service, blobs) = service_with_blobs();
    let id = at_signing_step(&service);
    service.register_signature(&UserId::new("bob"), PNG).unwrap();

    let binding = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    assert!(service.verify_binding(&id, &sig_field()).unwrap());

    assert!(blobs.overwrite(&binding.image_ref, JPEG.to_vec()));
    assert!(!service.verify_binding(&id, &sig_field()).unwrap());
}

#[test]
fn verify_is_false_when_image_is_gone() {
    let (service, blobs) = service_with_blobs();
    let id = at_signing_step(&service);
    service.register_signature(&UserId::new("bob"), PNG).unwrap();
    let binding = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();

    assert!(blobs.purge(&binding.image_ref));
    assert!(!service.verify_binding(&id, &sig_field()).unwrap());
}

#[test]
fn replaced_signature_does_not_touch_old_binding() {
    let service = service();
    let id = at_signing_step(&service);
    let bob = UserId::new("bob");
    let first = service.register_signature(&bob, PNG).unwrap();
    let binding = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    assert_eq!(binding.image_hash, first.content_hash);

    let second = service.register_signature(&bob, JPEG).unwrap();
    assert_eq!(second.format, ImageFormat::Jpeg);
    service.delete_signature(&bob).unwrap();
    assert!(service.signature(&bob).is_none());

    assert!(service.verify_binding(&id, &sig_field()).unwrap());
    assert_eq!(service.case_signatures(&id).unwrap()[&sig_field()], binding);
}

#[test]
fn bind_needs_registered_signature() {
    let service = service();
    let id = at_signing_step(&service);
    let err = service
        .bind_signature(BindSignature::new(id, sig_field(), actor("bob", "B")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(err.to_string().contains("register a signature first"));
}

#[test]
fn only_the_current_steps_field_is_signable() {
    let service = service();
    let case = open(&service);
    service.register_signature(&UserId::new("bob"), PNG).unwrap();

    // Step 1 has no signature field
    let early = service.bind_signature(BindSignature::new(
        case.case_id.clone(),
        sig_field(),
        actor("bob", "B"),
    ));
    assert!(matches!(early, Err(SignoffError::FieldNotSignable(_))));

    service
        .complete_step(CompleteStep::new(case.case_id.clone(), 1, "alice", "A"))
        .unwrap();
    let other = service.bind_signature(BindSignature::new(
        case.case_id.clone(),
        FieldPath::parse("report.other").unwrap(),
        actor("bob", "B"),
    ));
    assert!(matches!(other, Err(SignoffError::FieldNotSignable(_))));
}

#[test]
fn upload_limits_apply() {
    let service = service();
    let bob = UserId::new("bob");
    assert!(matches!(
        service.register_signature(&bob, b"GIF89a...."),
        Err(SignoffError::InvalidFormat(_))
    ));

    let mut largest = PNG.to_vec();
    largest.resize(DEFAULT_MAX_SIGNATURE_BYTES, 0);
    service.register_signature(&bob, &largest).unwrap();

    let mut huge = largest.clone();
    huge.push(0);
    assert!(matches!(
        service.register_signature(&bob, &huge),
        Err(SignoffError::TooLarge { .. })
    ));
    assert_eq!(
        service.signature(&bob).unwrap().size_bytes,
        DEFAULT_MAX_SIGNATURE_BYTES
    );
}

#[test]
fn later_step_cannot_overwrite_signed_field() {
    let template = WorkflowTemplate::new("memo", "Memo")
        .with_step(StepDefinition::new(1, "A", "fill", "report"))
        .with_step(StepDefinition::new(2, "B", "approve", "report").with_signature_field(sig_field()))
        .with_step(StepDefinition::new(3, "C", "review", "report"));
    let service = ApprovalService::new(&EngineConfig::default().with_template(template)).unwrap();
    let id = service
        .open_case(&TemplateId::new("memo"), &UserId::new("opener"))
        .unwrap()
        .case_id;

    service
        .complete_step(CompleteStep::new(id.clone(), 1, "alice", "A").with_payload(json!({"x": 1})))
        .unwrap();
    service.register_signature(&UserId::new("bob"), PNG).unwrap();
    let binding = service
        .bind_signature(BindSignature::new(id.clone(), sig_field(), actor("bob", "B")))
        .unwrap();
    service
        .complete_step(CompleteStep::new(id.clone(), 2, "bob", "B"))
        .unwrap();

    let forged = service
        .complete_step(CompleteStep::new(id.clone(), 3, "carol", "C").with_payload(json!({"sig": "forged"})))
        .unwrap_err();
    assert!(matches!(forged, SignoffError::FieldNotEditable { step: 3, ref field } if field == "sig"));

    let state = service
        .complete_step(CompleteStep::new(id.clone(), 3, "carol", "C").with_payload(json!({"verdict": "ok"})))
        .unwrap();
    let report = state.section(&SectionName::new("report")).unwrap();
    assert_eq!(report["x"], json!(1));
    assert_eq!(report["verdict"], json!("ok"));
    assert_eq!(report["sig"]["bindingId"], json!(binding.binding_id.0));
    assert!(service.verify_binding(&id, &sig_field()).unwrap());
}

#[test]
fn section_level_signature_field_is_rejected() {
    let template = WorkflowTemplate::new("memo", "Memo")
        .with_step(StepDefinition::new(1, "A", "fill", "report"))
        .with_step(
            StepDefinition::new(2, "B", "approve", "report")
                .with_signature_field(FieldPath::parse("report").unwrap()),
        );
    let err = ApprovalService::new(&EngineConfig::default().with_template(template)).unwrap_err();
    assert!(matches!(err, SignoffError::InvalidTemplate(_)));
}
