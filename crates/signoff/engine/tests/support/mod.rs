//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use signoff_engine::{ApprovalService, EngineConfig, InMemoryBlobStore};
use signoff_types::{
    Actor, CaseState, FieldPath, ReturnRule, StepDefinition, TemplateId, UserId, WorkflowTemplate,
};
use std::sync::Arc;

pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
pub const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

pub const TEMPLATE: &str = "report";

pub fn sig_field() -> FieldPath {
    FieldPath::parse("report.sig").unwrap()
}

/// Three steps for roles A, B and C; step 2 must be signed on `report.sig`.
/// Both A and C may send the case back from step 3.
pub fn report_template() -> WorkflowTemplate {
    WorkflowTemplate::new(TEMPLATE, "Report review")
        .with_step(StepDefinition::new(1, "A", "fill", "report"))
        .with_step(StepDefinition::new(2, "B", "approve", "report").with_signature_field(sig_field()))
        .with_step(StepDefinition::new(3, "C", "file", "archive"))
        .with_return_rule(ReturnRule::new(3, ["A", "C"]))
}

pub fn config() -> EngineConfig {
    EngineConfig::default().with_template(report_template())
}

pub fn service() -> ApprovalService {
    ApprovalService::new(&config()).unwrap()
}

pub fn service_with_blobs() -> (ApprovalService, Arc<InMemoryBlobStore>) {
    let blobs = Arc::new(InMemoryBlobStore::new());
    let service = ApprovalService::with_blob_store(&config(), blobs.clone()).unwrap();
    (service, blobs)
}

pub fn actor(user: &str, role: &str) -> Actor {
    Actor::new(user).with_role(role)
}

pub fn open(service: &ApprovalService) -> CaseState {
    service
        .open_case(&TemplateId::new(TEMPLATE), &UserId::new("opener"))
        .unwrap()
}
