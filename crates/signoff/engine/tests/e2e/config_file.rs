//! End-to-end test: a service built from a configuration file on disk.

use signoff_engine::{ApprovalService, CompleteStep};
use signoff_types::{CasePosition, TemplateId, UserId};
use std::io::Write;

const YAML: &str = r#"
max_signature_bytes: 65536
allowed_formats: [png]
templates:
  - id: property-status
    name: Property status review
    steps:
      - step_number: 1
        required_role: LC_CONTRACTS_ASSEMBLIES_LEAD
        action: fill_legal_report
        target_section: legalDeputyReport
      - step_number: 2
        required_role: LC_MANAGER
        action: approve_legal_report
        target_section: legalDeputyReport
        signature_field: legalDeputyReport.headOfContractsSignature
    return_rules:
      - from_step: 2
        roles: [LC_MANAGER]
        targets: [1]
"#;

#[test]
fn service_from_yaml_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(YAML.as_bytes()).unwrap();

    let service = ApprovalService::from_config_file(file.path()).unwrap();
    let template = service.template(&TemplateId::new("property-status")).unwrap();
    assert_eq!(template.step_count(), 2);

    let case = service
        .open_case(&template.id, &UserId::new("lead"))
        .unwrap();
    let state = service
        .complete_step(CompleteStep::new(
            case.case_id,
            1,
            "lead",
            "LC_CONTRACTS_ASSEMBLIES_LEAD",
        ))
        .unwrap();
    assert_eq!(state.position, CasePosition::Step(2));

    // JPEG is not allowed by this configuration
    assert!(service
        .register_signature(&UserId::new("mgr"), &[0xFF, 0xD8, 0xFF, 0xE0])
        .is_err());
}

#[test]
fn broken_file_is_rejected() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(b"templates = 3").unwrap();
    assert!(ApprovalService::from_config_file(file.path()).is_err());
}
