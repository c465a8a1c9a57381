//! Approval service: the entry point of the sign-off engine
//!
//! Wires the template registry, case store, signature store and audit
//! trail together and exposes the operation set consumed by transports.
//! Every component is shared behind an `Arc`, so the service is cheap to
//! clone into concurrent request handlers.

use crate::{
    AuditTrail, BindSignature, BlobStore, CaseStore, CompleteStep, EngineConfig,
    InMemoryBlobStore, PermissionResolver, ReplayedCase, ReturnToStep, SignatureBinder,
    SignatureLimits, SignatureStore, StepEngine, TemplateRegistry,
};
use signoff_types::{
    Actor, AuditRecord, CaseId, CaseState, CaseView, FieldPath, Permissions, SignatureBinding,
    SignatureRecord, SignoffResult, TemplateId, UserId, WorkflowTemplate,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// The sign-off engine
#[derive(Clone, Debug)]
pub struct ApprovalService {
    templates: Arc<TemplateRegistry>,
    audit: Arc<AuditTrail>,
    signatures: Arc<SignatureStore>,
    engine: StepEngine,
    resolver: PermissionResolver,
    binder: SignatureBinder,
}

impl ApprovalService {
    /// Build a service with in-memory image storage.
    pub fn new(config: &EngineConfig) -> SignoffResult<Self> {
        Self::with_blob_store(config, Arc::new(InMemoryBlobStore::new()))
    }

    /// Build a service on top of the given image storage.
    pub fn with_blob_store(config: &EngineConfig, blobs: Arc<dyn BlobStore>) -> SignoffResult<Self> {
        config.validate()?;
        let templates = Arc::new(TemplateRegistry::from_templates(config.templates.clone())?);
        let cases = Arc::new(CaseStore::new());
        let audit = Arc::new(AuditTrail::new());
        let signatures = Arc::new(SignatureStore::new(
            blobs,
            SignatureLimits::from_config(config),
            Arc::clone(&audit),
        ));

        tracing::info!(
            templates = templates.count(),
            max_signature_bytes = config.max_signature_bytes,
            "Approval service ready"
        );

        Ok(Self {
            engine: StepEngine::new(Arc::clone(&templates), Arc::clone(&cases), Arc::clone(&audit)),
            resolver: PermissionResolver::new(Arc::clone(&templates)),
            binder: SignatureBinder::new(
                Arc::clone(&templates),
                cases,
                Arc::clone(&signatures),
                Arc::clone(&audit),
            ),
            templates,
            audit,
            signatures,
        })
    }

    /// Build a service from a TOML or YAML configuration file.
    pub fn from_config_file(path: &Path) -> SignoffResult<Self> {
        Self::new(&EngineConfig::from_path(path)?)
    }

    // ── Templates ────────────────────────────────────────────────────

    pub fn template(&self, id: &TemplateId) -> SignoffResult<Arc<WorkflowTemplate>> {
        self.templates.get(id)
    }

    pub fn templates(&self) -> Vec<Arc<WorkflowTemplate>> {
        self.templates.list()
    }

    // ── Cases ────────────────────────────────────────────────────────

    pub fn open_case(&self, template_id: &TemplateId, opened_by: &UserId) -> SignoffResult<CaseState> {
        self.engine.open_case(template_id, opened_by)
    }

    /// Snapshot of a case with the caller's permissions resolved on it.
    pub fn get_state(&self, case_id: &CaseId, caller: &Actor) -> SignoffResult<CaseView> {
        let state = self.engine.get_state(case_id)?;
        let permissions = self.resolver.resolve(&state, &caller.roles);
        Ok(CaseView { state, permissions })
    }

    pub fn permissions(&self, state: &CaseState, caller: &Actor) -> Permissions {
        self.resolver.resolve(state, &caller.roles)
    }

    pub fn complete_step(&self, cmd: CompleteStep) -> SignoffResult<CaseState> {
        self.engine.complete_step(cmd)
    }

    pub fn return_to_step(&self, cmd: ReturnToStep) -> SignoffResult<CaseState> {
        self.engine.return_to_step(cmd)
    }

    /// Open cases waiting on one of the caller's roles, oldest first.
    pub fn pending_for(&self, caller: &Actor) -> Vec<CaseState> {
        self.engine.pending_for(&caller.roles)
    }

    // ── Signatures ───────────────────────────────────────────────────

    pub fn register_signature(&self, owner: &UserId, image: &[u8]) -> SignoffResult<SignatureRecord> {
        self.signatures.register(owner, image)
    }

    pub fn delete_signature(&self, owner: &UserId) -> SignoffResult<()> {
        self.signatures.delete(owner).map(|_| ())
    }

    pub fn signature(&self, owner: &UserId) -> Option<SignatureRecord> {
        self.signatures.get(owner)
    }

    pub fn bind_signature(&self, cmd: BindSignature) -> SignoffResult<SignatureBinding> {
        self.binder.bind_signature(cmd)
    }

    pub fn verify_binding(&self, case_id: &CaseId, field_path: &FieldPath) -> SignoffResult<bool> {
        self.binder.verify_binding(case_id, field_path)
    }

    pub fn case_signatures(
        &self,
        case_id: &CaseId,
    ) -> SignoffResult<BTreeMap<FieldPath, SignatureBinding>> {
        self.binder.case_signatures(case_id)
    }

    pub fn signature_history(
        &self,
        case_id: &CaseId,
        field_path: &FieldPath,
    ) -> SignoffResult<Vec<SignatureBinding>> {
        self.binder.signature_history(case_id, field_path)
    }

    // ── Audit ────────────────────────────────────────────────────────

    pub fn audit_for(&self, case_id: &CaseId) -> SignoffResult<Vec<AuditRecord>> {
        self.audit.events_for(case_id)
    }

    pub fn audit_records(&self) -> SignoffResult<Vec<AuditRecord>> {
        self.audit.records()
    }

    pub fn verify_audit_chain(&self) -> SignoffResult<bool> {
        self.audit.verify_chain()
    }

    /// Rebuild a case's progress from its audit records.
    pub fn replay(&self, case_id: &CaseId) -> SignoffResult<ReplayedCase> {
        let state = self.engine.get_state(case_id)?;
        let template = self.engine.template_for(&state)?;
        self.audit.replay(case_id, template.step_count())
    }
}
