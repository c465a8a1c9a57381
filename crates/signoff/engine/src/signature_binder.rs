//! Signature binder: applies registered signatures to case fields
//!
//! A binding copies the signer's image reference and hash at signing time
//! and seals them with a hash over image bytes, case id, field path and
//! signing instant. Bindings are appended to the case and never removed.

use crate::{AuditTrail, CaseStore, SignatureStore, TemplateRegistry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use signoff_types::{
    Actor, BindingId, CaseId, FieldPath, SignatureBinding, SignoffError, SignoffResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Request to sign a field of a case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BindSignature {
    pub case_id: CaseId,
    pub field_path: FieldPath,
    pub signer: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl BindSignature {
    pub fn new(case_id: CaseId, field_path: FieldPath, signer: Actor) -> Self {
        Self {
            case_id,
            field_path,
            signer,
            expected_version: None,
        }
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Binds and verifies signatures on case fields
#[derive(Clone, Debug)]
pub struct SignatureBinder {
    templates: Arc<TemplateRegistry>,
    cases: Arc<CaseStore>,
    signatures: Arc<SignatureStore>,
    audit: Arc<AuditTrail>,
}

impl SignatureBinder {
    pub fn new(
        templates: Arc<TemplateRegistry>,
        cases: Arc<CaseStore>,
        signatures: Arc<SignatureStore>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            templates,
            cases,
            signatures,
            audit,
        }
    }

    /// Bind the signer's registered signature to a field of the current step.
    pub fn bind_signature(&self, cmd: BindSignature) -> SignoffResult<SignatureBinding> {
        let signer = &cmd.signer;
        let result = self
            .cases
            .mutate(&cmd.case_id, cmd.expected_version, |state| {
                let record = self
                    .signatures
                    .get(&signer.user_id)
                    .ok_or_else(|| SignoffError::NoRegisteredSignature(signer.user_id.clone()))?;

                let template = self.templates.get(&state.template_id)?;
                let step = state
                    .current_step_number()
                    .and_then(|n| template.step(n))
                    .filter(|s| s.signature_field.as_ref() == Some(&cmd.field_path))
                    .filter(|s| signer.holds(&s.required_role))
                    .ok_or_else(|| SignoffError::FieldNotSignable(cmd.field_path.clone()))?;

                let image = self.signatures.verified_image(&record)?;

                let signed_at = Utc::now();
                let binding = SignatureBinding {
                    binding_id: BindingId::generate(),
                    case_id: state.case_id.clone(),
                    field_path: cmd.field_path.clone(),
                    step_number: step.step_number,
                    attempt: state.attempt(step.step_number),
                    signer: signer.user_id.clone(),
                    signer_role: step.required_role.clone(),
                    image_ref: record.image_ref.clone(),
                    image_hash: record.content_hash,
                    signed_at,
                    binding_hash: SignatureBinding::compute_hash(
                        &image,
                        &state.case_id,
                        &cmd.field_path,
                        &signed_at,
                    ),
                };

                self.audit.record_signature_bound(&binding)?;
                state.bindings.push(binding.clone());
                Ok(binding)
            });

        match result {
            Ok((binding, state)) => {
                tracing::info!(
                    case_id = %binding.case_id,
                    field = %binding.field_path,
                    signer = %binding.signer,
                    step = binding.step_number,
                    attempt = binding.attempt,
                    version = state.version,
                    "Signature bound"
                );
                Ok(binding)
            }
            Err(e) => {
                tracing::debug!(
                    case_id = %cmd.case_id,
                    field = %cmd.field_path,
                    kind = ?e.kind(),
                    error = %e,
                    "Binding rejected"
                );
                Err(e)
            }
        }
    }

    /// Recompute the active binding's hash from the referenced image bytes.
    ///
    /// A mismatch or a missing image yields `false`; only an absent binding
    /// is an error.
    pub fn verify_binding(&self, case_id: &CaseId, field_path: &FieldPath) -> SignoffResult<bool> {
        let state = self.cases.snapshot(case_id)?;
        let binding = state
            .active_binding(field_path)
            .ok_or_else(|| SignoffError::BindingNotFound {
                case_id: case_id.clone(),
                field_path: field_path.clone(),
            })?;

        let intact = match self.signatures.load_image(&binding.image_ref)? {
            Some(bytes) => binding.matches(&bytes),
            None => false,
        };
        if !intact {
            tracing::warn!(
                case_id = %case_id,
                field = %field_path,
                binding_id = %binding.binding_id,
                "Binding verification failed"
            );
        }
        Ok(intact)
    }

    /// The newest binding of every signed field of a case.
    pub fn case_signatures(
        &self,
        case_id: &CaseId,
    ) -> SignoffResult<BTreeMap<FieldPath, SignatureBinding>> {
        let state = self.cases.snapshot(case_id)?;
        Ok(state
            .active_bindings()
            .into_iter()
            .map(|(path, binding)| (path, binding.clone()))
            .collect())
    }

    /// Every binding ever made on a field, oldest first.
    pub fn signature_history(
        &self,
        case_id: &CaseId,
        field_path: &FieldPath,
    ) -> SignoffResult<Vec<SignatureBinding>> {
        let state = self.cases.snapshot(case_id)?;
        Ok(state
            .binding_history(field_path)
            .into_iter()
            .cloned()
            .collect())
    }
}
