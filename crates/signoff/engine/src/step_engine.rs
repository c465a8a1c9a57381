//! Step engine: opens cases and drives them through their steps
//!
//! Completion and return run inside the case's critical section in the
//! [`CaseStore`]: validate, apply, append the audit record, then commit.
//! A rejected command leaves both the case and the audit trail untouched.

use crate::{AuditTrail, CaseStore, StateMachine, TemplateRegistry};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use signoff_types::{
    CaseId, CaseState, RoleId, SignoffResult, StepNumber, TemplateId, UserId,
    WorkflowTemplate,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Request to complete the current step of a case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompleteStep {
    pub case_id: CaseId,
    pub step_number: StepNumber,
    pub actor: UserId,
    pub role: RoleId,
    /// Section payload; `null` leaves the section unchanged
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl CompleteStep {
    pub fn new(
        case_id: CaseId,
        step_number: StepNumber,
        actor: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            case_id,
            step_number,
            actor: UserId::new(actor),
            role: RoleId::new(role),
            payload: serde_json::Value::Null,
            expected_version: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Fail with `Conflict` unless the case is still at `version`.
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Request to send a case back to an earlier step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReturnToStep {
    pub case_id: CaseId,
    pub target_step: StepNumber,
    pub actor: UserId,
    pub role: RoleId,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<u64>,
}

impl ReturnToStep {
    pub fn new(
        case_id: CaseId,
        target_step: StepNumber,
        actor: impl Into<String>,
        role: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            case_id,
            target_step,
            actor: UserId::new(actor),
            role: RoleId::new(role),
            reason: reason.into(),
            expected_version: None,
        }
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Drives cases through their template's steps
#[derive(Clone, Debug)]
pub struct StepEngine {
    templates: Arc<TemplateRegistry>,
    cases: Arc<CaseStore>,
    audit: Arc<AuditTrail>,
    rules: StateMachine,
}

impl StepEngine {
    pub fn new(
        templates: Arc<TemplateRegistry>,
        cases: Arc<CaseStore>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            templates,
            cases,
            audit,
            rules: StateMachine::new(),
        }
    }

    // ── Case lifecycle ───────────────────────────────────────────────

    /// Open a new case at step 1.
    pub fn open_case(&self, template_id: &TemplateId, opened_by: &UserId) -> SignoffResult<CaseState> {
        let template = self.templates.get(template_id)?;
        let state = CaseState::new(CaseId::generate(), template.id.clone(), opened_by.clone());

        self.audit
            .record_case_opened(&state.case_id, &template.id, opened_by)?;
        self.cases.insert(state.clone())?;

        tracing::info!(
            case_id = %state.case_id,
            template_id = %template.id,
            opened_by = %opened_by,
            "Case opened"
        );
        Ok(state)
    }

    pub fn get_state(&self, case_id: &CaseId) -> SignoffResult<CaseState> {
        self.cases.snapshot(case_id)
    }

    /// The template a case was opened from.
    pub fn template_for(&self, state: &CaseState) -> SignoffResult<Arc<WorkflowTemplate>> {
        self.templates.get(&state.template_id)
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Complete the current step and advance the case.
    pub fn complete_step(&self, cmd: CompleteStep) -> SignoffResult<CaseState> {
        let result = self
            .cases
            .mutate(&cmd.case_id, cmd.expected_version, |state| {
                let template = self.templates.get(&state.template_id)?;
                let step = self.rules.check_completion(
                    &template,
                    state,
                    cmd.step_number,
                    &cmd.role,
                    &cmd.payload,
                )?;
                let outcome = self.rules.apply_completion(
                    &template,
                    state,
                    step,
                    &cmd.actor,
                    &cmd.role,
                    cmd.payload.clone(),
                    Utc::now(),
                );

                self.audit.record_step_completed(
                    &state.case_id,
                    outcome.completed_step,
                    &cmd.role,
                    &cmd.actor,
                    outcome.binding.as_ref().map(|b| &b.binding_id),
                )?;
                if outcome.finished_case() {
                    self.audit.record_case_completed(&state.case_id, &cmd.actor)?;
                }
                Ok(outcome)
            });

        match result {
            Ok((outcome, state)) => {
                tracing::info!(
                    case_id = %state.case_id,
                    step = outcome.completed_step,
                    role = %cmd.role,
                    position = %state.position,
                    version = state.version,
                    "Step completed"
                );
                Ok(state)
            }
            Err(e) => {
                tracing::debug!(
                    case_id = %cmd.case_id,
                    step = cmd.step_number,
                    kind = ?e.kind(),
                    error = %e,
                    "Step completion rejected"
                );
                Err(e)
            }
        }
    }

    /// Send the case back to an earlier step.
    pub fn return_to_step(&self, cmd: ReturnToStep) -> SignoffResult<CaseState> {
        let result = self
            .cases
            .mutate(&cmd.case_id, cmd.expected_version, |state| {
                let template = self.templates.get(&state.template_id)?;
                let from_step =
                    self.rules
                        .check_return(&template, state, cmd.target_step, &cmd.role)?;
                self.rules.apply_return(&template, state, cmd.target_step);

                self.audit.record_case_returned(
                    &state.case_id,
                    from_step,
                    cmd.target_step,
                    &cmd.role,
                    &cmd.actor,
                    &cmd.reason,
                )?;
                Ok(from_step)
            });

        match result {
            Ok((from_step, state)) => {
                tracing::info!(
                    case_id = %state.case_id,
                    from_step,
                    to_step = cmd.target_step,
                    role = %cmd.role,
                    version = state.version,
                    "Case returned"
                );
                Ok(state)
            }
            Err(e) => {
                tracing::debug!(
                    case_id = %cmd.case_id,
                    target = cmd.target_step,
                    kind = ?e.kind(),
                    error = %e,
                    "Return rejected"
                );
                Err(e)
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Open cases waiting on one of `roles`, oldest first.
    pub fn pending_for(&self, roles: &BTreeSet<RoleId>) -> Vec<CaseState> {
        self.cases
            .list()
            .into_iter()
            .filter(|state| match state.current_step_number() {
                Some(n) => self
                    .templates
                    .get(&state.template_id)
                    .ok()
                    .and_then(|t| t.step(n).map(|s| roles.contains(&s.required_role)))
                    .unwrap_or(false),
                None => false,
            })
            .collect()
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }
}
