//! State machine: the transition rules of a case
//!
//! Pure functions over a template and a case state. The step engine calls
//! them inside the case's critical section; nothing here touches storage.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use signoff_types::{
    CasePosition, CaseState, FieldPath, RoleId, SectionName, SignatureBinding, SignoffError,
    SignoffResult, StepCompletion, StepDefinition, StepNumber, UserId, WorkflowTemplate,
};

/// Transition rules for sequential, role-gated cases
#[derive(Clone, Copy, Debug, Default)]
pub struct StateMachine;

/// Outcome of an applied completion
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub completed_step: StepNumber,
    pub position: CasePosition,
    pub binding: Option<SignatureBinding>,
}

impl CompletionOutcome {
    pub fn finished_case(&self) -> bool {
        self.position.is_done()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Check that `role` may complete `step_number` now.
    ///
    /// Checks run in order: the step must be current, the role must match,
    /// the payload must stay within the step's editable fields, and a
    /// signature step must carry a binding for its current attempt.
    pub fn check_completion<'t>(
        &self,
        template: &'t WorkflowTemplate,
        state: &CaseState,
        step_number: StepNumber,
        role: &RoleId,
        payload: &Value,
    ) -> SignoffResult<&'t StepDefinition> {
        let current = match state.position {
            CasePosition::Step(n) if n == step_number => n,
            _ => {
                return Err(SignoffError::InvalidStep {
                    requested: step_number,
                    current: state.position,
                })
            }
        };

        let step = template.step(current).ok_or(SignoffError::InvalidStep {
            requested: step_number,
            current: state.position,
        })?;

        if &step.required_role != role {
            return Err(SignoffError::RoleMismatch {
                step: current,
                required: step.required_role.clone(),
                actual: role.clone(),
            });
        }

        self.check_payload(template, step, payload)?;

        if let Some(field) = &step.signature_field {
            if self.current_binding(state, step, field).is_none() {
                return Err(SignoffError::SignatureRequired(field.clone()));
            }
        }

        Ok(step)
    }

    /// Reject payload keys outside the step's editable fields.
    ///
    /// Keys holding a signature stamp are never writable, and a section
    /// carrying stamps can only be merged into, not replaced.
    pub fn check_payload(
        &self,
        template: &WorkflowTemplate,
        step: &StepDefinition,
        payload: &Value,
    ) -> SignoffResult<()> {
        let stamped = template.signature_keys(&step.target_section);
        let rejected = |field: String| SignoffError::FieldNotEditable {
            step: step.step_number,
            field,
        };

        match payload {
            Value::Null => Ok(()),
            Value::Object(fields) => {
                let blocked = fields.keys().find(|k| {
                    stamped.contains(k.as_str())
                        || (!step.editable_fields.is_empty() && !step.allows_field(k))
                });
                match blocked {
                    Some(field) => Err(rejected(field.clone())),
                    None => Ok(()),
                }
            }
            _ if step.editable_fields.is_empty() && stamped.is_empty() => Ok(()),
            _ => Err(rejected(step.target_section.to_string())),
        }
    }

    /// The binding that satisfies `step`'s signature for its current attempt.
    pub fn current_binding<'s>(
        &self,
        state: &'s CaseState,
        step: &StepDefinition,
        field: &FieldPath,
    ) -> Option<&'s SignatureBinding> {
        state.binding_for_attempt(field, step.step_number, state.attempt(step.step_number))
    }

    /// Record a checked completion and advance the case.
    pub fn apply_completion(
        &self,
        template: &WorkflowTemplate,
        state: &mut CaseState,
        step: &StepDefinition,
        actor: &UserId,
        role: &RoleId,
        payload: Value,
        now: DateTime<Utc>,
    ) -> CompletionOutcome {
        merge_section(&mut state.section_data, &step.target_section, payload);

        let binding = step
            .signature_field
            .as_ref()
            .and_then(|field| self.current_binding(state, step, field))
            .cloned();

        if let Some(binding) = &binding {
            match serde_json::to_value(binding.stamp()) {
                Ok(stamp) => write_at_path(&mut state.section_data, &binding.field_path, stamp),
                Err(e) => tracing::warn!(error = %e, "Could not encode signature stamp"),
            }
        }

        state.completed_steps.insert(
            step.step_number,
            StepCompletion {
                step_number: step.step_number,
                completed_by: actor.clone(),
                completed_by_role: role.clone(),
                completed_at: now,
                signature: binding.as_ref().map(|b| b.binding_id.clone()),
            },
        );

        state.position = state.derived_position(template.step_count());
        if state.position.is_done() {
            state.completed_at = Some(now);
        }

        CompletionOutcome {
            completed_step: step.step_number,
            position: state.position,
            binding,
        }
    }

    // ── Return ───────────────────────────────────────────────────────

    /// Check that `role` may send the case back to `target`.
    ///
    /// Returns the step the case currently sits on.
    pub fn check_return(
        &self,
        template: &WorkflowTemplate,
        state: &CaseState,
        target: StepNumber,
        role: &RoleId,
    ) -> SignoffResult<StepNumber> {
        let invalid = || SignoffError::InvalidReturnTarget {
            target,
            current: state.position,
        };

        let current = state.current_step_number().ok_or_else(invalid)?;
        if target < 1 || target >= current || !template.return_targets(current).contains(&target)
        {
            return Err(invalid());
        }

        if !template.return_authorized_roles(current).contains(role) {
            return Err(SignoffError::Forbidden(format!(
                "role {} may not return the case from step {}",
                role, current
            )));
        }

        Ok(current)
    }

    /// Reopen `target` and every later step.
    ///
    /// Completion records of steps at or after `target` are dropped and
    /// their attempt counters bumped, so bindings made earlier stay in
    /// history but no longer satisfy the reopened steps.
    pub fn apply_return(
        &self,
        template: &WorkflowTemplate,
        state: &mut CaseState,
        target: StepNumber,
    ) -> CasePosition {
        state.completed_steps.retain(|n, _| *n < target);
        for step in target..=template.step_count() {
            let next = state.attempt(step) + 1;
            state.attempts.insert(step, next);
        }
        state.completed_at = None;
        state.position = state.derived_position(template.step_count());
        state.position
    }
}

// ── Section data helpers ─────────────────────────────────────────────

/// Fold a step payload into its section.
///
/// An object is merged key by key into an object section; any other
/// value replaces the section; `null` leaves it untouched.
pub fn merge_section(
    sections: &mut std::collections::BTreeMap<SectionName, Value>,
    section: &SectionName,
    payload: Value,
) {
    match payload {
        Value::Null => {}
        Value::Object(incoming) => match sections.get_mut(section) {
            Some(Value::Object(existing)) => existing.extend(incoming),
            _ => {
                sections.insert(section.clone(), Value::Object(incoming));
            }
        },
        other => {
            sections.insert(section.clone(), other);
        }
    }
}

/// Write `value` at a dotted path, creating intermediate objects.
///
/// Non-object values met along the way are replaced by objects.
pub fn write_at_path(
    sections: &mut std::collections::BTreeMap<SectionName, Value>,
    path: &FieldPath,
    value: Value,
) {
    let section = path.section();
    let current = sections.remove(&section).unwrap_or(Value::Null);
    sections.insert(section, set_path(current, path.field_segments(), value));
}

fn set_path(node: Value, path: &[String], value: Value) -> Value {
    match path.split_first() {
        None => value,
        Some((head, rest)) => {
            let mut map = match node {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let child = map.remove(head).unwrap_or(Value::Null);
            map.insert(head.clone(), set_path(child, rest, value));
            Value::Object(map)
        }
    }
}
