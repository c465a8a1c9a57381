//! Case state: one document moving through a template's steps
//!
//! The position of a case is always derivable from its completions:
//! it sits on the lowest step that has no completion, or is `Done` once
//! every step is complete.

use crate::{
    BindingId, CaseId, FieldPath, RoleId, SectionName, SignatureBinding, StepNumber, TemplateId,
    UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Position ─────────────────────────────────────────────────────────

/// Where a case currently sits in its template
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum CasePosition {
    /// Waiting on this step
    Step(StepNumber),
    /// Every step is complete
    Done,
}

impl CasePosition {
    pub fn step_number(&self) -> Option<StepNumber> {
        match self {
            Self::Step(n) => Some(*n),
            Self::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for CasePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(n) => write!(f, "step {}", n),
            Self::Done => write!(f, "done"),
        }
    }
}

// ── Step Completion ──────────────────────────────────────────────────

/// Record of a committed step; immutable once created
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCompletion {
    pub step_number: StepNumber,
    pub completed_by: UserId,
    pub completed_by_role: RoleId,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<BindingId>,
}

// ── Case State ───────────────────────────────────────────────────────

/// The full state of one case
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseState {
    pub case_id: CaseId,
    pub template_id: TemplateId,
    pub position: CasePosition,
    /// Completions keyed by step number
    pub completed_steps: BTreeMap<StepNumber, StepCompletion>,
    /// Opaque document payload per section
    pub section_data: BTreeMap<SectionName, serde_json::Value>,
    /// Every binding ever made on this case, in creation order
    pub bindings: Vec<SignatureBinding>,
    /// Attempt counter per step; absent means first attempt
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attempts: BTreeMap<StepNumber, u32>,
    /// Incremented by every committed mutation
    pub version: u64,
    pub opened_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CaseState {
    /// Create a case sitting on step 1
    pub fn new(case_id: CaseId, template_id: TemplateId, opened_by: UserId) -> Self {
        let now = Utc::now();
        Self {
            case_id,
            template_id,
            position: CasePosition::Step(1),
            completed_steps: BTreeMap::new(),
            section_data: BTreeMap::new(),
            bindings: Vec::new(),
            attempts: BTreeMap::new(),
            version: 1,
            opened_by,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn current_step_number(&self) -> Option<StepNumber> {
        self.position.step_number()
    }

    pub fn is_done(&self) -> bool {
        self.position.is_done()
    }

    pub fn is_completed(&self, step: StepNumber) -> bool {
        self.completed_steps.contains_key(&step)
    }

    /// Current attempt of a step (1 until the step is reopened by a return).
    pub fn attempt(&self, step: StepNumber) -> u32 {
        self.attempts.get(&step).copied().unwrap_or(1)
    }

    /// The position implied by the completions for a template of `total` steps.
    pub fn derived_position(&self, total: StepNumber) -> CasePosition {
        (1..=total)
            .find(|n| !self.completed_steps.contains_key(n))
            .map(CasePosition::Step)
            .unwrap_or(CasePosition::Done)
    }

    /// Whether the stored position agrees with the completions.
    pub fn is_consistent(&self, total: StepNumber) -> bool {
        self.completed_steps.keys().all(|n| *n >= 1 && *n <= total)
            && self.position == self.derived_position(total)
    }

    pub fn section(&self, name: &SectionName) -> Option<&serde_json::Value> {
        self.section_data.get(name)
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// The newest binding on a field path, by `signed_at` then creation order.
    pub fn active_binding(&self, field_path: &FieldPath) -> Option<&SignatureBinding> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| &b.field_path == field_path)
            .max_by_key(|(idx, b)| (b.signed_at, *idx))
            .map(|(_, b)| b)
    }

    /// The newest binding made for the given step attempt.
    pub fn binding_for_attempt(
        &self,
        field_path: &FieldPath,
        step: StepNumber,
        attempt: u32,
    ) -> Option<&SignatureBinding> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                &b.field_path == field_path && b.step_number == step && b.attempt == attempt
            })
            .max_by_key(|(idx, b)| (b.signed_at, *idx))
            .map(|(_, b)| b)
    }

    /// All bindings on a field path, oldest first.
    pub fn binding_history(&self, field_path: &FieldPath) -> Vec<&SignatureBinding> {
        let mut history: Vec<&SignatureBinding> = self
            .bindings
            .iter()
            .filter(|b| &b.field_path == field_path)
            .collect();
        history.sort_by_key(|b| b.signed_at);
        history
    }

    /// The active binding of every signed field path.
    pub fn active_bindings(&self) -> BTreeMap<FieldPath, &SignatureBinding> {
        let mut active = BTreeMap::new();
        for binding in &self.bindings {
            if let Some(current) = self.active_binding(&binding.field_path) {
                active.insert(binding.field_path.clone(), current);
            }
        }
        active
    }
}
