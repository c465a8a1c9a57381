//! Workflow templates: the immutable step table a case moves through
//!
//! A template is an ordered list of steps numbered `1..=N`. Each step is
//! gated by one required role, writes into one document section and may
//! demand a signature on one field before it can be completed.
//!
//! Templates are validated once when loaded and never mutated afterwards.
//! The same template value drives both the step engine and the
//! permission resolver.

use crate::{FieldPath, RoleId, SectionName, SignoffError, SignoffResult, StepNumber, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

// ── Step Definition ──────────────────────────────────────────────────

/// One step of a template
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Position in the template (1-based, contiguous)
    pub step_number: StepNumber,
    /// The only role allowed to complete this step
    pub required_role: RoleId,
    /// What completing this step means, e.g. `approve_legal_report`
    pub action: String,
    /// Section the step's payload is written to
    pub target_section: SectionName,
    /// Field that must carry a bound signature before completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_field: Option<FieldPath>,
    /// Human-readable description of the step
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Restricts payload keys; empty means any key of the section
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editable_fields: Vec<String>,
}

impl StepDefinition {
    pub fn new(
        step_number: StepNumber,
        required_role: impl Into<String>,
        action: impl Into<String>,
        target_section: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            required_role: RoleId::new(required_role),
            action: action.into(),
            target_section: SectionName::new(target_section),
            signature_field: None,
            description: String::new(),
            editable_fields: Vec::new(),
        }
    }

    pub fn with_signature_field(mut self, field: FieldPath) -> Self {
        self.signature_field = Some(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_editable_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.editable_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn requires_signature(&self) -> bool {
        self.signature_field.is_some()
    }

    /// Whether a payload key may be written by this step.
    pub fn allows_field(&self, field: &str) -> bool {
        self.editable_fields.is_empty() || self.editable_fields.iter().any(|f| f == field)
    }
}

// ── Section Visibility ───────────────────────────────────────────────

/// Restricts which roles may see a section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionVisibility {
    pub section: SectionName,
    pub roles: BTreeSet<RoleId>,
}

// ── Return Rules ─────────────────────────────────────────────────────

/// Overrides who may return a case sitting on `from_step`, and where to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRule {
    pub from_step: StepNumber,
    /// Roles allowed to return from `from_step`
    pub roles: BTreeSet<RoleId>,
    /// Allowed destinations; `None` means any earlier step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<StepNumber>>,
}

impl ReturnRule {
    pub fn new<I, S>(from_step: StepNumber, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from_step,
            roles: roles.into_iter().map(|r| RoleId::new(r)).collect(),
            targets: None,
        }
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = StepNumber>) -> Self {
        self.targets = Some(targets.into_iter().collect());
        self
    }
}

// ── Workflow Template ────────────────────────────────────────────────

/// The immutable step table for one kind of case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub steps: Vec<StepDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section_visibility: Vec<SectionVisibility>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub return_rules: Vec<ReturnRule>,
}

impl WorkflowTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TemplateId::new(id),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            section_visibility: Vec::new(),
            return_rules: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_return_rule(mut self, rule: ReturnRule) -> Self {
        self.return_rules.push(rule);
        self
    }

    pub fn with_section_visibility<I, S>(mut self, section: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.section_visibility.push(SectionVisibility {
            section: SectionName::new(section),
            roles: roles.into_iter().map(|r| RoleId::new(r)).collect(),
        });
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn step(&self, step_number: StepNumber) -> Option<&StepDefinition> {
        step_number
            .checked_sub(1)
            .and_then(|idx| self.steps.get(idx as usize))
            .filter(|s| s.step_number == step_number)
    }

    pub fn step_count(&self) -> StepNumber {
        self.steps.len() as StepNumber
    }

    /// The step that declares `field` as its signature field.
    pub fn step_for_signature_field(&self, field: &FieldPath) -> Option<&StepDefinition> {
        self.steps
            .iter()
            .find(|s| s.signature_field.as_ref() == Some(field))
    }

    /// Top-level keys of `section` that hold a signature stamp.
    pub fn signature_keys(&self, section: &SectionName) -> BTreeSet<&str> {
        self.steps
            .iter()
            .filter_map(|s| s.signature_field.as_ref())
            .filter(|f| &f.section() == section)
            .filter_map(|f| f.field_segments().first().map(String::as_str))
            .collect()
    }

    fn return_rule(&self, from_step: StepNumber) -> Option<&ReturnRule> {
        self.return_rules.iter().find(|r| r.from_step == from_step)
    }

    /// Roles allowed to return a case sitting on `current`.
    ///
    /// A configured rule wins; otherwise the required roles of the current
    /// step and every later step.
    pub fn return_authorized_roles(&self, current: StepNumber) -> BTreeSet<RoleId> {
        match self.return_rule(current) {
            Some(rule) => rule.roles.clone(),
            None => self
                .steps
                .iter()
                .filter(|s| s.step_number >= current)
                .map(|s| s.required_role.clone())
                .collect(),
        }
    }

    /// Valid return destinations from `current`, ascending.
    pub fn return_targets(&self, current: StepNumber) -> Vec<StepNumber> {
        match self.return_rule(current).and_then(|r| r.targets.as_ref()) {
            Some(targets) => {
                let mut targets: Vec<StepNumber> = targets
                    .iter()
                    .copied()
                    .filter(|t| *t >= 1 && *t < current)
                    .collect();
                targets.sort_unstable();
                targets.dedup();
                targets
            }
            None => (1..current).collect(),
        }
    }

    /// Sections without a visibility rule are visible to everyone.
    pub fn is_section_visible(&self, section: &SectionName, roles: &BTreeSet<RoleId>) -> bool {
        match self.section_visibility.iter().find(|v| &v.section == section) {
            Some(rule) => !rule.roles.is_disjoint(roles),
            None => true,
        }
    }

    /// Every section named by a step or a visibility rule, sorted.
    pub fn sections(&self) -> BTreeSet<SectionName> {
        self.steps
            .iter()
            .map(|s| s.target_section.clone())
            .chain(self.section_visibility.iter().map(|v| v.section.clone()))
            .collect()
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Check the template's structural rules.
    pub fn validate(&self) -> SignoffResult<()> {
        let invalid = |msg: String| SignoffError::InvalidTemplate(format!("{}: {}", self.id, msg));

        if self.id.0.trim().is_empty() {
            return Err(SignoffError::InvalidTemplate("template id is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(invalid("template must have at least one step".into()));
        }

        let mut signature_fields = HashSet::new();
        for (idx, step) in self.steps.iter().enumerate() {
            let expected = idx as StepNumber + 1;
            if step.step_number != expected {
                return Err(invalid(format!(
                    "step numbers must run 1..={} without gaps; found {} at position {}",
                    self.steps.len(),
                    step.step_number,
                    expected
                )));
            }
            if step.required_role.0.trim().is_empty() {
                return Err(invalid(format!("step {} has no required role", expected)));
            }
            if step.action.trim().is_empty() {
                return Err(invalid(format!("step {} has no action", expected)));
            }
            if step.target_section.0.trim().is_empty() {
                return Err(invalid(format!("step {} has no target section", expected)));
            }
            if let Some(field) = &step.signature_field {
                if field.depth() < 2 {
                    return Err(invalid(format!(
                        "signature field '{}' of step {} names a whole section",
                        field, expected
                    )));
                }
                if !signature_fields.insert(field) {
                    return Err(invalid(format!(
                        "signature field '{}' is declared by more than one step",
                        field
                    )));
                }
            }
        }

        let mut ruled = HashSet::new();
        for rule in &self.return_rules {
            if self.step(rule.from_step).is_none() {
                return Err(invalid(format!(
                    "return rule refers to unknown step {}",
                    rule.from_step
                )));
            }
            if !ruled.insert(rule.from_step) {
                return Err(invalid(format!(
                    "more than one return rule for step {}",
                    rule.from_step
                )));
            }
            if let Some(targets) = &rule.targets {
                if let Some(bad) = targets.iter().find(|t| **t < 1 || **t >= rule.from_step) {
                    return Err(invalid(format!(
                        "return rule for step {} lists target {} which is not an earlier step",
                        rule.from_step, bad
                    )));
                }
            }
        }

        Ok(())
    }
}
