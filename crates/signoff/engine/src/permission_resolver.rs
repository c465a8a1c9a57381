//! Permission resolver: what a user may do on a case right now
//!
//! Derived from the template and the case snapshot alone. Resolution never
//! fails; anything it cannot make sense of yields no permissions.

use crate::TemplateRegistry;
use signoff_types::{
    CasePosition, CaseState, NextAction, Permissions, RoleId, WorkflowTemplate,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Resolves per-user permissions against the registered templates
#[derive(Clone, Debug)]
pub struct PermissionResolver {
    templates: Arc<TemplateRegistry>,
}

impl PermissionResolver {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self { templates }
    }

    /// Resolve permissions for a user holding `roles`.
    pub fn resolve(&self, state: &CaseState, roles: &BTreeSet<RoleId>) -> Permissions {
        match self.templates.get(&state.template_id) {
            Ok(template) => Self::resolve_with(&template, state, roles),
            Err(e) => {
                tracing::debug!(case_id = %state.case_id, error = %e, "No template, no permissions");
                Permissions::none()
            }
        }
    }

    /// Resolve against an explicit template.
    pub fn resolve_with(
        template: &WorkflowTemplate,
        state: &CaseState,
        roles: &BTreeSet<RoleId>,
    ) -> Permissions {
        let visible_sections = template
            .sections()
            .into_iter()
            .filter(|s| template.is_section_visible(s, roles))
            .collect();

        let current = match state.position {
            CasePosition::Step(n) => n,
            CasePosition::Done => {
                return Permissions {
                    visible_sections,
                    ..Permissions::none()
                }
            }
        };
        let Some(step) = template.step(current) else {
            return Permissions::none();
        };

        let holds_role = roles.contains(&step.required_role);

        let editable_sections = template
            .steps
            .iter()
            .filter(|s| s.step_number == current && roles.contains(&s.required_role))
            .map(|s| s.target_section.clone())
            .collect();

        let signed = match &step.signature_field {
            Some(field) => state
                .binding_for_attempt(field, current, state.attempt(current))
                .is_some(),
            None => true,
        };

        let can_return = !template.return_authorized_roles(current).is_disjoint(roles);

        Permissions {
            editable_sections,
            editable_fields: if holds_role {
                step.editable_fields.clone()
            } else {
                Vec::new()
            },
            visible_sections,
            can_approve: holds_role && signed,
            can_return,
            return_targets: template.return_targets(current),
            next_action: holds_role.then(|| NextAction {
                step_number: current,
                action: step.action.clone(),
                description: step.description.clone(),
            }),
        }
    }
}
