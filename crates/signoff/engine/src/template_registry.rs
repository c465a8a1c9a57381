//! Template registry: stores workflow templates by id
//!
//! Templates are validated on registration and never change afterwards.
//! The registry is built once at startup and then shared read-only.

use signoff_types::{SignoffError, SignoffResult, TemplateId, WorkflowTemplate};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of workflow templates
#[derive(Clone, Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, Arc<WorkflowTemplate>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of templates, rejecting duplicates.
    pub fn from_templates(
        templates: impl IntoIterator<Item = WorkflowTemplate>,
    ) -> SignoffResult<Self> {
        let mut registry = Self::new();
        for template in templates {
            registry.register(template)?;
        }
        Ok(registry)
    }

    /// Register a template
    ///
    /// Validates the template before storing. Returns its id.
    pub fn register(&mut self, template: WorkflowTemplate) -> SignoffResult<TemplateId> {
        template.validate()?;

        let id = template.id.clone();
        if self.templates.contains_key(&id) {
            return Err(SignoffError::InvalidTemplate(format!(
                "template {} is already registered",
                id
            )));
        }

        tracing::info!(
            template_id = %id,
            steps = template.step_count(),
            "Workflow template registered"
        );
        self.templates.insert(id.clone(), Arc::new(template));
        Ok(id)
    }

    pub fn get(&self, id: &TemplateId) -> SignoffResult<Arc<WorkflowTemplate>> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| SignoffError::TemplateNotFound(id.clone()))
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.contains_key(id)
    }

    /// All templates, sorted by id
    pub fn list(&self) -> Vec<Arc<WorkflowTemplate>> {
        let mut all: Vec<_> = self.templates.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        all
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}
