//! Template inspection

use crate::error::{CliError, CliResult};
use crate::output::{render_rows, OutputFormat};
use serde::Serialize;
use signoff_engine::EngineConfig;
use signoff_types::{StepDefinition, WorkflowTemplate};
use std::path::Path;
use tabled::Tabled;

/// Table row for one step of a template
#[derive(Debug, Serialize, Tabled)]
pub struct StepRow {
    step: u32,
    role: String,
    action: String,
    section: String,
    signature: String,
    editable: String,
    returns_to: String,
    may_return: String,
}

impl StepRow {
    pub fn new(template: &WorkflowTemplate, step: &StepDefinition) -> Self {
        let n = step.step_number;
        Self {
            step: n,
            role: step.required_role.to_string(),
            action: step.action.clone(),
            section: step.target_section.to_string(),
            signature: step
                .signature_field
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "-".into()),
            editable: or_dash(step.editable_fields.join(", ")),
            returns_to: or_dash(
                template
                    .return_targets(n)
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            may_return: or_dash(
                template
                    .return_authorized_roles(n)
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        }
    }
}

fn or_dash(s: String) -> String {
    if s.is_empty() {
        "-".into()
    } else {
        s
    }
}

/// Rows describing every step of a template in `config`.
pub fn step_rows(config: &EngineConfig, template_id: &str) -> CliResult<Vec<StepRow>> {
    let template = config
        .templates
        .iter()
        .find(|t| t.id.0 == template_id)
        .ok_or_else(|| CliError::NotFound(format!("template '{}'", template_id)))?;
    Ok(template
        .steps
        .iter()
        .map(|s| StepRow::new(template, s))
        .collect())
}

/// Print a template's step table and return policy.
pub fn execute(config: &Path, template_id: &str, format: OutputFormat) -> CliResult<()> {
    let config = EngineConfig::from_path(config)?;
    let rows = step_rows(&config, template_id)?;
    println!("{}", render_rows(&rows, format));
    Ok(())
}
