//! Configuration check

use crate::error::CliResult;
use crate::output::{print_success, render_rows, OutputFormat};
use serde::Serialize;
use signoff_engine::ApprovalService;
use signoff_types::WorkflowTemplate;
use std::path::Path;
use tabled::Tabled;

/// Table row for template summaries
#[derive(Debug, Serialize, Tabled)]
pub struct TemplateRow {
    id: String,
    name: String,
    steps: u32,
    signed_steps: usize,
    return_rules: usize,
    sections: usize,
}

impl From<&WorkflowTemplate> for TemplateRow {
    fn from(template: &WorkflowTemplate) -> Self {
        Self {
            id: template.id.to_string(),
            name: template.name.clone(),
            steps: template.step_count(),
            signed_steps: template.steps.iter().filter(|s| s.requires_signature()).count(),
            return_rules: template.return_rules.len(),
            sections: template.sections().len(),
        }
    }
}

/// Load and validate a configuration file, then summarize its templates.
pub fn execute(config: &Path, format: OutputFormat) -> CliResult<()> {
    let service = ApprovalService::from_config_file(config)?;
    let rows: Vec<TemplateRow> = service
        .templates()
        .iter()
        .map(|t| TemplateRow::from(t.as_ref()))
        .collect();

    println!("{}", render_rows(&rows, format));
    if format == OutputFormat::Table {
        print_success(&format!(
            "{} is valid ({} templates)",
            config.display(),
            rows.len()
        ));
    }
    Ok(())
}
