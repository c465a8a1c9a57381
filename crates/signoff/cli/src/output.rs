//! Output formatting utilities

use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Render a list of rows in the given format
pub fn render_rows<T: Serialize + Tabled>(rows: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table if rows.is_empty() => "No results".dimmed().to_string(),
        OutputFormat::Table => Table::new(rows).to_string(),
        OutputFormat::Json | OutputFormat::Yaml => render_value(&rows, format),
    }
}

/// Render a single value; tables fall back to JSON
pub fn render_value<T: Serialize + ?Sized>(data: &T, format: OutputFormat) -> String {
    let rendered = match format {
        OutputFormat::Table | OutputFormat::Json => {
            serde_json::to_string_pretty(data).map_err(|e| e.to_string())
        }
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
    };
    rendered.unwrap_or_else(|e| format!("<unrenderable: {}>", e))
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
