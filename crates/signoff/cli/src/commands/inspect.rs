//! Signature image inspection

use crate::error::{CliError, CliResult};
use crate::output::{print_error, print_success, render_value, OutputFormat};
use serde::Serialize;
use signoff_engine::{EngineConfig, SignatureLimits};
use signoff_types::{ContentHash, ImageFormat};
use std::path::Path;

/// What the engine would make of an image
#[derive(Debug, Serialize)]
pub struct InspectionReport {
    pub file: String,
    pub format: Option<ImageFormat>,
    pub mime_type: Option<&'static str>,
    pub size_bytes: usize,
    pub content_hash: ContentHash,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
}

pub fn inspect(file: &Path, bytes: &[u8], limits: &SignatureLimits) -> InspectionReport {
    let format = ImageFormat::detect(bytes);
    let verdict = limits.check(bytes);
    InspectionReport {
        file: file.display().to_string(),
        format,
        mime_type: format.map(|f| f.mime_type()),
        size_bytes: bytes.len(),
        content_hash: ContentHash::hash(bytes),
        accepted: verdict.is_ok(),
        rejection: verdict.err().map(|e| e.to_string()),
    }
}

/// Report whether `file` would be accepted as a signature image.
pub fn execute(file: &Path, config: Option<&Path>, format: OutputFormat) -> CliResult<()> {
    let limits = SignatureLimits::from_config(&EngineConfig::load(config)?);
    let bytes = std::fs::read(file)?;
    let report = inspect(file, &bytes, &limits);

    println!("{}", render_value(&report, format));
    match &report.rejection {
        None => {
            print_success("accepted as a signature image");
            Ok(())
        }
        Some(reason) => {
            print_error(reason);
            Err(CliError::InvalidInput(reason.clone()))
        }
    }
}
