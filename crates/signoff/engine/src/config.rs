//! Engine configuration
//!
//! Loaded once at startup from TOML or YAML (chosen by file extension).
//! Carries the signature upload limits and the workflow templates.

use serde::{Deserialize, Serialize};
use signoff_types::{ImageFormat, SignoffError, SignoffResult, WorkflowTemplate};
use std::collections::HashSet;
use std::path::Path;

/// Reference upload ceiling for signature images (2 MiB)
pub const DEFAULT_MAX_SIGNATURE_BYTES: usize = 2 * 1024 * 1024;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest accepted signature image, in bytes
    #[serde(default = "default_max_signature_bytes")]
    pub max_signature_bytes: usize,

    /// Raster formats accepted for signature images
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: Vec<ImageFormat>,

    /// Workflow templates
    #[serde(default)]
    pub templates: Vec<WorkflowTemplate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_signature_bytes: default_max_signature_bytes(),
            allowed_formats: default_allowed_formats(),
            templates: Vec::new(),
        }
    }
}

const fn default_max_signature_bytes() -> usize {
    DEFAULT_MAX_SIGNATURE_BYTES
}

fn default_allowed_formats() -> Vec<ImageFormat> {
    vec![ImageFormat::Png, ImageFormat::Jpeg]
}

/// Supported configuration encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> SignoffResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            other => Err(SignoffError::Config(format!(
                "unsupported config extension {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

impl EngineConfig {
    pub fn with_template(mut self, template: WorkflowTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_max_signature_bytes(mut self, bytes: usize) -> Self {
        self.max_signature_bytes = bytes;
        self
    }

    /// Load configuration, falling back to defaults when no file is given
    /// or the file does not exist.
    pub fn load(path: Option<&Path>) -> SignoffResult<Self> {
        match path {
            Some(p) if p.exists() => Self::from_path(p),
            Some(p) => {
                tracing::warn!(path = %p.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Read and validate a configuration file.
    pub fn from_path(path: &Path) -> SignoffResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SignoffError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&contents, format)?;
        tracing::info!(
            path = %path.display(),
            templates = config.templates.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str, format: ConfigFormat) -> SignoffResult<Self> {
        let config: EngineConfig = match format {
            ConfigFormat::Toml => {
                toml::from_str(contents).map_err(|e| SignoffError::Config(e.to_string()))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(contents).map_err(|e| SignoffError::Config(e.to_string()))?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SignoffResult<()> {
        if self.max_signature_bytes == 0 {
            return Err(SignoffError::Config(
                "max_signature_bytes must be positive".into(),
            ));
        }
        if self.allowed_formats.is_empty() {
            return Err(SignoffError::Config(
                "allowed_formats must list at least one format".into(),
            ));
        }

        let mut ids = HashSet::new();
        for template in &self.templates {
            template.validate()?;
            if !ids.insert(&template.id) {
                return Err(SignoffError::InvalidTemplate(format!(
                    "duplicate template id {}",
                    template.id
                )));
            }
        }
        Ok(())
    }
}
