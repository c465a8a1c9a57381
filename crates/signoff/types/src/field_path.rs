//! Validated dot-delimited paths into a case's section data
//!
//! A `FieldPath` addresses one field of the case document, e.g.
//! `legalDeputyReport.headOfContractsSignature`. The first segment is
//! always the section name. Paths are parsed and checked once; they are
//! never assembled by string concatenation downstream.

use crate::{SectionName, SignoffError, SignoffResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of segments in a field path
pub const MAX_PATH_SEGMENTS: usize = 8;

/// Maximum length of a single segment
pub const MAX_SEGMENT_LEN: usize = 64;

/// A bounded, validated list of field identifiers
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dot-delimited path.
    pub fn parse(raw: &str) -> SignoffResult<Self> {
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        Self::from_segments(segments).map_err(|reason| {
            SignoffError::InvalidFieldPath(format!("'{}': {}", raw, reason))
        })
    }

    fn from_segments(segments: Vec<String>) -> Result<Self, String> {
        if segments.is_empty() {
            return Err("path is empty".into());
        }
        if segments.len() > MAX_PATH_SEGMENTS {
            return Err(format!(
                "{} segments exceeds the limit of {}",
                segments.len(),
                MAX_PATH_SEGMENTS
            ));
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err("empty segment".into());
            }
            if segment.len() > MAX_SEGMENT_LEN {
                return Err(format!("segment '{}' is too long", segment));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(format!("segment '{}' has invalid characters", segment));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The section this path points into.
    pub fn section(&self) -> SectionName {
        SectionName::new(self.segments[0].clone())
    }

    /// Segments below the section, empty when the path names a whole section.
    pub fn field_segments(&self) -> &[String] {
        &self.segments[1..]
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({})", self)
    }
}

impl FromStr for FieldPath {
    type Err = SignoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}
