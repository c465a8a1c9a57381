//! Error types for the sign-off layer

use crate::{CaseId, CasePosition, FieldPath, RoleId, StepNumber, TemplateId, UserId};
use serde::{Deserialize, Serialize};

/// Errors that can occur in sign-off operations
#[derive(Debug, thiserror::Error)]
pub enum SignoffError {
    #[error("Case not found: {0}")]
    CaseNotFound(CaseId),

    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("No signature binding for '{field_path}' in case {case_id}")]
    BindingNotFound {
        case_id: CaseId,
        field_path: FieldPath,
    },

    #[error("No signature registered for user {0}")]
    SignatureNotFound(UserId),

    #[error("Step {requested} is not the current step (case is at {current})")]
    InvalidStep {
        requested: StepNumber,
        current: CasePosition,
    },

    #[error("Cannot return to step {target} from {current}")]
    InvalidReturnTarget {
        target: StepNumber,
        current: CasePosition,
    },

    #[error("Role {actual} cannot act on step {step}; requires {required}")]
    RoleMismatch {
        step: StepNumber,
        required: RoleId,
        actual: RoleId,
    },

    #[error("Insufficient permission: {0}")]
    Forbidden(String),

    #[error("Field '{field}' is not editable in step {step}")]
    FieldNotEditable { step: StepNumber, field: String },

    #[error("Signature required on '{0}' before this step can be completed")]
    SignatureRequired(FieldPath),

    #[error("User {0} has no registered signature; register a signature first")]
    NoRegisteredSignature(UserId),

    #[error("Field '{0}' cannot be signed now")]
    FieldNotSignable(FieldPath),

    #[error("Stored signature of user {0} failed its integrity check")]
    SignatureCorrupted(UserId),

    #[error("Case {case_id} changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        case_id: CaseId,
        expected: u64,
        actual: u64,
    },

    #[error("Unsupported image format: {0}")]
    InvalidFormat(String),

    #[error("Image of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("Invalid field path {0}")]
    InvalidFieldPath(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Coarse classification used by callers to decide how to react
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The referenced case, template, binding or signature does not exist
    NotFound,
    /// The request does not match the case's current state
    InvalidState,
    /// The caller lacks the required role
    Unauthorized,
    /// A precondition must be satisfied first (e.g. register or bind a signature)
    Precondition,
    /// A concurrent mutation won; re-read and retry
    Conflict,
    /// The input itself is malformed
    InvalidInput,
    /// Internal failure
    Internal,
}

impl SignoffError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CaseNotFound(_)
            | Self::TemplateNotFound(_)
            | Self::BindingNotFound { .. }
            | Self::SignatureNotFound(_) => ErrorKind::NotFound,
            Self::InvalidStep { .. } | Self::InvalidReturnTarget { .. } => ErrorKind::InvalidState,
            Self::RoleMismatch { .. } | Self::Forbidden(_) | Self::FieldNotEditable { .. } => {
                ErrorKind::Unauthorized
            }
            Self::SignatureRequired(_)
            | Self::NoRegisteredSignature(_)
            | Self::FieldNotSignable(_)
            | Self::SignatureCorrupted(_) => ErrorKind::Precondition,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidFormat(_)
            | Self::TooLarge { .. }
            | Self::InvalidFieldPath(_)
            | Self::InvalidTemplate(_)
            | Self::Config(_) => ErrorKind::InvalidInput,
            Self::Serialization(_) | Self::LockPoisoned(_) => ErrorKind::Internal,
        }
    }

    /// Only concurrent-mutation conflicts are safe to retry automatically.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Result type alias for sign-off operations
pub type SignoffResult<T> = Result<T, SignoffError>;
