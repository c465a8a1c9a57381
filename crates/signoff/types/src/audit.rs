//! Audit records: the append-only history of every transition and signature event

use crate::{
    BindingId, CaseId, ContentHash, FieldPath, RoleId, StepNumber, TemplateId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    CaseOpened {
        template_id: TemplateId,
    },
    StepCompleted {
        step_number: StepNumber,
        role: RoleId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        binding_id: Option<BindingId>,
    },
    CaseReturned {
        from_step: StepNumber,
        to_step: StepNumber,
        role: RoleId,
        reason: String,
    },
    CaseCompleted,
    SignatureRegistered {
        content_hash: ContentHash,
    },
    SignatureDeleted,
    SignatureBound {
        binding_id: BindingId,
        field_path: FieldPath,
        step_number: StepNumber,
        attempt: u32,
        binding_hash: ContentHash,
    },
}

impl AuditEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CaseOpened { .. } => "case_opened",
            Self::StepCompleted { .. } => "step_completed",
            Self::CaseReturned { .. } => "case_returned",
            Self::CaseCompleted => "case_completed",
            Self::SignatureRegistered { .. } => "signature_registered",
            Self::SignatureDeleted => "signature_deleted",
            Self::SignatureBound { .. } => "signature_bound",
        }
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A stored, hash-linked audit entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 1-based position in the trail
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    pub actor: UserId,
    pub event: AuditEvent,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<ContentHash>,
    pub hash: ContentHash,
}

impl AuditRecord {
    pub fn involves_case(&self, case_id: &CaseId) -> bool {
        self.case_id.as_ref() == Some(case_id)
    }
}
