//! Audit trail: the append-only, hash-linked history of the engine
//!
//! Every committed transition and every signature event is appended here.
//! Each record carries the hash of its predecessor, so any in-place edit
//! breaks the chain. Replaying a case's records reproduces its completed
//! steps and position.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use signoff_types::{
    AuditEvent, AuditRecord, BindingId, CaseId, CasePosition, ContentHash, RoleId,
    SignatureBinding, SignoffError, SignoffResult, StepNumber, TemplateId, UserId,
};
use std::collections::BTreeSet;
use std::sync::RwLock;

/// Append-only audit log
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
}

/// Case progress reconstructed from the audit trail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedCase {
    pub case_id: CaseId,
    pub completed_steps: BTreeSet<StepNumber>,
    pub position: CasePosition,
    /// Number of case records replayed
    pub events: usize,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an exported trail, e.g. for offline verification.
    pub fn from_records(records: Vec<AuditRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Append a record, linking it to the current head.
    pub fn append(
        &self,
        case_id: Option<&CaseId>,
        actor: &UserId,
        event: AuditEvent,
        message: impl Into<String>,
    ) -> SignoffResult<AuditRecord> {
        let mut guard = self
            .records
            .write()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;

        let mut record = AuditRecord {
            sequence: guard.len() as u64 + 1,
            case_id: case_id.cloned(),
            actor: actor.clone(),
            event,
            message: message.into(),
            recorded_at: Utc::now(),
            previous_hash: guard.last().map(|r| r.hash),
            hash: ContentHash::from_bytes([0; 32]),
        };
        record.hash = compute_record_hash(&record)?;

        tracing::trace!(
            sequence = record.sequence,
            event = %record.event,
            actor = %record.actor,
            "Audit recorded"
        );
        guard.push(record.clone());
        Ok(record)
    }

    // ── Typed recorders ──────────────────────────────────────────────

    pub fn record_case_opened(
        &self,
        case_id: &CaseId,
        template_id: &TemplateId,
        actor: &UserId,
    ) -> SignoffResult<AuditRecord> {
        self.append(
            Some(case_id),
            actor,
            AuditEvent::CaseOpened {
                template_id: template_id.clone(),
            },
            format!("Case opened from template '{}'", template_id),
        )
    }

    pub fn record_step_completed(
        &self,
        case_id: &CaseId,
        step_number: StepNumber,
        role: &RoleId,
        actor: &UserId,
        binding_id: Option<&BindingId>,
    ) -> SignoffResult<AuditRecord> {
        self.append(
            Some(case_id),
            actor,
            AuditEvent::StepCompleted {
                step_number,
                role: role.clone(),
                binding_id: binding_id.cloned(),
            },
            format!("Step {} completed as {}", step_number, role),
        )
    }

    pub fn record_case_returned(
        &self,
        case_id: &CaseId,
        from_step: StepNumber,
        to_step: StepNumber,
        role: &RoleId,
        actor: &UserId,
        reason: &str,
    ) -> SignoffResult<AuditRecord> {
        self.append(
            Some(case_id),
            actor,
            AuditEvent::CaseReturned {
                from_step,
                to_step,
                role: role.clone(),
                reason: reason.to_string(),
            },
            format!("Returned from step {} to step {}", from_step, to_step),
        )
    }

    pub fn record_case_completed(
        &self,
        case_id: &CaseId,
        actor: &UserId,
    ) -> SignoffResult<AuditRecord> {
        self.append(
            Some(case_id),
            actor,
            AuditEvent::CaseCompleted,
            "All steps completed",
        )
    }

    pub fn record_signature_registered(
        &self,
        owner: &UserId,
        content_hash: ContentHash,
    ) -> SignoffResult<AuditRecord> {
        self.append(
            None,
            owner,
            AuditEvent::SignatureRegistered { content_hash },
            "Signature registered",
        )
    }

    pub fn record_signature_deleted(&self, owner: &UserId) -> SignoffResult<AuditRecord> {
        self.append(
            None,
            owner,
            AuditEvent::SignatureDeleted,
            "Signature deleted",
        )
    }

    pub fn record_signature_bound(&self, binding: &SignatureBinding) -> SignoffResult<AuditRecord> {
        self.append(
            Some(&binding.case_id),
            &binding.signer,
            AuditEvent::SignatureBound {
                binding_id: binding.binding_id.clone(),
                field_path: binding.field_path.clone(),
                step_number: binding.step_number,
                attempt: binding.attempt,
                binding_hash: binding.binding_hash,
            },
            format!("Signature bound to '{}'", binding.field_path),
        )
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Records of one case, in append order
    pub fn events_for(&self, case_id: &CaseId) -> SignoffResult<Vec<AuditRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;
        Ok(guard
            .iter()
            .filter(|r| r.involves_case(case_id))
            .cloned()
            .collect())
    }

    /// Signature registrations and deletions of one user
    pub fn signature_events_for(&self, owner: &UserId) -> SignoffResult<Vec<AuditRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;
        Ok(guard
            .iter()
            .filter(|r| r.case_id.is_none() && &r.actor == owner)
            .cloned()
            .collect())
    }

    /// Every record, in append order
    pub fn records(&self) -> SignoffResult<Vec<AuditRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;
        Ok(guard.clone())
    }

    pub fn len(&self) -> SignoffResult<usize> {
        self.records
            .read()
            .map(|g| g.len())
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))
    }

    pub fn is_empty(&self) -> SignoffResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn latest_hash(&self) -> SignoffResult<Option<ContentHash>> {
        let guard = self
            .records
            .read()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;
        Ok(guard.last().map(|r| r.hash))
    }

    // ── Verification ─────────────────────────────────────────────────

    /// Sequence number of the first record whose link or hash is wrong.
    pub fn first_broken_link(&self) -> SignoffResult<Option<u64>> {
        let guard = self
            .records
            .read()
            .map_err(|_| SignoffError::LockPoisoned("audit trail".into()))?;

        let mut previous: Option<ContentHash> = None;
        for (idx, record) in guard.iter().enumerate() {
            let intact = record.sequence == idx as u64 + 1
                && record.previous_hash == previous
                && compute_record_hash(record)? == record.hash;
            if !intact {
                tracing::warn!(sequence = record.sequence, "Audit chain broken");
                return Ok(Some(record.sequence));
            }
            previous = Some(record.hash);
        }
        Ok(None)
    }

    /// Whether every record is intact and correctly linked.
    pub fn verify_chain(&self) -> SignoffResult<bool> {
        Ok(self.first_broken_link()?.is_none())
    }

    /// Rebuild a case's completed steps and position from its records.
    pub fn replay(&self, case_id: &CaseId, total_steps: StepNumber) -> SignoffResult<ReplayedCase> {
        let events = self.events_for(case_id)?;
        let mut completed = BTreeSet::new();

        for record in &events {
            match &record.event {
                AuditEvent::CaseOpened { .. } => completed.clear(),
                AuditEvent::StepCompleted { step_number, .. } => {
                    completed.insert(*step_number);
                }
                AuditEvent::CaseReturned { to_step, .. } => {
                    completed.retain(|n| n < to_step);
                }
                _ => {}
            }
        }

        let position = (1..=total_steps)
            .find(|n| !completed.contains(n))
            .map(CasePosition::Step)
            .unwrap_or(CasePosition::Done);

        Ok(ReplayedCase {
            case_id: case_id.clone(),
            completed_steps: completed,
            position,
            events: events.len(),
        })
    }
}

fn compute_record_hash(record: &AuditRecord) -> SignoffResult<ContentHash> {
    let serializable = serde_json::json!({
        "previous_hash": record.previous_hash,
        "sequence": record.sequence,
        "case_id": record.case_id,
        "actor": record.actor,
        "event": record.event,
        "message": record.message,
        "recorded_at": record.recorded_at,
    });
    let serialized =
        serde_json::to_vec(&serializable).map_err(|e| SignoffError::Serialization(e.to_string()))?;
    Ok(ContentHash::hash(&serialized))
}
