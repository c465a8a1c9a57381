//! Case storage with per-case serialized mutation
//!
//! Every mutation of a case runs inside [`CaseStore::mutate`], which holds
//! the case's map entry for the whole check-then-write sequence. The
//! closure works on a copy; the copy replaces the stored state only when
//! the closure succeeds, so a failed command leaves no trace.

use chrono::Utc;
use dashmap::DashMap;
use signoff_types::{CaseId, CaseState, SignoffError, SignoffResult};

/// In-memory case store
#[derive(Debug, Default)]
pub struct CaseStore {
    cases: DashMap<CaseId, CaseState>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly opened case.
    pub fn insert(&self, state: CaseState) -> SignoffResult<()> {
        let case_id = state.case_id.clone();
        match self.cases.entry(case_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(SignoffError::Conflict {
                case_id,
                expected: 0,
                actual: state.version,
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(state);
                Ok(())
            }
        }
    }

    /// A consistent copy of the case.
    pub fn snapshot(&self, case_id: &CaseId) -> SignoffResult<CaseState> {
        self.cases
            .get(case_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SignoffError::CaseNotFound(case_id.clone()))
    }

    pub fn contains(&self, case_id: &CaseId) -> bool {
        self.cases.contains_key(case_id)
    }

    /// Copies of all cases, oldest first.
    pub fn list(&self) -> Vec<CaseState> {
        let mut all: Vec<CaseState> = self.cases.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.case_id.0.cmp(&b.case_id.0))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Apply `f` to a case atomically.
    ///
    /// The version check happens first: if `expected_version` is given and
    /// differs from the stored one the call fails with `Conflict` without
    /// running `f`. The working copy handed to `f` already carries the next
    /// version and update time. Returns `f`'s output and the committed state.
    pub fn mutate<T, F>(
        &self,
        case_id: &CaseId,
        expected_version: Option<u64>,
        f: F,
    ) -> SignoffResult<(T, CaseState)>
    where
        F: FnOnce(&mut CaseState) -> SignoffResult<T>,
    {
        let mut entry = self
            .cases
            .get_mut(case_id)
            .ok_or_else(|| SignoffError::CaseNotFound(case_id.clone()))?;

        if let Some(expected) = expected_version {
            if entry.version != expected {
                return Err(SignoffError::Conflict {
                    case_id: case_id.clone(),
                    expected,
                    actual: entry.version,
                });
            }
        }

        let mut working = entry.value().clone();
        working.version = entry.version + 1;
        working.updated_at = Utc::now();

        let output = f(&mut working)?;
        *entry = working.clone();
        Ok((output, working))
    }
}
