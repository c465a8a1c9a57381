//! Resolved capabilities of one user on one case

use crate::{CaseState, SectionName, StepNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The action the user is expected to take next
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    pub step_number: StepNumber,
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// What a user may do on a case right now
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub editable_sections: BTreeSet<SectionName>,
    /// Field restriction inside the editable section; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editable_fields: Vec<String>,
    pub visible_sections: BTreeSet<SectionName>,
    pub can_approve: bool,
    pub can_return: bool,
    pub return_targets: Vec<StepNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<NextAction>,
}

impl Permissions {
    /// No capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn can_act(&self) -> bool {
        self.can_approve || !self.editable_sections.is_empty()
    }
}

/// A case snapshot together with the caller's resolved permissions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseView {
    pub state: CaseState,
    pub permissions: Permissions,
}
