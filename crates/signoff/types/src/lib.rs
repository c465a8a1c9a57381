//! Sign-off Domain Types
//!
//! A **case** is a document that moves through a fixed, ordered list of
//! **steps**. Each step is gated by a single role, writes to one section of
//! the document and may require a signature bound to one field.
//!
//! # Key Concepts
//!
//! - **WorkflowTemplate**: the immutable step table (plus visibility and
//!   return rules) loaded once from configuration.
//! - **CaseState**: the live state of one case: position, completions,
//!   section data, signature bindings and an optimistic version.
//! - **SignatureRecord**: a user's registered signature image.
//! - **SignatureBinding**: a signature applied to one field of one case at
//!   one instant, carrying its own integrity hash.
//! - **AuditRecord**: a hash-linked entry of the append-only audit trail.
//!
//! # Invariants
//!
//! 1. A case always sits on the lowest step without a completion, or is
//!    `Done` when every step is complete.
//! 2. Completions are created once and only removed by an explicit return.
//! 3. Bindings are never deleted; re-signing appends a newer binding.

#![deny(unsafe_code)]

mod audit;
mod case;
mod definition;
mod errors;
mod field_path;
mod hash;
mod ids;
mod permissions;
mod signature;

pub use audit::*;
pub use case::*;
pub use definition::*;
pub use errors::*;
pub use field_path::*;
pub use hash::*;
pub use ids::*;
pub use permissions::*;
pub use signature::*;
