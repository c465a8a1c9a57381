//! Sign-off engine
//!
//! Moves cases through an ordered list of role-gated steps, binds
//! registered signature images to case fields and records every change
//! in a hash-linked audit trail.
//!
//! # Architecture
//!
//! The [`ApprovalService`] composes specialized components:
//!
//! - [`TemplateRegistry`]: immutable step tables loaded from [`EngineConfig`]
//! - [`StepEngine`]: opens cases, completes and returns steps
//! - [`StateMachine`]: the pure transition rules
//! - [`PermissionResolver`]: what a user may do on a case right now
//! - [`SignatureStore`] and [`SignatureBinder`]: signature images and their bindings
//! - [`AuditTrail`]: append-only history with chain verification and replay
//!
//! All case mutations are serialized per case by the [`CaseStore`]; an
//! optional expected version turns stale writes into `Conflict` errors.
//!
//! # Example
//!
//! ```rust
//! use signoff_engine::{ApprovalService, CompleteStep, EngineConfig};
//! use signoff_types::*;
//!
//! let config = EngineConfig::default().with_template(
//!     WorkflowTemplate::new("memo", "Memo")
//!         .with_step(StepDefinition::new(1, "AUTHOR", "write", "memo"))
//!         .with_step(StepDefinition::new(2, "HEAD", "approve", "memo")),
//! );
//! let service = ApprovalService::new(&config).unwrap();
//!
//! let case = service
//!     .open_case(&TemplateId::new("memo"), &UserId::new("alice"))
//!     .unwrap();
//! let state = service
//!     .complete_step(CompleteStep::new(case.case_id.clone(), 1, "alice", "AUTHOR"))
//!     .unwrap();
//!
//! assert_eq!(state.position, CasePosition::Step(2));
//! ```

#![deny(unsafe_code)]

pub mod audit_trail;
pub mod blob_store;
pub mod case_store;
pub mod config;
pub mod permission_resolver;
pub mod service;
pub mod signature_binder;
pub mod signature_store;
pub mod state_machine;
pub mod step_engine;
pub mod template_registry;

pub use audit_trail::{AuditTrail, ReplayedCase};
pub use blob_store::{BlobStore, InMemoryBlobStore};
pub use case_store::CaseStore;
pub use config::{ConfigFormat, EngineConfig, DEFAULT_MAX_SIGNATURE_BYTES};
pub use permission_resolver::PermissionResolver;
pub use service::ApprovalService;
pub use signature_binder::{BindSignature, SignatureBinder};
pub use signature_store::{SignatureLimits, SignatureStore};
pub use state_machine::{CompletionOutcome, StateMachine};
pub use step_engine::{CompleteStep, ReturnToStep, StepEngine};
pub use template_registry::TemplateRegistry;
