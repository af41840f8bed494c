//! # tnr-state: Name-Reservation Workflow Engine
//!
//! The request lifecycle and everything that guards it:
//!
//! - [`request`]: the `Request` entity, its closed 14-state status enum, and
//!   the append-only action history.
//! - [`naming`]: name canonicalization and the two-phase collision check.
//! - [`fee`]: fee quoting and the invoice sub-lifecycle.
//! - [`claim`]: exclusive audit and IP review claims.
//! - [`workflow`]: the transition table, guards, and the engine itself.
//! - [`effects`]: post-commit side-effect intents.
//!
//! This crate performs no I/O. Operations return the next version of a
//! request plus the effects to dispatch; the caller decides how to commit.

pub mod claim;
pub mod effects;
pub mod error;
pub mod fee;
pub mod naming;
pub mod request;
pub mod workflow;

pub use claim::{Claim, ClaimTrack};
pub use effects::{AuditEntry, Notification, NotificationTarget, SideEffect};
pub use error::{ErrorKind, WorkflowError};
pub use fee::{FeeRule, FeeRuleSource, FeeSchedule, Invoice, InvoiceNumber};
pub use naming::{CandidateSource, CollisionReport, NameMatch, NameNormalizer};
pub use request::{
    ActionKind, ChecklistFlag, IpReport, IpVerdict, PurposeSelection, RegistryEntry, Request,
    RequestAction, RequestStatus, RequestSummary,
};
pub use workflow::{Committed, Outcome, RequestDraft, TransitionRule, WorkflowEngine, TRANSITIONS};
