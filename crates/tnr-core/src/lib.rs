//! # tnr-core: Foundational Types for the Trade Name Registry
//!
//! Every other crate in the workspace depends on `tnr-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `RequestId`, `UserId`,
//!    `ProvinceId`, `CompanyTypeId` are distinct types. You cannot pass a
//!    province where a request is expected.
//!
//! 2. **Explicit actor context.** Authorization facts travel as an
//!    [`ActorContext`] parameter. Nothing in the workflow reads a
//!    "current user" from ambient state.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] is always UTC, millisecond
//!    precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `tnr-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod actor;
pub mod error;
pub mod identity;
pub mod temporal;

pub use actor::{ActorContext, Capability, Role};
pub use error::ValidationError;
pub use identity::{
    ArtifactRef, ChecklistItemId, CompanyTypeId, ProvinceId, PurposeId, RequestId, UserId,
};
pub use temporal::Timestamp;
