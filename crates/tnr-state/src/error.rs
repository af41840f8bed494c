//! # Workflow Errors
//!
//! Every rejected operation returns a typed error carrying a human-readable
//! reason. [`WorkflowError::kind`] classifies each variant into the coarse
//! taxonomy the HTTP layer maps onto status codes.

use thiserror::Error;
use tnr_core::{ProvinceId, RequestId, UserId, ValidationError};

use crate::claim::ClaimTrack;
use crate::fee::{FeeError, InvoiceNumber};
use crate::naming::{CollisionReport, ResolverError};
use crate::request::RequestStatus;

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input. Rejected before any write.
    Validation,
    /// Name collision, claim already held, invoice already paid, registry already set.
    Conflict,
    /// The caller lacks the role, capability, or claim for the operation.
    Forbidden,
    /// Unknown request.
    NotFound,
    /// Registry configuration blocks a legitimate submission.
    Misconfiguration,
    /// A collaborator the engine depends on could not be reached.
    Unavailable,
}

/// Errors raised by workflow, claim, and fee operations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Input validation failed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The request does not exist.
    #[error("{0} not found")]
    NotFound(RequestId),

    /// An equivalent name is already reserved or under review.
    #[error("name '{}' conflicts with {} existing request(s)", .0.name, .0.match_count)]
    NameConflict(Box<CollisionReport>),

    /// A fee-liable submission for a province with zero configured fee.
    #[error("no active fee is configured for {province_id}; fee-liable submissions are blocked")]
    FeeNotConfigured {
        /// Province with no payable fee.
        province_id: ProvinceId,
    },

    /// The claim track is held by another user.
    #[error("the {track} claim on {request_id} is already held by {holder}")]
    AlreadyClaimed {
        request_id: RequestId,
        track: ClaimTrack,
        holder: UserId,
    },

    /// The invoice was already paid under a different receipt.
    #[error("invoice {invoice} is already paid")]
    AlreadyPaid {
        request_id: RequestId,
        invoice: InvoiceNumber,
    },

    /// The registry number was already recorded.
    #[error("{request_id} is already finalized with registry number {number}")]
    AlreadyFinalized {
        request_id: RequestId,
        number: String,
    },

    /// The caller may not perform this operation.
    #[error("forbidden: {reason}")]
    Forbidden {
        /// Which rule blocked the caller.
        reason: String,
    },

    /// No transition from `from` to `to` is defined, or it must go through a
    /// dedicated operation.
    #[error("illegal transition from {from} to {to}: {reason}")]
    IllegalTransition {
        from: RequestStatus,
        to: RequestStatus,
        reason: String,
    },

    /// Ordinary audit decisions are locked while leadership review is active.
    #[error("the request is in leadership review ({status}); audit decisions are locked")]
    LeadershipLocked {
        /// The leadership-review status.
        status: RequestStatus,
    },

    /// A paid request must be referred to an IP expert before any decision.
    #[error("mandatory IP consultation: {request_id} is paid and no IP expert has been assigned")]
    IpConsultationRequired {
        request_id: RequestId,
    },

    /// Fee computation failed for a reason other than a zero fee.
    #[error("registry misconfiguration: {0}")]
    Misconfiguration(String),

    /// A collaborator data source failed.
    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),
}

impl WorkflowError {
    /// Classify into the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::NameConflict(_)
            | Self::AlreadyClaimed { .. }
            | Self::AlreadyPaid { .. }
            | Self::AlreadyFinalized { .. }
            | Self::IllegalTransition { .. }
            | Self::LeadershipLocked { .. }
            | Self::IpConsultationRequired { .. } => ErrorKind::Conflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::FeeNotConfigured { .. } | Self::Misconfiguration(_) => ErrorKind::Misconfiguration,
            Self::SourceUnavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NameConflict(_) => "NAME_CONFLICT",
            Self::FeeNotConfigured { .. } => "FEE_NOT_CONFIGURED",
            Self::AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            Self::AlreadyPaid { .. } => "ALREADY_PAID",
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            Self::LeadershipLocked { .. } => "LEADERSHIP_LOCKED",
            Self::IpConsultationRequired { .. } => "IP_CONSULTATION_REQUIRED",
            Self::Misconfiguration(_) => "MISCONFIGURATION",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
        }
    }
}

impl From<ResolverError> for WorkflowError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::Validation(v) => Self::Validation(v),
            ResolverError::SourceUnavailable(msg) => Self::SourceUnavailable(msg),
        }
    }
}

impl From<FeeError> for WorkflowError {
    fn from(err: FeeError) -> Self {
        match err {
            FeeError::NotConfigured { province_id } => Self::FeeNotConfigured { province_id },
            FeeError::SourceUnavailable(msg) => Self::SourceUnavailable(msg),
            other => Self::Misconfiguration(other.to_string()),
        }
    }
}
