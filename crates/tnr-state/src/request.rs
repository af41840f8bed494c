//! # Name-Reservation Request
//!
//! The central entity: a proposed trade name moving through provincial
//! submission, central audit, IP review, leadership approval, and registry
//! finalization.
//!
//! ## States
//!
//! ```text
//!  submit (fee-liable) ─▶ AwaitingPayment ──pay──▶ InAuditing ◀── submit (fee-exempt)
//!                                                    │    ▲
//!                            ┌──── forward to IP ────┤    └── take (from New)
//!                            ▼                       │
//!                     PendingIpResponse ─report─▶ IpResponded
//!                                                    │
//!        (any pre-leadership state) ── forward ──▶ PendingDirectorReview ──▶ PendingMinisterReview
//!                                                    │                          │        │
//!                                                    └──▶ LeadershipResponded ◀─┘        ▼
//!                                                                            TemporarilyReserved
//!  decide ──▶ Accepted* / Rejected*
//!  Accepted / TemporarilyReserved ──▶ Finalized* | CancelledByStriking* | New (reset)
//! ```
//!
//! Status codes are stable integers (1–14) for persistence; business logic
//! only ever matches on the enum.

use serde::{Deserialize, Serialize};
use tnr_core::{
    ActorContext, ArtifactRef, ChecklistItemId, CompanyTypeId, ProvinceId, PurposeId, RequestId, Role,
    Timestamp, UserId,
};

use crate::claim::{Claim, ClaimTrack};
use crate::fee::Invoice;

// ─── Status ──────────────────────────────────────────────────────────

/// Lifecycle status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Reset to the start of audit; awaiting an auditor.
    New,
    /// Under central audit.
    InAuditing,
    /// Referred to an IP expert.
    PendingIpResponse,
    /// IP expert has submitted a technical report.
    IpResponded,
    /// Approved by audit (terminal for review purposes).
    Accepted,
    /// Rejected (terminal).
    Rejected,
    /// Fee-liable submission waiting for payment confirmation.
    AwaitingPayment,
    /// With the Director.
    PendingDirectorReview,
    /// With the Minister Assistant.
    PendingMinisterReview,
    /// Approved by leadership; the name is held pending registry finalization.
    TemporarilyReserved,
    /// Cancelled because the submission was never completed (terminal).
    CancelledForNonCompletion,
    /// Registry number issued (terminal).
    Finalized,
    /// Reserved name released by the registry (terminal).
    CancelledByStriking,
    /// Returned from leadership review to the auditor.
    LeadershipResponded,
}

impl RequestStatus {
    /// Every status, ordered by persistence code.
    pub const ALL: [RequestStatus; 14] = [
        RequestStatus::New,
        RequestStatus::InAuditing,
        RequestStatus::PendingIpResponse,
        RequestStatus::IpResponded,
        RequestStatus::Accepted,
        RequestStatus::Rejected,
        RequestStatus::AwaitingPayment,
        RequestStatus::PendingDirectorReview,
        RequestStatus::PendingMinisterReview,
        RequestStatus::TemporarilyReserved,
        RequestStatus::CancelledForNonCompletion,
        RequestStatus::Finalized,
        RequestStatus::CancelledByStriking,
        RequestStatus::LeadershipResponded,
    ];

    /// Statuses in which audit review is live and leadership is not involved.
    pub const PRE_LEADERSHIP: [RequestStatus; 5] = [
        RequestStatus::New,
        RequestStatus::InAuditing,
        RequestStatus::PendingIpResponse,
        RequestStatus::IpResponded,
        RequestStatus::LeadershipResponded,
    ];

    /// Stable persistence code (1–14).
    pub fn code(&self) -> u8 {
        match self {
            Self::New => 1,
            Self::InAuditing => 2,
            Self::PendingIpResponse => 3,
            Self::IpResponded => 4,
            Self::Accepted => 5,
            Self::Rejected => 6,
            Self::AwaitingPayment => 7,
            Self::PendingDirectorReview => 8,
            Self::PendingMinisterReview => 9,
            Self::TemporarilyReserved => 10,
            Self::CancelledForNonCompletion => 11,
            Self::Finalized => 12,
            Self::CancelledByStriking => 13,
            Self::LeadershipResponded => 14,
        }
    }

    /// Inverse of [`RequestStatus::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::InAuditing => "IN_AUDITING",
            Self::PendingIpResponse => "PENDING_IP_RESPONSE",
            Self::IpResponded => "IP_RESPONDED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::AwaitingPayment => "AWAITING_PAYMENT",
            Self::PendingDirectorReview => "PENDING_DIRECTOR_REVIEW",
            Self::PendingMinisterReview => "PENDING_MINISTER_REVIEW",
            Self::TemporarilyReserved => "TEMPORARILY_RESERVED",
            Self::CancelledForNonCompletion => "CANCELLED_FOR_NON_COMPLETION",
            Self::Finalized => "FINALIZED",
            Self::CancelledByStriking => "CANCELLED_BY_STRIKING",
            Self::LeadershipResponded => "LEADERSHIP_RESPONDED",
        }
    }

    /// Terminal statuses: no further review transition is defined.
    ///
    /// `Accepted` is terminal for review; the registry may still finalize,
    /// strike, or reset it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Accepted
                | Self::Rejected
                | Self::Finalized
                | Self::CancelledForNonCompletion
                | Self::CancelledByStriking
        )
    }

    /// Director or Minister Assistant review is in progress.
    pub fn is_leadership_review(&self) -> bool {
        matches!(self, Self::PendingDirectorReview | Self::PendingMinisterReview)
    }

    /// Whether a request in this status holds its name against new submissions.
    ///
    /// Only the two negative outcomes free the name.
    pub fn blocks_name(&self) -> bool {
        !matches!(self, Self::Rejected | Self::CancelledByStriking)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown status '{s}'. Valid statuses: {}",
                    Self::ALL.iter().map(|st| st.as_str()).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

// ─── Action kinds ────────────────────────────────────────────────────

/// The action-type tag of a history row. Also the event vocabulary of the
/// transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Fee-liable submission; an invoice was issued.
    SubmittedFeeLiable,
    /// Fee-exempt submission.
    SubmittedFeeExempt,
    /// Submitter confirmed payment of the invoice.
    PaymentConfirmed,
    /// An auditor took the audit claim.
    AuditClaimTaken,
    /// An IP expert took the IP claim.
    IpClaimTaken,
    /// The audit claim was released.
    AuditClaimReleased,
    /// The IP claim was released.
    IpClaimReleased,
    /// Auditor referred the request to IP review.
    ForwardedToIp,
    /// IP expert submitted the technical report.
    IpReportSubmitted,
    /// Audit decision: accepted.
    Accepted,
    /// Audit decision: rejected.
    Rejected,
    /// Sent to the Director.
    ForwardedToDirector,
    /// Director returned the request to audit.
    DirectorReturned,
    /// Director forwarded to the Minister Assistant.
    DirectorForwarded,
    /// Minister Assistant approved; name temporarily reserved.
    MinisterApproved,
    /// Minister Assistant rejected or returned to audit.
    MinisterReturned,
    /// A decided request was reset to `New`.
    Reset,
    /// Cancelled for non-completion.
    CancelledForNonCompletion,
    /// Registry number recorded.
    RegistryFinalized,
    /// Reserved name struck from the registry.
    NameStruck,
}

impl ActionKind {
    /// Wire name (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmittedFeeLiable => "submitted_fee_liable",
            Self::SubmittedFeeExempt => "submitted_fee_exempt",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::AuditClaimTaken => "audit_claim_taken",
            Self::IpClaimTaken => "ip_claim_taken",
            Self::AuditClaimReleased => "audit_claim_released",
            Self::IpClaimReleased => "ip_claim_released",
            Self::ForwardedToIp => "forwarded_to_ip",
            Self::IpReportSubmitted => "ip_report_submitted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::ForwardedToDirector => "forwarded_to_director",
            Self::DirectorReturned => "director_returned",
            Self::DirectorForwarded => "director_forwarded",
            Self::MinisterApproved => "minister_approved",
            Self::MinisterReturned => "minister_returned",
            Self::Reset => "reset",
            Self::CancelledForNonCompletion => "cancelled_for_non_completion",
            Self::RegistryFinalized => "registry_finalized",
            Self::NameStruck => "name_struck",
        }
    }

    /// Whether a history row of this kind is shown to the submitter.
    pub fn visible_to_submitter(&self) -> bool {
        match self {
            Self::SubmittedFeeLiable
            | Self::SubmittedFeeExempt
            | Self::PaymentConfirmed
            | Self::Accepted
            | Self::Rejected
            | Self::MinisterApproved
            | Self::Reset
            | Self::CancelledForNonCompletion
            | Self::RegistryFinalized
            | Self::NameStruck => true,
            Self::AuditClaimTaken
            | Self::IpClaimTaken
            | Self::AuditClaimReleased
            | Self::IpClaimReleased
            | Self::ForwardedToIp
            | Self::IpReportSubmitted
            | Self::ForwardedToDirector
            | Self::DirectorReturned
            | Self::DirectorForwarded
            | Self::MinisterReturned => false,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── History ─────────────────────────────────────────────────────────

/// One append-only history row. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAction {
    /// Position in the request's history (0-based).
    pub sequence: u32,
    /// Acting user.
    pub actor: UserId,
    /// Acting role at the time of the action.
    pub role: Option<Role>,
    /// Action-type tag.
    pub kind: ActionKind,
    /// Status before the action (`None` for the submission row).
    pub from_status: Option<RequestStatus>,
    /// Status after the action.
    pub to_status: RequestStatus,
    /// Free-text note.
    pub note: Option<String>,
    /// Internal-only rows are hidden from the submitter.
    pub visible_to_submitter: bool,
    /// When the action was recorded.
    pub created_at: Timestamp,
}

// ─── Associations ────────────────────────────────────────────────────

/// A selected business-purpose activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurposeSelection {
    /// Catalogue id of the activity.
    pub purpose_id: PurposeId,
    /// Optional free-text complement to the activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
}

/// Fulfilment flag for one checklist / attachment template item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistFlag {
    /// Template item.
    pub item_id: ChecklistItemId,
    /// Whether the item was provided.
    pub fulfilled: bool,
}

/// IP expert verdict on the proposed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpVerdict {
    /// No conflict with protected marks.
    NoObjection,
    /// The name conflicts with a protected mark.
    Objection,
}

impl IpVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoObjection => "no_objection",
            Self::Objection => "objection",
        }
    }
}

/// The IP expert's technical report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpReport {
    /// The expert who submitted the report.
    pub expert: UserId,
    /// Verdict.
    pub verdict: IpVerdict,
    /// Free-text feedback.
    pub feedback: String,
    /// Report document in the file store.
    pub report: ArtifactRef,
    /// When the report was submitted.
    pub submitted_at: Timestamp,
}

/// Final registry entry. Set exactly once, at finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Registry number.
    pub number: String,
    /// Registry date.
    pub date: Timestamp,
}

// ─── Request ─────────────────────────────────────────────────────────

/// A name-reservation request.
///
/// Field ownership: the workflow engine writes `status` and `history`; the
/// fee ledger writes `invoice`; the claim manager writes the claim fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Immutable identity.
    pub id: RequestId,
    /// Proposed trade name (local language).
    pub name: String,
    /// Optional foreign-language name.
    pub name_en: Option<String>,
    /// Chosen legal-entity type.
    pub company_type_id: CompanyTypeId,
    /// Owning province.
    pub province_id: ProvinceId,
    /// Submitting user.
    pub submitter: UserId,
    /// Whether the submission was declared fee-liable.
    pub fee_liable: bool,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// Central-audit claim.
    pub audit_claim: Option<Claim>,
    /// IP-review claim.
    pub ip_claim: Option<Claim>,
    /// The IP expert assigned to the case. Survives the IP claim being
    /// consumed by the report.
    pub ip_expert_id: Option<UserId>,
    /// Auditor's free-text feedback from the last audit decision.
    pub audit_feedback: Option<String>,
    /// IP expert's report, once submitted.
    pub ip_report: Option<IpReport>,
    /// Registry entry, set only at finalization.
    pub registry: Option<RegistryEntry>,
    /// Invoice for fee-liable submissions.
    pub invoice: Option<Invoice>,
    /// Selected business-purpose activities, in submission order.
    pub purposes: Vec<PurposeSelection>,
    /// Checklist fulfilment flags, in template order.
    pub checklist: Vec<ChecklistFlag>,
    /// Append-only action history.
    pub history: Vec<RequestAction>,
    /// Incremented by every committed mutation.
    pub version: u64,
    /// Creation time.
    pub created_at: Timestamp,
    /// Time of the last committed mutation.
    pub updated_at: Timestamp,
}

impl Request {
    /// The claim on `track`, if held.
    pub fn claim(&self, track: ClaimTrack) -> Option<&Claim> {
        match track {
            ClaimTrack::Audit => self.audit_claim.as_ref(),
            ClaimTrack::Ip => self.ip_claim.as_ref(),
        }
    }

    /// Whether `user` holds the claim on `track`.
    pub fn is_claim_holder(&self, track: ClaimTrack, user: UserId) -> bool {
        self.claim(track).is_some_and(|c| c.holder == user)
    }

    /// Whether the invoice exists and has been paid.
    pub fn is_paid(&self) -> bool {
        self.invoice.as_ref().is_some_and(|inv| inv.paid)
    }

    /// Whether the mandatory IP consultation applies and has not happened.
    ///
    /// Evaluated on invoice state, not on the `fee_liable` declaration.
    pub fn requires_ip_consultation(&self) -> bool {
        self.is_paid() && self.ip_expert_id.is_none()
    }

    /// Timestamp of the most recent history row.
    pub fn last_action_at(&self) -> Option<Timestamp> {
        self.history.last().map(|a| a.created_at)
    }

    /// History as seen by `viewer`. A viewer whose only role is provincial
    /// officer sees submitter-visible rows; reviewers see everything.
    pub fn history_for(&self, viewer: &ActorContext) -> Vec<RequestAction> {
        let reviewer = viewer.roles.iter().any(|r| *r != Role::ProvincialOfficer);
        if reviewer {
            return self.history.clone();
        }
        self.history
            .iter()
            .filter(|a| a.visible_to_submitter)
            .cloned()
            .collect()
    }

    /// Compact projection for dashboards and notifications.
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            province_id: self.province_id,
            audit_claim_holder: self.audit_claim.as_ref().map(|c| c.holder),
            ip_claim_holder: self.ip_claim.as_ref().map(|c| c.holder),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// Projection of a request broadcast to live dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub name: String,
    pub status: RequestStatus,
    pub province_id: ProvinceId,
    pub audit_claim_holder: Option<UserId>,
    pub ip_claim_holder: Option<UserId>,
    pub version: u64,
    pub updated_at: Timestamp,
}
