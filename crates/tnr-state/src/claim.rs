//! # Claim Manager
//!
//! Two independent, exclusive review claims per request: the central-audit
//! track and the IP-review track. A (request, track) pair is held by at most
//! one user. Claims are acquired by an explicit take, released explicitly, or
//! consumed by the track's terminal decision.
//!
//! This module holds the claim rules only. It never touches `status` beyond
//! reporting the status change a take or release implies; the workflow engine
//! applies that change together with the history row.

use serde::{Deserialize, Serialize};
use tnr_core::{ActorContext, Capability, Timestamp, UserId};

use crate::error::WorkflowError;
use crate::request::{ActionKind, Request, RequestStatus};

/// A claim track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimTrack {
    /// Central-audit claim.
    Audit,
    /// IP-expert claim.
    Ip,
}

impl ClaimTrack {
    /// Wire name of the track.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Ip => "ip",
        }
    }

    /// Capability required to take this track.
    pub fn capability(&self) -> Capability {
        match self {
            Self::Audit => Capability::ClaimForAudit,
            Self::Ip => Capability::ClaimForIpReview,
        }
    }

    /// Statuses in which a take on this track is allowed.
    pub fn takeable_from(&self) -> &'static [RequestStatus] {
        match self {
            Self::Audit => &RequestStatus::PRE_LEADERSHIP,
            Self::Ip => &[RequestStatus::PendingIpResponse],
        }
    }

    pub(crate) fn taken_kind(&self) -> ActionKind {
        match self {
            Self::Audit => ActionKind::AuditClaimTaken,
            Self::Ip => ActionKind::IpClaimTaken,
        }
    }

    pub(crate) fn released_kind(&self) -> ActionKind {
        match self {
            Self::Audit => ActionKind::AuditClaimReleased,
            Self::Ip => ActionKind::IpClaimReleased,
        }
    }
}

impl std::fmt::Display for ClaimTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimTrack {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "audit" => Ok(Self::Audit),
            "ip" => Ok(Self::Ip),
            other => Err(format!("unknown claim track '{other}'; expected 'audit' or 'ip'")),
        }
    }
}

/// A held claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// The holding user.
    pub holder: UserId,
    /// When the claim was taken.
    pub taken_at: Timestamp,
}

/// What a claim operation decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimChange {
    /// The claim changes hands; `status` is the resulting request status.
    Apply { status: RequestStatus },
    /// Nothing to do (re-take by the holder, or admin release of an empty claim).
    Noop,
}

/// Decide whether `actor` may take `track` on `request`.
pub fn plan_take(
    request: &Request,
    track: ClaimTrack,
    actor: &ActorContext,
) -> Result<ClaimChange, WorkflowError> {
    if !actor.can(track.capability()) {
        return Err(WorkflowError::Forbidden {
            reason: format!("taking the {track} claim requires the {} capability", track.capability()),
        });
    }
    if let Some(existing) = request.claim(track) {
        if existing.holder == actor.user_id {
            return Ok(ClaimChange::Noop);
        }
        return Err(WorkflowError::AlreadyClaimed {
            request_id: request.id,
            track,
            holder: existing.holder,
        });
    }
    if !track.takeable_from().contains(&request.status) {
        return Err(WorkflowError::IllegalTransition {
            from: request.status,
            to: request.status,
            reason: format!("the {track} claim cannot be taken while the request is {}", request.status),
        });
    }
    let status = match (track, request.status) {
        (ClaimTrack::Audit, RequestStatus::New) => RequestStatus::InAuditing,
        (_, current) => current,
    };
    Ok(ClaimChange::Apply { status })
}

/// Decide whether `actor` may release `track` on `request`.
///
/// Only the holder or an admin may release. Releasing the audit claim from
/// `InAuditing` resets the request to `New`; the request had not progressed
/// past initial audit.
pub fn plan_release(
    request: &Request,
    track: ClaimTrack,
    actor: &ActorContext,
) -> Result<ClaimChange, WorkflowError> {
    let Some(existing) = request.claim(track) else {
        if actor.is_admin() {
            return Ok(ClaimChange::Noop);
        }
        return Err(WorkflowError::Forbidden {
            reason: format!("the {track} claim is not held by you"),
        });
    };
    if existing.holder != actor.user_id && !actor.is_admin() {
        return Err(WorkflowError::Forbidden {
            reason: format!("the {track} claim is not held by you"),
        });
    }
    let status = match (track, request.status) {
        (ClaimTrack::Audit, RequestStatus::InAuditing) => RequestStatus::New,
        (_, current) => current,
    };
    Ok(ClaimChange::Apply { status })
}

/// Set the holder of `track`.
pub(crate) fn set_claim(request: &mut Request, track: ClaimTrack, claim: Option<Claim>) {
    match track {
        ClaimTrack::Audit => request.audit_claim = claim,
        ClaimTrack::Ip => request.ip_claim = claim,
    }
}
