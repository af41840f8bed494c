//! # Side-Effect Intents
//!
//! A committed operation returns the new request together with the side
//! effects it implies. Nothing here performs I/O: the API layer's dispatcher
//! executes the intents after the store commit and owns their failure
//! handling.

use serde::{Deserialize, Serialize};
use tnr_core::{ActorContext, RequestId, Role, Timestamp, UserId};

use crate::request::{ActionKind, Request, RequestStatus, RequestSummary};

/// One post-commit intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SideEffect {
    /// Append to the audit log.
    Audit(AuditEntry),
    /// Send a notification.
    Notify(Notification),
    /// Push the updated projection to live dashboards.
    Broadcast(RequestSummary),
}

impl SideEffect {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audit(_) => "audit",
            Self::Notify(_) => "notify",
            Self::Broadcast(_) => "broadcast",
        }
    }
}

/// Audit-log record of one committed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub request_id: RequestId,
    pub actor: UserId,
    pub role: Option<Role>,
    pub action: ActionKind,
    pub before: Option<RequestStatus>,
    pub after: RequestStatus,
    /// One-line human summary of the change.
    pub summary: String,
    /// Client network origin.
    pub origin: Option<String>,
    pub at: Timestamp,
}

/// Notification recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NotificationTarget {
    User(UserId),
    Role(Role),
}

/// Notification handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub target: NotificationTarget,
    pub title: String,
    pub body: String,
    pub category: String,
    pub request_id: RequestId,
}

/// The intents for a committed action on `after`.
pub fn plan(
    before: Option<RequestStatus>,
    after: &Request,
    action: ActionKind,
    actor: &ActorContext,
    at: Timestamp,
) -> Vec<SideEffect> {
    let mut effects = Vec::with_capacity(4);
    effects.push(SideEffect::Audit(AuditEntry {
        request_id: after.id,
        actor: actor.user_id,
        role: actor.acting_role(),
        action,
        before,
        after: after.status,
        summary: match before {
            Some(from) if from != after.status => format!("{action}: {from} -> {}", after.status),
            _ => format!("{action}: {}", after.status),
        },
        origin: actor.origin.clone(),
        at,
    }));
    for target in recipients(action, after) {
        effects.push(SideEffect::Notify(Notification {
            target,
            title: title(action, after),
            body: format!("Request {} \"{}\" is now {}", after.id.get(), after.name, after.status),
            category: action.as_str().to_string(),
            request_id: after.id,
        }));
    }
    effects.push(SideEffect::Broadcast(after.summary()));
    effects
}

fn audit_holder_or_auditors(request: &Request) -> NotificationTarget {
    match &request.audit_claim {
        Some(claim) => NotificationTarget::User(claim.holder),
        None => NotificationTarget::Role(Role::Auditor),
    }
}

fn recipients(action: ActionKind, request: &Request) -> Vec<NotificationTarget> {
    let submitter = NotificationTarget::User(request.submitter);
    match action {
        ActionKind::SubmittedFeeLiable => vec![submitter],
        ActionKind::SubmittedFeeExempt | ActionKind::PaymentConfirmed => {
            vec![submitter, NotificationTarget::Role(Role::Auditor)]
        }
        ActionKind::ForwardedToIp => vec![NotificationTarget::Role(Role::IpExpert)],
        ActionKind::IpReportSubmitted
        | ActionKind::DirectorReturned
        | ActionKind::MinisterReturned => vec![audit_holder_or_auditors(request)],
        ActionKind::ForwardedToDirector => vec![NotificationTarget::Role(Role::Director)],
        ActionKind::DirectorForwarded => vec![NotificationTarget::Role(Role::MinisterAssistant)],
        ActionKind::Accepted | ActionKind::MinisterApproved => {
            vec![submitter, NotificationTarget::Role(Role::RegistryOfficer)]
        }
        ActionKind::Rejected
        | ActionKind::Reset
        | ActionKind::CancelledForNonCompletion
        | ActionKind::RegistryFinalized
        | ActionKind::NameStruck => vec![submitter],
        ActionKind::AuditClaimTaken
        | ActionKind::IpClaimTaken
        | ActionKind::AuditClaimReleased
        | ActionKind::IpClaimReleased => Vec::new(),
    }
}

fn title(action: ActionKind, request: &Request) -> String {
    let what = match action {
        ActionKind::SubmittedFeeLiable => "Invoice issued",
        ActionKind::SubmittedFeeExempt => "Request submitted",
        ActionKind::PaymentConfirmed => "Payment confirmed",
        ActionKind::ForwardedToIp => "IP review requested",
        ActionKind::IpReportSubmitted => "IP report received",
        ActionKind::Accepted => "Name accepted",
        ActionKind::Rejected => "Name rejected",
        ActionKind::ForwardedToDirector => "Director review requested",
        ActionKind::DirectorReturned | ActionKind::MinisterReturned => "Returned from leadership",
        ActionKind::DirectorForwarded => "Minister review requested",
        ActionKind::MinisterApproved => "Name temporarily reserved",
        ActionKind::Reset => "Request reset",
        ActionKind::CancelledForNonCompletion => "Request cancelled",
        ActionKind::RegistryFinalized => "Registry finalized",
        ActionKind::NameStruck => "Name struck",
        ActionKind::AuditClaimTaken
        | ActionKind::IpClaimTaken
        | ActionKind::AuditClaimReleased
        | ActionKind::IpClaimReleased => "Claim updated",
    };
    format!("{what}: {}", request.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::Claim;
    use crate::test_support::request_in;

    fn actor() -> ActorContext {
        ActorContext::new(UserId(10), [Role::Auditor]).with_origin("10.0.0.7")
    }

    fn notifications(effects: &[SideEffect]) -> Vec<NotificationTarget> {
        effects
            .iter()
            .filter_map(|e| match e {
                SideEffect::Notify(n) => Some(n.target),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_commit_audits_and_broadcasts() {
        let req = request_in(RequestStatus::PendingIpResponse);
        let effects = plan(Some(RequestStatus::InAuditing), &req, ActionKind::ForwardedToIp, &actor(), Timestamp::now());
        assert_eq!(effects.first().map(SideEffect::label), Some("audit"));
        assert_eq!(effects.last().map(SideEffect::label), Some("broadcast"));
        let SideEffect::Audit(entry) = &effects[0] else { panic!("first effect is not audit") };
        assert_eq!(entry.origin.as_deref(), Some("10.0.0.7"));
        assert_eq!(entry.summary, "forwarded_to_ip: IN_AUDITING -> PENDING_IP_RESPONSE");
    }

    #[test]
    fn claim_actions_notify_nobody() {
        let req = request_in(RequestStatus::InAuditing);
        let effects = plan(Some(RequestStatus::New), &req, ActionKind::AuditClaimTaken, &actor(), Timestamp::now());
        assert!(notifications(&effects).is_empty());
    }

    #[test]
    fn ip_report_goes_to_audit_holder() {
        let mut req = request_in(RequestStatus::IpResponded);
        req.audit_claim = Some(Claim { holder: UserId(10), taken_at: Timestamp::now() });
        let effects = plan(Some(RequestStatus::PendingIpResponse), &req, ActionKind::IpReportSubmitted, &actor(), Timestamp::now());
        assert_eq!(notifications(&effects), vec![NotificationTarget::User(UserId(10))]);

        req.audit_claim = None;
        let effects = plan(Some(RequestStatus::PendingIpResponse), &req, ActionKind::IpReportSubmitted, &actor(), Timestamp::now());
        assert_eq!(notifications(&effects), vec![NotificationTarget::Role(Role::Auditor)]);
    }

    #[test]
    fn approval_notifies_submitter_and_registry() {
        let req = request_in(RequestStatus::TemporarilyReserved);
        let effects = plan(
            Some(RequestStatus::PendingMinisterReview),
            &req,
            ActionKind::MinisterApproved,
            &actor(),
            Timestamp::now(),
        );
        assert_eq!(
            notifications(&effects),
            vec![
                NotificationTarget::User(req.submitter),
                NotificationTarget::Role(Role::RegistryOfficer)
            ]
        );
    }
}
