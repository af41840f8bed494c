//! # Workflow Engine
//!
//! Owns the request state machine. Every operation is a pure function of the
//! current request and an explicit [`ActorContext`]: it validates the guard,
//! builds the next version of the request with exactly one new history row,
//! and returns it together with the side-effect intents. Nothing is written
//! until the caller swaps the returned request into its store, so a rejected
//! operation can never leave a partial transition behind.
//!
//! Guard evaluation order for audit decisions:
//! 1. leadership lock (non-admins cannot decide during leadership review),
//! 2. decision authority (audit-claim holder or admin),
//! 3. mandatory IP consultation (paid request with no assigned IP expert).

use std::sync::Arc;

use rand_core::OsRng;
use tnr_core::{
    error::require_text, ActorContext, ArtifactRef, Capability, CompanyTypeId, ProvinceId,
    RequestId, Role, Timestamp, ValidationError,
};

use crate::claim::{self, Claim, ClaimChange, ClaimTrack};
use crate::effects::{self, SideEffect};
use crate::error::WorkflowError;
use crate::fee::{self, FeeRuleSource, InvoiceNumber, PaymentOutcome};
use crate::naming::{CandidateSource, CollisionReport, NameNormalizer, MAX_NAME_LEN};
use crate::request::{
    ActionKind, ChecklistFlag, IpReport, IpVerdict, PurposeSelection, RegistryEntry, Request,
    RequestAction, RequestStatus,
};

/// Maximum length of a free-text note or feedback.
pub const MAX_NOTE_LEN: usize = 2000;
/// Maximum length of a registry or receipt number.
pub const MAX_NUMBER_LEN: usize = 64;

// ─── Transition table ────────────────────────────────────────────────

/// One legal status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    /// The event, also the history tag written.
    pub action: ActionKind,
    /// Source statuses. Empty for submissions.
    pub from: &'static [RequestStatus],
    /// Target status.
    pub to: RequestStatus,
    /// Whether the generic `transition` call may perform it. Otherwise a
    /// dedicated operation must be used.
    pub via_transition: bool,
}

use RequestStatus as S;

const DECIDABLE: &[RequestStatus] = &[
    S::InAuditing,
    S::PendingIpResponse,
    S::IpResponded,
    S::LeadershipResponded,
    S::PendingDirectorReview,
    S::PendingMinisterReview,
];

const REGISTRY_HELD: &[RequestStatus] = &[S::Accepted, S::TemporarilyReserved];

/// Every status-changing event. Claim take/release are governed by
/// [`ClaimTrack::takeable_from`] instead.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule { action: ActionKind::SubmittedFeeLiable, from: &[], to: S::AwaitingPayment, via_transition: false },
    TransitionRule { action: ActionKind::SubmittedFeeExempt, from: &[], to: S::InAuditing, via_transition: false },
    TransitionRule { action: ActionKind::PaymentConfirmed, from: &[S::AwaitingPayment], to: S::InAuditing, via_transition: false },
    TransitionRule {
        action: ActionKind::ForwardedToIp,
        from: &[S::InAuditing, S::IpResponded, S::LeadershipResponded],
        to: S::PendingIpResponse,
        via_transition: true,
    },
    TransitionRule { action: ActionKind::IpReportSubmitted, from: &[S::PendingIpResponse], to: S::IpResponded, via_transition: false },
    TransitionRule { action: ActionKind::Accepted, from: DECIDABLE, to: S::Accepted, via_transition: true },
    TransitionRule { action: ActionKind::Rejected, from: DECIDABLE, to: S::Rejected, via_transition: true },
    TransitionRule {
        action: ActionKind::ForwardedToDirector,
        from: &[S::InAuditing, S::PendingIpResponse, S::IpResponded, S::LeadershipResponded],
        to: S::PendingDirectorReview,
        via_transition: true,
    },
    TransitionRule { action: ActionKind::DirectorReturned, from: &[S::PendingDirectorReview], to: S::LeadershipResponded, via_transition: true },
    TransitionRule { action: ActionKind::DirectorForwarded, from: &[S::PendingDirectorReview], to: S::PendingMinisterReview, via_transition: true },
    TransitionRule { action: ActionKind::MinisterApproved, from: &[S::PendingMinisterReview], to: S::TemporarilyReserved, via_transition: true },
    TransitionRule { action: ActionKind::MinisterReturned, from: &[S::PendingMinisterReview], to: S::LeadershipResponded, via_transition: true },
    TransitionRule { action: ActionKind::Reset, from: REGISTRY_HELD, to: S::New, via_transition: true },
    TransitionRule {
        action: ActionKind::CancelledForNonCompletion,
        from: &[S::AwaitingPayment, S::New],
        to: S::CancelledForNonCompletion,
        via_transition: true,
    },
    TransitionRule { action: ActionKind::RegistryFinalized, from: REGISTRY_HELD, to: S::Finalized, via_transition: false },
    TransitionRule { action: ActionKind::NameStruck, from: REGISTRY_HELD, to: S::CancelledByStriking, via_transition: true },
];

/// The rule for `action`.
pub fn rule_for(action: ActionKind) -> Option<&'static TransitionRule> {
    TRANSITIONS.iter().find(|r| r.action == action)
}

/// Resolve a generic `from → to` request to its rule.
pub fn resolve(from: RequestStatus, to: RequestStatus) -> Result<&'static TransitionRule, WorkflowError> {
    let matching = |r: &&TransitionRule| r.to == to && r.from.contains(&from);
    if let Some(rule) = TRANSITIONS.iter().filter(|r| r.via_transition).find(matching) {
        return Ok(rule);
    }
    let reason = match TRANSITIONS.iter().find(matching) {
        Some(rule) => match rule.action {
            ActionKind::IpReportSubmitted => "use the IP report submission; it records the verdict".to_string(),
            ActionKind::RegistryFinalized => "use registry finalization; it records the registry number".to_string(),
            ActionKind::PaymentConfirmed => "use payment confirmation; it records the receipt".to_string(),
            other => format!("{other} has a dedicated operation"),
        },
        None if from.is_terminal() && !REGISTRY_HELD.contains(&from) => format!("{from} is terminal"),
        None => "no such transition is defined".to_string(),
    };
    Err(WorkflowError::IllegalTransition { from, to, reason })
}

// ─── Results ─────────────────────────────────────────────────────────

/// A committed mutation: the next version of the request plus its effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub request: Request,
    pub effects: Vec<SideEffect>,
}

/// Result of an operation that may be an idempotent no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Committed(Committed),
    /// Nothing changed; no history row, no effects.
    Unchanged(Request),
}

impl Outcome {
    /// The request after the operation.
    pub fn request(&self) -> &Request {
        match self {
            Self::Committed(c) => &c.request,
            Self::Unchanged(r) => r,
        }
    }

    /// Split into the resulting request and the effects to dispatch.
    pub fn into_parts(self) -> (Request, Vec<SideEffect>) {
        match self {
            Self::Committed(c) => (c.request, c.effects),
            Self::Unchanged(r) => (r, Vec::new()),
        }
    }
}

impl From<Committed> for Outcome {
    fn from(c: Committed) -> Self {
        Self::Committed(c)
    }
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// Fields of a new submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDraft {
    pub name: String,
    pub name_en: Option<String>,
    pub company_type_id: CompanyTypeId,
    pub province_id: ProvinceId,
    pub fee_liable: bool,
    pub purposes: Vec<PurposeSelection>,
    pub checklist: Vec<ChecklistFlag>,
}

fn optional_text(field: &'static str, value: Option<&str>, max: usize) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => require_text(field, v, max).map(Some),
    }
}

fn forbidden(reason: impl Into<String>) -> WorkflowError {
    WorkflowError::Forbidden { reason: reason.into() }
}

// ─── Engine ──────────────────────────────────────────────────────────

/// The request lifecycle engine.
#[derive(Clone)]
pub struct WorkflowEngine {
    normalizer: NameNormalizer,
    fees: Arc<dyn FeeRuleSource>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("normalizer", &self.normalizer)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(normalizer: NameNormalizer, fees: Arc<dyn FeeRuleSource>) -> Self {
        Self { normalizer, fees }
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Sum of active fee rules for the province.
    pub fn quote_fee(&self, province_id: ProvinceId) -> Result<u64, WorkflowError> {
        Ok(fee::quote_fee(self.fees.as_ref(), province_id)?)
    }

    /// Availability of `name`, optionally ignoring one request.
    pub fn check_name<C>(
        &self,
        source: &C,
        name: &str,
        exclude: Option<RequestId>,
    ) -> Result<CollisionReport, WorkflowError>
    where
        C: CandidateSource + ?Sized,
    {
        Ok(self.normalizer.check(source, name, exclude)?)
    }

    /// Create a request under `id`.
    ///
    /// The caller must exclude other writers across this call and the
    /// insert, so the collision check and the new reservation are one unit.
    /// `invoice_taken` reports invoice numbers already in use.
    pub fn create_request<C>(
        &self,
        id: RequestId,
        draft: RequestDraft,
        actor: &ActorContext,
        existing: &C,
        invoice_taken: impl Fn(&InvoiceNumber) -> bool,
    ) -> Result<Committed, WorkflowError>
    where
        C: CandidateSource + ?Sized,
    {
        if !actor.can(Capability::CreateRequest) {
            return Err(forbidden("submitting a request requires the create-request capability"));
        }
        let name = require_text("name", &draft.name, MAX_NAME_LEN)?;
        let name_en = optional_text("name_en", draft.name_en.as_deref(), MAX_NAME_LEN)?;
        let purposes = draft
            .purposes
            .into_iter()
            .map(|p| {
                Ok(PurposeSelection {
                    purpose_id: p.purpose_id,
                    complement: optional_text("complement", p.complement.as_deref(), MAX_NOTE_LEN)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        if let Some(bound) = actor.province_id {
            if bound != draft.province_id && !actor.is_admin() {
                return Err(forbidden(format!("you may only submit requests for {bound}")));
            }
        }

        let mut names = vec![name.as_str()];
        if let Some(en) = name_en.as_deref() {
            names.push(en);
        }
        let report = self.normalizer.check_names(existing, &names, None)?;
        if !report.available {
            return Err(WorkflowError::NameConflict(Box::new(report)));
        }

        let at = Timestamp::now();
        let (status, invoice, action) = if draft.fee_liable {
            let amount = fee::require_fee(self.fees.as_ref(), draft.province_id)?;
            let invoice = fee::issue_invoice(amount, at, &mut OsRng, invoice_taken)?;
            (S::AwaitingPayment, Some(invoice), ActionKind::SubmittedFeeLiable)
        } else {
            (S::InAuditing, None, ActionKind::SubmittedFeeExempt)
        };

        let mut request = Request {
            id,
            name,
            name_en,
            company_type_id: draft.company_type_id,
            province_id: draft.province_id,
            submitter: actor.user_id,
            fee_liable: draft.fee_liable,
            status,
            audit_claim: None,
            ip_claim: None,
            ip_expert_id: None,
            audit_feedback: None,
            ip_report: None,
            registry: None,
            invoice,
            purposes,
            checklist: draft.checklist,
            history: Vec::new(),
            version: 1,
            created_at: at,
            updated_at: at,
        };
        request.history.push(RequestAction {
            sequence: 0,
            actor: actor.user_id,
            role: actor.acting_role(),
            kind: action,
            from_status: None,
            to_status: status,
            note: None,
            visible_to_submitter: action.visible_to_submitter(),
            created_at: at,
        });
        let effects = effects::plan(None, &request, action, actor, at);
        Ok(Committed { request, effects })
    }

    /// Mark the request's invoice paid and move it into audit.
    pub fn confirm_payment(
        &self,
        current: &Request,
        receipt_number: &str,
        receipt_artifact: Option<ArtifactRef>,
        actor: &ActorContext,
    ) -> Result<Outcome, WorkflowError> {
        let receipt_number = require_text("receipt_number", receipt_number, MAX_NUMBER_LEN)?;
        if current.submitter != actor.user_id && !actor.is_admin() {
            return Err(forbidden("only the submitter may confirm payment"));
        }
        let Some(invoice) = current.invoice.as_ref() else {
            return Err(WorkflowError::IllegalTransition {
                from: current.status,
                to: S::InAuditing,
                reason: "the request has no invoice; it was submitted fee-exempt".to_string(),
            });
        };
        if invoice.paid {
            if invoice.receipt_number.as_deref() == Some(receipt_number.as_str()) {
                return Ok(Outcome::Unchanged(current.clone()));
            }
            return Err(WorkflowError::AlreadyPaid {
                request_id: current.id,
                invoice: invoice.number.clone(),
            });
        }
        if current.status != S::AwaitingPayment {
            return Err(WorkflowError::IllegalTransition {
                from: current.status,
                to: S::InAuditing,
                reason: "payment can only be confirmed while awaiting payment".to_string(),
            });
        }

        let at = self.stamp(current);
        let mut next = current.clone();
        if let Some(invoice) = next.invoice.as_mut() {
            if invoice.confirm(&receipt_number, receipt_artifact, at) != PaymentOutcome::Recorded {
                return Ok(Outcome::Unchanged(current.clone()));
            }
        }
        next.status = S::InAuditing;
        let note = Some(format!("receipt {receipt_number}"));
        Ok(self.commit(current, next, ActionKind::PaymentConfirmed, actor, note, at).into())
    }

    /// Take the claim on `track`.
    pub fn take_claim(
        &self,
        current: &Request,
        track: ClaimTrack,
        actor: &ActorContext,
    ) -> Result<Outcome, WorkflowError> {
        let ClaimChange::Apply { status } = claim::plan_take(current, track, actor)? else {
            return Ok(Outcome::Unchanged(current.clone()));
        };
        let at = self.stamp(current);
        let mut next = current.clone();
        claim::set_claim(&mut next, track, Some(Claim { holder: actor.user_id, taken_at: at }));
        if track == ClaimTrack::Ip {
            next.ip_expert_id = Some(actor.user_id);
        }
        next.status = status;
        Ok(self.commit(current, next, track.taken_kind(), actor, None, at).into())
    }

    /// Release the claim on `track`.
    pub fn release_claim(
        &self,
        current: &Request,
        track: ClaimTrack,
        actor: &ActorContext,
    ) -> Result<Outcome, WorkflowError> {
        let ClaimChange::Apply { status } = claim::plan_release(current, track, actor)? else {
            return Ok(Outcome::Unchanged(current.clone()));
        };
        let at = self.stamp(current);
        let mut next = current.clone();
        claim::set_claim(&mut next, track, None);
        if track == ClaimTrack::Ip && next.ip_report.is_none() {
            next.ip_expert_id = None;
        }
        next.status = status;
        Ok(self.commit(current, next, track.released_kind(), actor, None, at).into())
    }

    /// Generic transition to `target`.
    pub fn transition(
        &self,
        current: &Request,
        target: RequestStatus,
        actor: &ActorContext,
        note: Option<&str>,
    ) -> Result<Committed, WorkflowError> {
        let rule = resolve(current.status, target)?;
        self.apply_rule(current, rule, actor, note)
    }

    /// Record the IP expert's technical report.
    pub fn submit_ip_report(
        &self,
        current: &Request,
        verdict: IpVerdict,
        feedback: &str,
        report: ArtifactRef,
        actor: &ActorContext,
    ) -> Result<Committed, WorkflowError> {
        let feedback = require_text("feedback", feedback, MAX_NOTE_LEN)?;
        if current.status != S::PendingIpResponse {
            return Err(WorkflowError::IllegalTransition {
                from: current.status,
                to: S::IpResponded,
                reason: "a technical report can only be submitted while IP review is pending".to_string(),
            });
        }
        self.authorize(current, ActionKind::IpReportSubmitted, actor)?;

        let at = self.stamp(current);
        let mut next = current.clone();
        next.ip_report = Some(IpReport {
            expert: actor.user_id,
            verdict,
            feedback: feedback.clone(),
            report,
            submitted_at: at,
        });
        next.ip_expert_id.get_or_insert(actor.user_id);
        next.status = S::IpResponded;
        let note = Some(format!("{}: {feedback}", verdict.as_str()));
        Ok(self.commit(current, next, ActionKind::IpReportSubmitted, actor, note, at))
    }

    /// Record the registry number. Set exactly once.
    pub fn finalize_registry(
        &self,
        current: &Request,
        registry_number: &str,
        registry_date: Timestamp,
        actor: &ActorContext,
    ) -> Result<Committed, WorkflowError> {
        self.authorize(current, ActionKind::RegistryFinalized, actor)?;
        if let Some(entry) = &current.registry {
            return Err(WorkflowError::AlreadyFinalized {
                request_id: current.id,
                number: entry.number.clone(),
            });
        }
        let number = require_text("registry_number", registry_number, MAX_NUMBER_LEN)?;
        if !REGISTRY_HELD.contains(&current.status) {
            return Err(WorkflowError::IllegalTransition {
                from: current.status,
                to: S::Finalized,
                reason: "only accepted or temporarily reserved names can be finalized".to_string(),
            });
        }
        let at = self.stamp(current);
        let mut next = current.clone();
        next.registry = Some(RegistryEntry { number: number.clone(), date: registry_date });
        next.status = S::Finalized;
        let note = Some(format!("registry number {number}"));
        Ok(self.commit(current, next, ActionKind::RegistryFinalized, actor, note, at))
    }

    /// Strike a reserved name, freeing it for new submissions.
    pub fn release_name(
        &self,
        current: &Request,
        actor: &ActorContext,
        note: Option<&str>,
    ) -> Result<Committed, WorkflowError> {
        let rule = rule_for(ActionKind::NameStruck).ok_or_else(|| WorkflowError::IllegalTransition {
            from: current.status,
            to: S::CancelledByStriking,
            reason: "no such transition is defined".to_string(),
        })?;
        if !rule.from.contains(&current.status) {
            return Err(WorkflowError::IllegalTransition {
                from: current.status,
                to: S::CancelledByStriking,
                reason: "only accepted or temporarily reserved names can be struck".to_string(),
            });
        }
        self.apply_rule(current, rule, actor, note)
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn apply_rule(
        &self,
        current: &Request,
        rule: &TransitionRule,
        actor: &ActorContext,
        note: Option<&str>,
    ) -> Result<Committed, WorkflowError> {
        let note = optional_text("note", note, MAX_NOTE_LEN)?;
        if rule.action == ActionKind::Rejected && note.is_none() {
            return Err(ValidationError::Empty { field: "note" }.into());
        }
        self.authorize(current, rule.action, actor)?;

        let at = self.stamp(current);
        let mut next = current.clone();
        next.status = rule.to;
        match rule.action {
            ActionKind::Accepted | ActionKind::Rejected => next.audit_feedback = note.clone(),
            ActionKind::Reset => {
                next.audit_claim = None;
                next.ip_claim = None;
            }
            _ => {}
        }
        Ok(self.commit(current, next, rule.action, actor, note, at))
    }

    /// Role, capability, and claim guard for `action` on `current`.
    fn authorize(&self, current: &Request, action: ActionKind, actor: &ActorContext) -> Result<(), WorkflowError> {
        match action {
            ActionKind::SubmittedFeeLiable | ActionKind::SubmittedFeeExempt => {
                if !actor.can(Capability::CreateRequest) {
                    return Err(forbidden("submitting a request requires the create-request capability"));
                }
            }
            ActionKind::PaymentConfirmed => {
                if current.submitter != actor.user_id && !actor.is_admin() {
                    return Err(forbidden("only the submitter may confirm payment"));
                }
            }
            ActionKind::AuditClaimTaken
            | ActionKind::IpClaimTaken
            | ActionKind::AuditClaimReleased
            | ActionKind::IpClaimReleased => {}
            ActionKind::ForwardedToIp => self.require_audit_holder(current, actor)?,
            ActionKind::IpReportSubmitted => {
                if !current.is_claim_holder(ClaimTrack::Ip, actor.user_id) && !actor.is_admin() {
                    return Err(forbidden("only the holder of the IP claim may submit the report"));
                }
            }
            ActionKind::Accepted | ActionKind::Rejected => {
                if current.status.is_leadership_review() && !actor.is_admin() {
                    return Err(WorkflowError::LeadershipLocked { status: current.status });
                }
                self.require_audit_holder(current, actor)?;
                self.require_ip_consultation(current, actor)?;
            }
            ActionKind::ForwardedToDirector => {
                self.require_audit_holder(current, actor)?;
                self.require_ip_consultation(current, actor)?;
            }
            ActionKind::DirectorReturned | ActionKind::DirectorForwarded => {
                if !actor.has_role(Role::Director) && !actor.is_admin() {
                    return Err(forbidden("only the Director may act on director review"));
                }
            }
            ActionKind::MinisterApproved | ActionKind::MinisterReturned => {
                if !actor.has_role(Role::MinisterAssistant) && !actor.is_admin() {
                    return Err(forbidden("only the Minister Assistant may act on minister review"));
                }
            }
            ActionKind::Reset => {
                if !actor.can(Capability::FinalDecision) {
                    return Err(forbidden("resetting a decided request requires the final-decision capability"));
                }
            }
            ActionKind::CancelledForNonCompletion => {
                let submitter_abandons =
                    current.submitter == actor.user_id && current.status == S::AwaitingPayment;
                if !actor.can(Capability::FinalDecision) && !submitter_abandons {
                    return Err(forbidden("cancelling requires the final-decision capability"));
                }
            }
            ActionKind::RegistryFinalized => {
                if !actor.can(Capability::FinalizeRegistry) {
                    return Err(forbidden("finalizing requires the finalize-registry capability"));
                }
            }
            ActionKind::NameStruck => {
                if !actor.can(Capability::StrikeName) {
                    return Err(forbidden("striking a name requires the strike-name capability"));
                }
            }
        }
        Ok(())
    }

    fn require_audit_holder(&self, current: &Request, actor: &ActorContext) -> Result<(), WorkflowError> {
        if actor.is_admin() || current.is_claim_holder(ClaimTrack::Audit, actor.user_id) {
            return Ok(());
        }
        let assigned_expert = current.ip_expert_id == Some(actor.user_id)
            || current.is_claim_holder(ClaimTrack::Ip, actor.user_id);
        if assigned_expert {
            return Err(forbidden("the assigned IP expert may only submit a technical report"));
        }
        match &current.audit_claim {
            Some(c) => Err(forbidden(format!("the audit claim is held by {}", c.holder))),
            None => Err(forbidden("take the audit claim before acting on this request")),
        }
    }

    fn require_ip_consultation(&self, current: &Request, actor: &ActorContext) -> Result<(), WorkflowError> {
        if current.requires_ip_consultation() && !actor.is_admin() {
            return Err(WorkflowError::IpConsultationRequired { request_id: current.id });
        }
        Ok(())
    }

    /// History timestamp for the next row: never earlier than the last one.
    fn stamp(&self, current: &Request) -> Timestamp {
        Timestamp::now().not_before(current.last_action_at().unwrap_or(current.created_at))
    }

    fn commit(
        &self,
        current: &Request,
        mut next: Request,
        action: ActionKind,
        actor: &ActorContext,
        note: Option<String>,
        at: Timestamp,
    ) -> Committed {
        if next.status.is_terminal() {
            next.audit_claim = None;
            next.ip_claim = None;
        }
        if current.status == S::PendingIpResponse && next.status != S::PendingIpResponse {
            next.ip_claim = None;
        }
        next.history.push(RequestAction {
            sequence: u32::try_from(next.history.len()).unwrap_or(u32::MAX),
            actor: actor.user_id,
            role: actor.acting_role(),
            kind: action,
            from_status: Some(current.status),
            to_status: next.status,
            note,
            visible_to_submitter: action.visible_to_submitter(),
            created_at: at,
        });
        next.version = current.version.saturating_add(1);
        next.updated_at = at;
        let effects = effects::plan(Some(current.status), &next, action, actor, at);
        Committed { request: next, effects }
    }
}
