//! # Request Lifecycle API
//!
//! Every mutating handler follows the same shape: take a write ticket, run
//! the workflow engine against the current record, then let
//! [`AppState::commit`] persist the new version, swap it in and dispatch its
//! side effects. A guard failure or a failed database write leaves the
//! stored record untouched.

use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tnr_core::{
    ActorContext, ArtifactRef, ChecklistItemId, CompanyTypeId, ProvinceId, PurposeId, RequestId,
    Role, Timestamp, UserId,
};
use tnr_state::{
    ChecklistFlag, ClaimTrack, InvoiceNumber, IpVerdict, Outcome, PurposeSelection, Request,
    RequestAction, RequestDraft, RequestStatus, WorkflowError,
};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Caller;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, extract_validated_json, request_id, Validate};
use crate::state::AppState;

// -- Request and response bodies ----------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PurposeBody {
    pub purpose_id: u64,
    pub complement: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChecklistBody {
    pub item_id: u64,
    pub fulfilled: bool,
}

/// Body of `POST /v1/requests`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRequestBody {
    /// Proposed trade name.
    pub name: String,
    /// Optional foreign-language name, also checked for collisions.
    pub name_en: Option<String>,
    pub company_type_id: u64,
    pub province_id: u64,
    /// Fee-liable submissions are invoiced and wait for payment.
    #[serde(default)]
    pub fee_liable: bool,
    #[serde(default)]
    pub purposes: Vec<PurposeBody>,
    #[serde(default)]
    pub checklist: Vec<ChecklistBody>,
}

impl Validate for CreateRequestBody {
    fn validate(&self) -> Result<(), String> {
        let mut purposes: Vec<u64> = self.purposes.iter().map(|p| p.purpose_id).collect();
        purposes.sort_unstable();
        if purposes.windows(2).any(|w| w[0] == w[1]) {
            return Err("each business purpose may be selected once".into());
        }
        let mut items: Vec<u64> = self.checklist.iter().map(|c| c.item_id).collect();
        items.sort_unstable();
        if items.windows(2).any(|w| w[0] == w[1]) {
            return Err("each checklist item may be flagged once".into());
        }
        Ok(())
    }
}

impl CreateRequestBody {
    fn into_draft(self) -> Result<RequestDraft, AppError> {
        let purposes = self
            .purposes
            .into_iter()
            .map(|p| {
                Ok(PurposeSelection {
                    purpose_id: PurposeId::new(p.purpose_id)?,
                    complement: p.complement,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        let checklist = self
            .checklist
            .into_iter()
            .map(|c| {
                Ok(ChecklistFlag {
                    item_id: ChecklistItemId::new(c.item_id)?,
                    fulfilled: c.fulfilled,
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(RequestDraft {
            name: self.name,
            name_en: self.name_en,
            company_type_id: CompanyTypeId::new(self.company_type_id)?,
            province_id: ProvinceId::new(self.province_id)?,
            fee_liable: self.fee_liable,
            purposes,
            checklist,
        })
    }
}

/// Body of `POST /v1/requests/:id/payment`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentBody {
    pub receipt_number: String,
    /// File-store reference of the scanned receipt.
    pub receipt_artifact: Option<String>,
}

/// Body of `PUT /v1/requests/:id/transition`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionBody {
    /// Target status name, e.g. `PENDING_IP_RESPONSE`.
    pub target_status: String,
    pub note: Option<String>,
}

/// Body of `POST /v1/requests/:id/ip-report`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IpReportBody {
    #[schema(value_type = String, example = "no_objection")]
    pub verdict: IpVerdict,
    pub feedback: String,
    /// File-store reference of the report document.
    pub report_artifact: String,
}

/// Body of `POST /v1/requests/:id/registry`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegistryBody {
    pub registry_number: String,
    #[schema(value_type = String, example = "2026-10-14")]
    pub registry_date: NaiveDate,
}

/// Body of `POST /v1/requests/:id/strike`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StrikeBody {
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListRequestsQuery {
    /// Filter by status name.
    pub status: Option<String>,
    pub province_id: Option<u64>,
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// A request as returned by the API. History is served separately.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestView {
    #[schema(value_type = u64)]
    pub id: RequestId,
    pub name: String,
    pub name_en: Option<String>,
    #[schema(value_type = u64)]
    pub company_type_id: CompanyTypeId,
    #[schema(value_type = u64)]
    pub province_id: ProvinceId,
    #[schema(value_type = u64)]
    pub submitter: UserId,
    pub fee_liable: bool,
    #[schema(value_type = String, example = "IN_AUDITING")]
    pub status: RequestStatus,
    #[schema(value_type = Option<u64>)]
    pub audit_claim_holder: Option<UserId>,
    #[schema(value_type = Option<u64>)]
    pub ip_claim_holder: Option<UserId>,
    #[schema(value_type = Option<u64>)]
    pub ip_expert_id: Option<UserId>,
    pub audit_feedback: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub ip_report: Option<tnr_state::IpReport>,
    #[schema(value_type = Option<Object>)]
    pub registry: Option<tnr_state::RegistryEntry>,
    #[schema(value_type = Option<Object>)]
    pub invoice: Option<tnr_state::Invoice>,
    #[schema(value_type = Vec<Object>)]
    pub purposes: Vec<PurposeSelection>,
    #[schema(value_type = Vec<Object>)]
    pub checklist: Vec<ChecklistFlag>,
    pub version: u64,
    #[schema(value_type = String)]
    pub created_at: Timestamp,
    #[schema(value_type = String)]
    pub updated_at: Timestamp,
}

impl From<Request> for RequestView {
    fn from(r: Request) -> Self {
        Self {
            audit_claim_holder: r.audit_claim.as_ref().map(|c| c.holder),
            ip_claim_holder: r.ip_claim.as_ref().map(|c| c.holder),
            id: r.id,
            name: r.name,
            name_en: r.name_en,
            company_type_id: r.company_type_id,
            province_id: r.province_id,
            submitter: r.submitter,
            fee_liable: r.fee_liable,
            status: r.status,
            ip_expert_id: r.ip_expert_id,
            audit_feedback: r.audit_feedback,
            ip_report: r.ip_report,
            registry: r.registry,
            invoice: r.invoice,
            purposes: r.purposes,
            checklist: r.checklist,
            version: r.version,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// History of one request, oldest first.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub request_id: u64,
    #[schema(value_type = Vec<Object>)]
    pub entries: Vec<RequestAction>,
}

// -- Router -------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request).get(list_requests))
        .route("/v1/requests/:id", get(get_request))
        .route("/v1/requests/:id/history", get(get_history))
        .route("/v1/requests/:id/payment", post(confirm_payment))
        .route(
            "/v1/requests/:id/claims/:track",
            post(take_claim).delete(release_claim),
        )
        .route("/v1/requests/:id/transition", put(transition))
        .route("/v1/requests/:id/ip-report", post(submit_ip_report))
        .route("/v1/requests/:id/registry", post(finalize_registry))
        .route("/v1/requests/:id/strike", post(strike_name))
}

// -- Helpers ------------------------------------------------------------------

/// Whether `actor` may read `request`. Callers holding only the submitting
/// role see their own requests; everyone else sees all of them.
fn may_view(actor: &ActorContext, request: &Request) -> bool {
    request.submitter == actor.user_id
        || actor.roles.iter().any(|r| *r != Role::ProvincialOfficer)
}

/// Load a request the caller may see. Unknown and hidden look the same.
fn load_visible(state: &AppState, id: RequestId, actor: &ActorContext) -> Result<Request, AppError> {
    state
        .requests
        .get(&id)
        .filter(|r| may_view(actor, r))
        .ok_or_else(|| WorkflowError::NotFound(id).into())
}

fn invoice_in_use<'a>(
    requests: impl IntoIterator<Item = &'a Request>,
    number: &InvoiceNumber,
) -> bool {
    requests
        .into_iter()
        .any(|r| r.invoice.as_ref().is_some_and(|i| &i.number == number))
}

/// Run `op` against the stored request while holding a write ticket, then
/// commit its outcome.
async fn mutate(
    state: &AppState,
    id: RequestId,
    op: impl FnOnce(&Request) -> Result<Outcome, WorkflowError>,
) -> Result<Request, AppError> {
    let ticket = state.begin_write().await;
    let current = state.requests.get(&id).ok_or(WorkflowError::NotFound(id))?;
    let outcome = op(&current)?;
    state.commit(ticket, outcome).await
}

fn artifact(raw: &str) -> Result<ArtifactRef, AppError> {
    Ok(ArtifactRef::new(raw)?)
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/requests
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = CreateRequestBody,
    responses(
        (status = 201, description = "Request created", body = RequestView),
        (status = 403, description = "Caller may not submit for this province", body = crate::error::ErrorBody),
        (status = 409, description = "An equivalent name is reserved", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid input or no fee configured", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn create_request(
    State(state): State<AppState>,
    Caller(actor): Caller,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestView>), AppError> {
    let draft = extract_validated_json(body)?.into_draft()?;
    if !state.knows_company_type(draft.company_type_id) {
        return Err(AppError::Validation(format!(
            "unknown company type {}",
            draft.company_type_id.get()
        )));
    }

    let ticket = state.begin_write().await;
    let id = state.allocate_request_id();
    let committed = state.requests.read_with(|existing| {
        state.engine.create_request(id, draft, &actor, existing, |number| {
            invoice_in_use(existing.values(), number)
        })
    })?;

    let request = state.commit(ticket, Outcome::Committed(committed)).await?;
    Ok((StatusCode::CREATED, Json(request.into())))
}

/// GET /v1/requests
#[utoipa::path(
    get,
    path = "/v1/requests",
    params(ListRequestsQuery),
    responses(
        (status = 200, description = "Requests ordered by id", body = Vec<RequestView>),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn list_requests(
    State(state): State<AppState>,
    Caller(actor): Caller,
    query: Result<Query<ListRequestsQuery>, QueryRejection>,
) -> Result<Json<Vec<RequestView>>, AppError> {
    let query = extract_query(query)?;
    let status = query
        .status
        .as_deref()
        .map(RequestStatus::from_str)
        .transpose()
        .map_err(AppError::Validation)?;
    let province = query.province_id.map(ProvinceId::new).transpose()?;

    let mut matching: Vec<Request> = state
        .requests
        .list()
        .into_iter()
        .filter(|r| may_view(&actor, r))
        .filter(|r| status.map_or(true, |s| r.status == s))
        .filter(|r| province.map_or(true, |p| r.province_id == p))
        .collect();
    matching.sort_by_key(|r| r.id);

    let page = super::paginate(matching, query.limit, query.offset);
    Ok(Json(page.into_iter().map(RequestView::from).collect()))
}

/// GET /v1/requests/:id
#[utoipa::path(
    get,
    path = "/v1/requests/{id}",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "The request", body = RequestView),
        (status = 404, description = "Unknown request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn get_request(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
) -> Result<Json<RequestView>, AppError> {
    let request = load_visible(&state, request_id(id)?, &actor)?;
    Ok(Json(request.into()))
}

/// GET /v1/requests/:id/history
#[utoipa::path(
    get,
    path = "/v1/requests/{id}/history",
    params(("id" = u64, Path, description = "Request id")),
    responses(
        (status = 200, description = "History rows visible to the caller", body = HistoryResponse),
        (status = 404, description = "Unknown request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn get_history(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
) -> Result<Json<HistoryResponse>, AppError> {
    let request = load_visible(&state, request_id(id)?, &actor)?;
    Ok(Json(HistoryResponse {
        request_id: request.id.get(),
        entries: request.history_for(&actor),
    }))
}

/// POST /v1/requests/:id/payment
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/payment",
    params(("id" = u64, Path, description = "Request id")),
    request_body = PaymentBody,
    responses(
        (status = 200, description = "Payment recorded, request in audit", body = RequestView),
        (status = 403, description = "Caller is not the submitter", body = crate::error::ErrorBody),
        (status = 409, description = "Already paid under another receipt, or no invoice", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn confirm_payment(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let body = extract_json(body)?;
    let receipt_artifact = body.receipt_artifact.as_deref().map(artifact).transpose()?;
    let request = mutate(&state, id, |current| {
        state
            .engine
            .confirm_payment(current, &body.receipt_number, receipt_artifact, &actor)
    })
    .await?;
    Ok(Json(request.into()))
}

fn claim_track(raw: &str) -> Result<ClaimTrack, AppError> {
    ClaimTrack::from_str(raw).map_err(AppError::Validation)
}

/// POST /v1/requests/:id/claims/:track
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/claims/{track}",
    params(
        ("id" = u64, Path, description = "Request id"),
        ("track" = String, Path, description = "`audit` or `ip`"),
    ),
    responses(
        (status = 200, description = "Caller holds the claim", body = RequestView),
        (status = 403, description = "Caller lacks the claim capability", body = crate::error::ErrorBody),
        (status = 409, description = "Claim held by someone else, or wrong status", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub(crate) async fn take_claim(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((id, track)): Path<(u64, String)>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let track = claim_track(&track)?;
    let request = mutate(&state, id, |current| state.engine.take_claim(current, track, &actor)).await?;
    Ok(Json(request.into()))
}

/// DELETE /v1/requests/:id/claims/:track
#[utoipa::path(
    delete,
    path = "/v1/requests/{id}/claims/{track}",
    params(
        ("id" = u64, Path, description = "Request id"),
        ("track" = String, Path, description = "`audit` or `ip`"),
    ),
    responses(
        (status = 200, description = "Claim released", body = RequestView),
        (status = 403, description = "Caller does not hold the claim", body = crate::error::ErrorBody),
    ),
    tag = "claims"
)]
pub(crate) async fn release_claim(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((id, track)): Path<(u64, String)>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let track = claim_track(&track)?;
    let request =
        mutate(&state, id, |current| state.engine.release_claim(current, track, &actor)).await?;
    Ok(Json(request.into()))
}

/// PUT /v1/requests/:id/transition
#[utoipa::path(
    put,
    path = "/v1/requests/{id}/transition",
    params(("id" = u64, Path, description = "Request id")),
    request_body = TransitionBody,
    responses(
        (status = 200, description = "Transition committed", body = RequestView),
        (status = 403, description = "Caller may not perform this transition", body = crate::error::ErrorBody),
        (status = 409, description = "Illegal transition, leadership lock or mandatory IP consultation", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn transition(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
    body: Result<Json<TransitionBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let body = extract_json(body)?;
    let target = RequestStatus::from_str(&body.target_status).map_err(AppError::Validation)?;
    let request = mutate(&state, id, |current| {
        state
            .engine
            .transition(current, target, &actor, body.note.as_deref())
            .map(Outcome::from)
    })
    .await?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/ip-report
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/ip-report",
    params(("id" = u64, Path, description = "Request id")),
    request_body = IpReportBody,
    responses(
        (status = 200, description = "Report recorded", body = RequestView),
        (status = 403, description = "Caller does not hold the IP claim", body = crate::error::ErrorBody),
        (status = 409, description = "Request is not pending IP review", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub(crate) async fn submit_ip_report(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
    body: Result<Json<IpReportBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let body = extract_json(body)?;
    let report = artifact(&body.report_artifact)?;
    let request = mutate(&state, id, |current| {
        state
            .engine
            .submit_ip_report(current, body.verdict, &body.feedback, report, &actor)
            .map(Outcome::from)
    })
    .await?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/registry
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/registry",
    params(("id" = u64, Path, description = "Request id")),
    request_body = RegistryBody,
    responses(
        (status = 200, description = "Registry entry recorded", body = RequestView),
        (status = 403, description = "Caller is not a registry officer", body = crate::error::ErrorBody),
        (status = 409, description = "Already finalized or not reserved", body = crate::error::ErrorBody),
    ),
    tag = "registry"
)]
pub(crate) async fn finalize_registry(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
    body: Result<Json<RegistryBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let body = extract_json(body)?;
    let date = Timestamp::from_date(body.registry_date);
    let request = mutate(&state, id, |current| {
        state
            .engine
            .finalize_registry(current, &body.registry_number, date, &actor)
            .map(Outcome::from)
    })
    .await?;
    Ok(Json(request.into()))
}

/// POST /v1/requests/:id/strike
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/strike",
    params(("id" = u64, Path, description = "Request id")),
    request_body = StrikeBody,
    responses(
        (status = 200, description = "Name struck and released", body = RequestView),
        (status = 403, description = "Caller may not strike names", body = crate::error::ErrorBody),
        (status = 409, description = "Name is not reserved", body = crate::error::ErrorBody),
    ),
    tag = "registry"
)]
pub(crate) async fn strike_name(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(id): Path<u64>,
    body: Result<Json<StrikeBody>, JsonRejection>,
) -> Result<Json<RequestView>, AppError> {
    let id = request_id(id)?;
    let body = extract_json(body)?;
    let request = mutate(&state, id, |current| {
        state
            .engine
            .release_name(current, &actor, body.note.as_deref())
            .map(Outcome::from)
    })
    .await?;
    Ok(Json(request.into()))
}
