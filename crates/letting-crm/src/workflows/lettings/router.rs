use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::domain::{InstructionId, Lead, LeadId, PropertyId, TransitionError};
use super::instruction::LettingInstruction;
use super::instruction_status::InstructionStatus;
use super::lead_status::LeadStatus;
use super::repository::{InstructionRepository, RepositoryError};
use super::service::{
    AdvertisingDetails, LeaseConversion, LettingInstructionService, LettingServiceError,
    NewInstruction,
};

type SharedService<R> = Arc<LettingInstructionService<R>>;

/// Router builder exposing the letting instruction lifecycle over HTTP.
pub fn instruction_router<R>(service: SharedService<R>) -> Router
where
    R: InstructionRepository + 'static,
{
    Router::new()
        .route("/api/v1/lettings/instructions", post(create_handler::<R>))
        .route(
            "/api/v1/lettings/instructions/:id",
            get(get_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/advertise",
            post(advertise_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/viewings",
            post(viewings_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/offer-made",
            post(offer_made_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/offer-accepted",
            post(offer_accepted_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/transition",
            post(transition_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/lease",
            post(lease_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/close",
            post(close_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/cancel",
            post(cancel_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/relist",
            post(relist_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/leads",
            post(add_lead_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/leads/:lead_id",
            delete(remove_lead_handler::<R>),
        )
        .route(
            "/api/v1/lettings/instructions/:id/leads/:lead_id/status",
            post(lead_status_handler::<R>),
        )
        .route(
            "/api/v1/lettings/properties/:property_id/history",
            get(history_handler::<R>),
        )
        .route("/api/v1/lettings/active", get(active_handler::<R>))
        .route("/api/v1/lettings/status/:status", get(by_status_handler::<R>))
        .route("/api/v1/lettings/search/:term", get(search_handler::<R>))
        .route("/api/v1/lettings/summary", get(summary_handler::<R>))
        .route("/api/v1/lettings/board", get(board_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferAcceptedRequest {
    pub(crate) agreed_rent: Decimal,
    #[serde(default)]
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    pub(crate) status: InstructionStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeadStatusRequest {
    pub(crate) status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReasonRequest {
    pub(crate) reason: String,
}

/// Caller-supplied lead. `status` goes through strict parsing, so an unknown value is
/// rejected rather than defaulted.
#[derive(Debug, Deserialize)]
pub(crate) struct NewLeadRequest {
    pub(crate) id: LeadId,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) enquired_at: Option<NaiveDateTime>,
}

pub(crate) async fn create_handler<R>(
    State(service): State<SharedService<R>>,
    Json(request): Json<NewInstruction>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    match service.create(request) {
        Ok(instruction) => (StatusCode::CREATED, Json(instruction)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.get(InstructionId(id)))
}

pub(crate) async fn advertise_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    body: Option<Json<AdvertisingDetails>>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    let details = body.map(|Json(details)| details).unwrap_or_default();
    respond(service.advertise(InstructionId(id), details))
}

pub(crate) async fn viewings_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.move_to_viewings(InstructionId(id)))
}

pub(crate) async fn offer_made_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.mark_offer_made(InstructionId(id)))
}

pub(crate) async fn offer_accepted_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<OfferAcceptedRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.accept_offer(
        InstructionId(id),
        request.agreed_rent,
        request.notes.as_deref(),
    ))
}

pub(crate) async fn transition_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<TransitionRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.transition(InstructionId(id), request.status))
}

pub(crate) async fn lease_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<LeaseConversion>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.convert_to_active_lease(InstructionId(id), request))
}

pub(crate) async fn close_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.close(InstructionId(id), &request.reason))
}

pub(crate) async fn cancel_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<ReasonRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.cancel(InstructionId(id), &request.reason))
}

pub(crate) async fn relist_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.relist(InstructionId(id)))
}

pub(crate) async fn add_lead_handler<R>(
    State(service): State<SharedService<R>>,
    Path(id): Path<u64>,
    Json(request): Json<NewLeadRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    let status = match LeadStatus::from_value(request.status.as_deref()) {
        Ok(status) => status,
        Err(err) => return unprocessable(err),
    };

    let enquired_at = request
        .enquired_at
        .unwrap_or_else(|| service.today().and_time(chrono::NaiveTime::MIN));
    let mut lead = Lead::new(request.id, request.name, enquired_at).with_status(status);
    lead.email = request.email;
    lead.phone = request.phone;

    respond(service.add_lead(InstructionId(id), lead))
}

pub(crate) async fn remove_lead_handler<R>(
    State(service): State<SharedService<R>>,
    Path((id, lead_id)): Path<(u64, u64)>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond(service.remove_lead(InstructionId(id), LeadId(lead_id)))
}

pub(crate) async fn lead_status_handler<R>(
    State(service): State<SharedService<R>>,
    Path((id, lead_id)): Path<(u64, u64)>,
    Json(request): Json<LeadStatusRequest>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    let status = match LeadStatus::from_value(Some(&request.status)) {
        Ok(status) => status,
        Err(err) => return unprocessable(err),
    };
    respond(service.update_lead_status(InstructionId(id), LeadId(lead_id), status))
}

pub(crate) async fn history_handler<R>(
    State(service): State<SharedService<R>>,
    Path(property_id): Path<u64>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond_list(service.history(PropertyId(property_id)))
}

pub(crate) async fn active_handler<R>(State(service): State<SharedService<R>>) -> Response
where
    R: InstructionRepository + 'static,
{
    respond_list(service.active_instructions())
}

pub(crate) async fn by_status_handler<R>(
    State(service): State<SharedService<R>>,
    Path(status): Path<String>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    match status.parse::<InstructionStatus>() {
        Ok(status) => respond_list(service.by_status(status)),
        Err(err) => unprocessable(err),
    }
}

pub(crate) async fn search_handler<R>(
    State(service): State<SharedService<R>>,
    Path(term): Path<String>,
) -> Response
where
    R: InstructionRepository + 'static,
{
    respond_list(service.search(&term))
}

pub(crate) async fn summary_handler<R>(State(service): State<SharedService<R>>) -> Response
where
    R: InstructionRepository + 'static,
{
    match service.summary() {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn board_handler<R>(State(service): State<SharedService<R>>) -> Response
where
    R: InstructionRepository + 'static,
{
    match service.board() {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(err) => error_response(err),
    }
}

fn respond(result: Result<LettingInstruction, LettingServiceError>) -> Response {
    match result {
        Ok(instruction) => (StatusCode::OK, Json(instruction)).into_response(),
        Err(err) => error_response(err),
    }
}

fn respond_list(result: Result<Vec<LettingInstruction>, LettingServiceError>) -> Response {
    match result {
        Ok(instructions) => (StatusCode::OK, Json(instructions)).into_response(),
        Err(err) => error_response(err),
    }
}

fn unprocessable(err: impl std::error::Error) -> Response {
    let payload = json!({ "error": err.to_string() });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

pub(crate) fn error_response(err: LettingServiceError) -> Response {
    let status = match &err {
        LettingServiceError::Repository(RepositoryError::NotFound)
        | LettingServiceError::LeadNotFound(_) => StatusCode::NOT_FOUND,
        LettingServiceError::Transition(TransitionError::Instruction { .. })
        | LettingServiceError::Transition(TransitionError::Lead { .. })
        | LettingServiceError::Repository(RepositoryError::StaleVersion { .. })
        | LettingServiceError::Repository(RepositoryError::Conflict)
        | LettingServiceError::Repository(RepositoryError::ActiveInstruction { .. })
        | LettingServiceError::ActiveInstructionExists { .. }
        | LettingServiceError::DuplicateLead(_)
        | LettingServiceError::LeadsNotAccepted { .. } => StatusCode::CONFLICT,
        LettingServiceError::InvalidLeaseDates { .. }
        | LettingServiceError::InvalidLeaseLength
        | LettingServiceError::NegativeAmount { .. }
        | LettingServiceError::ReportWindowOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LettingServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
