use crate::infra::{AppState, SharedService};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::NaiveDate;
use letting_crm::error::AppError;
use letting_crm::workflows::lettings::{instruction_router, InstructionCard, LettingInstruction};
use serde::Serialize;
use serde_json::json;

/// Instructions needing attention, using the configured thresholds.
#[derive(Debug, Serialize)]
pub(crate) struct LettingAlertsResponse {
    pub(crate) today: NaiveDate,
    pub(crate) stale_listings: Vec<InstructionCard>,
    pub(crate) low_performing: Vec<InstructionCard>,
    pub(crate) leases_expiring: Vec<InstructionCard>,
}

pub(crate) fn with_letting_routes(service: SharedService) -> axum::Router {
    instruction_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/lettings/alerts",
            axum::routing::get(alerts_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn alerts_endpoint(
    Extension(state): Extension<AppState>,
) -> Result<Json<LettingAlertsResponse>, AppError> {
    let thresholds = &state.lettings;
    let service = &state.service;
    let today = service.today();
    let cards = |instructions: Vec<LettingInstruction>| {
        instructions
            .iter()
            .map(|instruction| InstructionCard::from_instruction(instruction, today))
            .collect::<Vec<_>>()
    };

    Ok(Json(LettingAlertsResponse {
        today,
        stale_listings: cards(service.stale_listings(thresholds.stale_listing_days)?),
        low_performing: cards(service.low_performing(thresholds.low_conversion_threshold)?),
        leases_expiring: cards(service.leases_expiring(thresholds.lease_expiry_window_days)?),
    }))
}
