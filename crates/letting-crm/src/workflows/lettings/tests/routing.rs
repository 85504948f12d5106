use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::lettings::lead_status::LeadStatus;
use crate::workflows::lettings::router::{get_handler, instruction_router};
use crate::workflows::lettings::service::LettingInstructionService;

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn create_route_returns_created_instruction() {
    let (service, _) = build_service();
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            "/api/v1/lettings/instructions",
            json!({
                "property": { "id": 42, "name": "Flat 42, Boden House", "address_line1": null },
                "target_rent": "1250",
                "target_lease_length_months": 12
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("INSTRUCTION_RECEIVED"));
    assert_eq!(payload["instruction_reference"], json!("INST-42-20250602"));
}

#[tokio::test]
async fn illegal_transition_maps_to_conflict() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/offer-made", created.id()),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("INSTRUCTION_RECEIVED"));
}

#[tokio::test]
async fn transition_route_walks_the_table() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/transition", created.id()),
            json!({ "status": "ADVERTISING" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], json!("ADVERTISING"));
    assert_eq!(payload["version"], json!(1));
}

#[tokio::test]
async fn unknown_lead_status_is_unprocessable() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/leads", created.id()),
            json!({ "id": 1, "name": "Priya Shah", "status": "bogus" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn lead_route_accepts_known_status() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/leads", created.id()),
            json!({ "id": 1, "name": "Priya Shah", "status": "Viewing-Scheduled" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["leads"][0]["status"], json!("viewing-scheduled"));
}

#[tokio::test]
async fn board_route_lists_every_column() {
    let (service, _) = build_service();
    service.create(new_instruction(42)).expect("create");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::get("/api/v1/lettings/board")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let columns = payload["columns"].as_array().expect("columns");
    assert_eq!(columns.len(), 5);
    assert_eq!(columns[0]["cards"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn get_handler_returns_not_found_for_unknown_id() {
    let (service, _) = build_service();

    let response = get_handler(State(Arc::new(service)), Path(u64::MAX)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_handler_reports_repository_outage() {
    let service = Arc::new(LettingInstructionService::new(Arc::new(
        UnavailableRepository,
    )));

    let response = get_handler::<UnavailableRepository>(State(service), Path(1)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn advertise_route_stores_marketing_copy() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/advertise", created.id()),
            json!({
                "start_date": "2025-05-30",
                "key_features": "Parking space",
                "marketing_notes": "Photos booked"
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["advertising_start_date"], json!("2025-05-30"));
    assert_eq!(payload["target"]["key_features"], json!("Parking space"));
    assert_eq!(payload["marketing_notes"], json!("Photos booked"));
}

#[tokio::test]
async fn repeated_lead_id_maps_to_conflict() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    service
        .add_lead(created.id(), lead(1, LeadStatus::Enquiry))
        .expect("lead");
    let router = instruction_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/lettings/instructions/{}/leads", created.id()),
            json!({ "id": 1, "name": "Priya Shah" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn lead_routes_update_status_and_detach() {
    let (service, _) = build_service();
    let created = service.create(new_instruction(42)).expect("create");
    service
        .start_advertising(created.id(), None)
        .expect("advertise");
    service
        .add_lead(created.id(), lead(3, LeadStatus::Enquiry))
        .expect("lead");
    let router = instruction_router(Arc::new(service));
    let lead_uri = format!("/api/v1/lettings/instructions/{}/leads/3", created.id());

    let rejected = router
        .clone()
        .oneshot(post_json(
            &format!("{lead_uri}/status"),
            json!({ "status": "shortlisted" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let updated = router
        .clone()
        .oneshot(post_json(
            &format!("{lead_uri}/status"),
            json!({ "status": "interested" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(updated.status(), StatusCode::OK);
    let payload = read_json_body(updated).await;
    assert_eq!(payload["leads"][0]["status"], json!("interested"));

    let detached = router
        .clone()
        .oneshot(
            Request::delete(lead_uri.as_str())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(detached.status(), StatusCode::OK);
    let payload = read_json_body(detached).await;
    assert_eq!(payload["leads"], json!([]));
    assert_eq!(payload["metrics"]["number_of_enquiries"], json!(0));

    let missing = router
        .oneshot(
            Request::delete(lead_uri.as_str())
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_routes_cover_history_status_active_and_search() {
    let (service, _) = build_service();
    let first = service.create(new_instruction(42)).expect("create");
    service.close(first.id(), "WITHDRAWN").expect("close");
    let second = service.create(new_instruction(42)).expect("create again");
    service
        .start_advertising(second.id(), None)
        .expect("advertise");
    let router = instruction_router(Arc::new(service));

    let history = router
        .clone()
        .oneshot(get("/api/v1/lettings/properties/42/history"))
        .await
        .expect("route executes");
    assert_eq!(history.status(), StatusCode::OK);
    let payload = read_json_body(history).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(2));

    let advertising = router
        .clone()
        .oneshot(get("/api/v1/lettings/status/ADVERTISING"))
        .await
        .expect("route executes");
    let payload = read_json_body(advertising).await;
    assert_eq!(payload[0]["id"], json!(second.id().0));

    let unknown_status = router
        .clone()
        .oneshot(get("/api/v1/lettings/status/ON_HOLD"))
        .await
        .expect("route executes");
    assert_eq!(unknown_status.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let active = router
        .clone()
        .oneshot(get("/api/v1/lettings/active"))
        .await
        .expect("route executes");
    let payload = read_json_body(active).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let search = router
        .oneshot(get("/api/v1/lettings/search/boden%20house"))
        .await
        .expect("route executes");
    assert_eq!(search.status(), StatusCode::OK);
    let payload = read_json_body(search).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(2));
}
