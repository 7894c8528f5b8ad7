//! End-to-end handler tests: the real router mounted on the in-memory
//! store, driven with oneshot requests. Verifies the outcome-to-status
//! mapping and the response envelope the UI depends on.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use terriertable_server::routes::create_routes;
use terriertable_server::service::ReservationService;
use terriertable_server::state::AppState;
use terriertable_server::store::MemoryStore;

const HOST_TOKEN: &str = "host-token";
const STUDENT_TOKEN: &str = "student-token";

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    store.insert_session(HOST_TOKEN, Uuid::new_v4());
    store.insert_session(STUDENT_TOKEN, Uuid::new_v4());

    let state = AppState {
        events: store.clone(),
        reservations: Arc::new(ReservationService::new(store.clone())),
        identity: store.clone(),
    };
    (create_routes(state), store)
}

fn event_body() -> Value {
    json!({
        "title": "Hackathon Leftovers",
        "description": "Come grab dinner",
        "location": "Photonics Atrium",
        "campus": ["East Campus"],
        "dietary": ["Halal", "Vegetarian"],
        "event_date": Utc::now().date_naive() + Duration::days(1),
        "pickup_start": "18:00:00",
        "pickup_end": "19:30:00",
        "food_items": [
            {"name": "Pizza", "quantity": 3},
            {"name": "Salad", "quantity": 0}
        ]
    })
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_event(app: &Router) -> Value {
    let (status, body) = send(
        app,
        request("POST", "/events", Some(HOST_TOKEN), Some(event_body())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    body["data"].clone()
}

#[tokio::test]
async fn health_check_reports_service_name() {
    let (app, _) = test_app();
    let (status, body) = send(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["service"], json!("terriertable-api"));
}

#[tokio::test]
async fn event_creation_requires_authentication() {
    let (app, _) = test_app();
    let (status, body) = send(&app, request("POST", "/events", None, Some(event_body()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("AUTH_ERROR"));
}

#[tokio::test]
async fn created_event_lists_with_campus_filter() {
    let (app, _) = test_app();
    create_event(&app).await;

    let (status, body) = send(&app, request("GET", "/events?campus=east", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, request("GET", "/events?campus=west", None, None)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reserving_returns_authoritative_remaining_quantity() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": item_id, "quantity": 2})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["remaining_quantity"], json!(1));
    assert_eq!(body["data"]["reservation"]["quantity"], json!(2));
}

#[tokio::test]
async fn anonymous_reservation_is_unauthorized() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            None,
            Some(json!({"food_item_id": item_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("AUTH_ERROR"));
}

#[tokio::test]
async fn sold_out_maps_to_conflict_with_specific_code() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    // "Salad" was created with quantity 0.
    let item_id = event["food_items"][1]["id"].clone();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": item_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("SOLD_OUT"));
}

#[tokio::test]
async fn reserving_against_unknown_event_is_event_not_found() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{}/reservations", Uuid::new_v4()),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": Uuid::new_v4()})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("EVENT_NOT_FOUND"));
}

#[tokio::test]
async fn reserving_unknown_item_on_real_event_is_item_not_found() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": Uuid::new_v4()})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("FOOD_ITEM_NOT_FOUND"));
}

#[tokio::test]
async fn zero_quantity_is_a_validation_error() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let (status, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": item_id, "quantity": 0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
}

#[tokio::test]
async fn cancel_flow_restores_and_rejects_double_cancel() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let (_, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": item_id, "quantity": 2})),
        ),
    )
    .await;
    let reservation_id = body["data"]["reservation"]["id"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &app,
        request(
            "DELETE",
            &format!("/reservations/{reservation_id}"),
            Some(STUDENT_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remaining_quantity"], json!(3));

    let (status, body) = send(
        &app,
        request(
            "DELETE",
            &format!("/reservations/{reservation_id}"),
            Some(STUDENT_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("ALREADY_CANCELLED"));
}

#[tokio::test]
async fn strangers_cannot_cancel_other_peoples_reservations() {
    let (app, store) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let (_, body) = send(
        &app,
        request(
            "POST",
            &format!("/events/{event_id}/reservations"),
            Some(STUDENT_TOKEN),
            Some(json!({"food_item_id": item_id})),
        ),
    )
    .await;
    let reservation_id = body["data"]["reservation"]["id"].as_str().unwrap().to_owned();

    store.insert_session("stranger-token", Uuid::new_v4());
    let (status, body) = send(
        &app,
        request(
            "DELETE",
            &format!("/reservations/{reservation_id}"),
            Some("stranger-token"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], json!("FORBIDDEN"));
}

#[tokio::test]
async fn my_reservations_returns_own_history_newest_first() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    for _ in 0..2 {
        let (status, _) = send(
            &app,
            request(
                "POST",
                &format!("/events/{event_id}/reservations"),
                Some(STUDENT_TOKEN),
                Some(json!({"food_item_id": item_id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        request("GET", "/reservations/mine", Some(STUDENT_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Another user sees nothing of it.
    let (_, body) = send(
        &app,
        request("GET", "/reservations/mine", Some(HOST_TOKEN), None),
    )
    .await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn owner_edit_resets_quantities_through_the_update_path() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();
    let item_id = event["food_items"][0]["id"].clone();

    let mut update = event_body();
    update["food_items"] = json!([
        {"id": item_id, "name": "Pizza", "quantity": 10}
    ]);

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/events/{event_id}"),
            Some(HOST_TOKEN),
            Some(update),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["food_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["remaining_quantity"], json!(10));
    assert_eq!(items[0]["total_quantity"], json!(10));
}

#[tokio::test]
async fn only_the_owner_may_edit_or_delete() {
    let (app, _) = test_app();
    let event = create_event(&app).await;
    let event_id = event["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("/events/{event_id}"),
            Some(STUDENT_TOKEN),
            Some(event_body()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "DELETE",
            &format!("/events/{event_id}"),
            Some(STUDENT_TOKEN),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/events/{event_id}"), Some(HOST_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("GET", &format!("/events/{event_id}"), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], json!("EVENT_NOT_FOUND"));
}
