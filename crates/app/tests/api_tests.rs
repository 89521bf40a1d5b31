//! Integration tests for the journeyd HTTP API

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

use app::{AppState, build_router};
use journey_core::time::fixed_now;
use services::{AppServices, Clock};

/// Test helper: router over fresh in-memory storage
fn setup_app() -> axum::Router {
    let services = AppServices::in_memory(Clock::fixed(fixed_now()));
    build_router(AppState::new(&services))
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

fn sample_journey() -> Value {
    json!({
        "name": "Brave voice",
        "steps": [
            {
                "title": "Sounds",
                "session_ids": ["s1", "s2", "s3"],
                "required_count": 2,
                "trophy": { "name": "Bronze" }
            },
            {
                "title": "Words",
                "session_ids": ["s4"]
            }
        ]
    })
}

async fn complete(app: &axum::Router, session: &str) {
    let (status, _) = send(
        app,
        json_request(
            "PUT",
            &format!("/api/students/kid/sessions/{session}"),
            &json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app();
    let (status, body) = send(&app, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "journeyd");
}

#[tokio::test]
async fn test_missing_journey_is_null() {
    let app = setup_app();
    let (status, body) = send(&app, empty_request("GET", "/api/students/kid/journey")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test]
async fn test_create_then_conflict() {
    let app = setup_app();
    let (status, body) = send(
        &app,
        json_request("POST", "/api/students/kid/journey", &sample_journey()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Brave voice");
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/students/kid/journey", &sample_journey()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_invalid_journey_is_bad_request() {
    let app = setup_app();
    let overlapping = json!({
        "name": "Broken",
        "steps": [
            { "title": "A", "session_ids": ["s1"] },
            { "title": "B", "session_ids": ["s1"] }
        ]
    });
    let (status, body) = send(
        &app,
        json_request("POST", "/api/students/kid/journey", &overlapping),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("s1"));

    let (status, _) = send(
        &app,
        json_request("POST", "/api/students/kid/journey", &json!({ "name": "Empty" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_completion_drives_progress_and_claim() {
    let app = setup_app();
    send(
        &app,
        json_request("POST", "/api/students/kid/journey", &sample_journey()),
    )
    .await;

    let claim_uri = "/api/students/kid/journey/steps/1/claim";
    let (status, _) = send(&app, empty_request("POST", claim_uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    complete(&app, "s1").await;
    let (_, body) = send(&app, empty_request("GET", "/api/students/kid/journey")).await;
    assert_eq!(body["progress"]["steps"][0]["progress_percentage"], 50);
    assert_eq!(body["progress"]["steps"][1]["is_unlocked"], false);

    complete(&app, "s3").await;
    let (_, body) = send(&app, empty_request("GET", "/api/students/kid/journey")).await;
    assert_eq!(body["progress"]["steps"][0]["is_completed"], true);
    assert_eq!(body["progress"]["steps"][0]["can_claim"], true);
    assert_eq!(body["progress"]["steps"][1]["is_unlocked"], true);

    let (status, body) = send(&app, empty_request("POST", claim_uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bronze");
    assert!(body["claimed_at"].is_string());

    let (status, _) = send(&app, empty_request("POST", claim_uri)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        empty_request("POST", "/api/students/kid/journey/steps/7/claim"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_replace_and_reset() {
    let app = setup_app();
    complete(&app, "s4").await;
    send(
        &app,
        json_request("POST", "/api/students/kid/journey", &sample_journey()),
    )
    .await;

    let (status, body) = send(
        &app,
        empty_request("POST", "/api/students/kid/journey/sync"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], false);

    let mut edited = sample_journey();
    edited["name"] = json!("Brave voice 2");
    let (status, body) = send(
        &app,
        json_request("PUT", "/api/students/kid/journey", &edited),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Brave voice 2");

    let (status, body) = send(
        &app,
        json_request(
            "PUT",
            "/api/students/kid/journey/active",
            &json!({ "active": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], false);

    let (status, body) = send(&app, empty_request("DELETE", "/api/students/kid/journey")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = send(
        &app,
        json_request("PUT", "/api/students/kid/journey", &edited),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_listed_per_student() {
    let app = setup_app();
    complete(&app, "s2").await;
    complete(&app, "s1").await;

    let (status, body) = send(&app, empty_request("GET", "/api/students/kid/sessions")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["s1", "s2"]);

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/api/students/other/sessions/s1",
            &json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
