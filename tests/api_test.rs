use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use leadflow::api::{AppState, router};
use leadflow::config::Config;
use leadflow::engine::{EngineSettings, LeadEngine};

/// Creates a minimal config for testing
fn create_test_config() -> Config {
    let config_toml = r#"
[server]
bind_addr = "127.0.0.1:0"
max_batch_size = 3

[notifications]
enabled = false
    "#;

    toml::from_str(config_toml).expect("Failed to parse test config")
}

/// Builds a test app over the in-memory store
fn build_test_app() -> Router {
    let config = create_test_config();
    let engine = LeadEngine::in_memory(config.engine_settings());
    router(AppState::new(config, engine))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method(method)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Leadflow-Actor", "dana")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = ServiceExt::<Request<Body>>::oneshot(app.clone(), request)
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn lead_body(service: &str) -> Value {
    json!({
        "customer": { "name": "Riley Park", "phone": "555-0110" },
        "address": "12 Elm St, Sacramento, CA 95814",
        "service": service
    })
}

fn vendor_body(name: &str, services: &[&str], quota: u32) -> Value {
    json!({
        "user": { "name": name, "email": format!("{}@example.com", name.to_lowercase()) },
        "business_name": name,
        "services": services,
        "address": "1 Depot Ave, Sacramento, CA",
        "rating": 4.5,
        "quota": quota
    })
}

async fn create_lead(app: &Router, service: &str) -> String {
    let (status, body) = send(app, json_request("POST", "/leads", lead_body(service))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn register_vendor(app: &Router, name: &str, services: &[&str], quota: u32) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/vendors", vendor_body(name, services, quota)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = build_test_app();
    let (status, body) = send(&app, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["leads"], 0);
    assert_eq!(body["data"]["metrics"]["leads_assigned"], 0);
}

#[tokio::test]
async fn test_create_and_get_lead() {
    let app = build_test_app();
    let lead_id = create_lead(&app, "Plumbing").await;

    let (status, body) = send(&app, get_request(&format!("/leads/{lead_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["city"], "Sacramento");
    assert_eq!(body["data"]["is_assigned"], false);
}

#[tokio::test]
async fn test_create_lead_validation_error() {
    let app = build_test_app();
    let (status, body) = send(&app, json_request("POST", "/leads", lead_body(""))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_json_is_validation_error() {
    let app = build_test_app();
    let request = Request::builder()
        .uri("/leads")
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_unknown_lead() {
    let app = build_test_app();
    let (status, body) = send(&app, get_request("/leads/does-not-exist")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_assign_by_service() {
    let app = build_test_app();
    let small = register_vendor(&app, "Small", &["Plumbing"], 2).await;
    let large = register_vendor(&app, "Large", &["Plumbing"], 5).await;
    let mut leads = Vec::new();
    for _ in 0..3 {
        leads.push(create_lead(&app, "Plumbing").await);
    }

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/leads/assign",
            json!({ "lead_ids": leads, "strategy": { "type": "by_service" } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["assigned_count"], 3);
    assert_eq!(data["unassigned_count"], 0);
    assert_eq!(data["per_vendor_counts"][&large], 3);
    assert!(data["per_vendor_counts"].get(&small).is_none());
    assert_eq!(data["summary"], "Large: 3 leads");

    let (_, vendor) = send(&app, get_request(&format!("/vendors/{large}"))).await;
    assert_eq!(vendor["data"]["used"], 3);
    let history = vendor["data"]["history"].as_array().unwrap();
    assert_eq!(history.last().unwrap()["type"], "assign");
    assert_eq!(history.last().unwrap()["performed_by"], "dana");
}

#[tokio::test]
async fn test_assign_over_batch_limit() {
    let app = build_test_app();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/leads/assign",
            json!({
                "lead_ids": ["a", "b", "c", "d"],
                "strategy": { "type": "all_available" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_quota_adjustments() {
    let app = build_test_app();
    let vendor = register_vendor(&app, "Quill", &["Roofing"], 50).await;
    let uri = format!("/vendors/{vendor}/quota");

    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({ "type": "add", "count": 20 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quota"], 70);
    let entry = body["data"]["history"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(entry["type"], "add");
    assert_eq!(entry["count"], 20);
    assert_eq!(entry["before_quota"], 50);
    assert_eq!(entry["after_quota"], 70);

    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({ "type": "remove", "count": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("cannot remove more than current quota")
    );

    let (status, body) = send(
        &app,
        json_request("POST", &uri, json!({ "type": "add", "count": u32::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = send(&app, get_request(&format!("/vendors/{vendor}"))).await;
    assert_eq!(body["data"]["quota"], 70);
}

#[tokio::test]
async fn test_status_update_and_filters() {
    let app = build_test_app();
    let first = create_lead(&app, "Plumbing").await;
    create_lead(&app, "Roofing").await;

    let (status, body) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/leads/{first}/status"),
            json!({ "status": "contacted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "contacted");
    assert_eq!(body["data"]["progress_history"][0]["performed_by"], "dana");

    let (status, body) = send(&app, get_request("/leads?status=contacted")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], first.as_str());

    let (_, body) = send(&app, get_request("/leads/summary")).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["unassigned"], 2);
    assert_eq!(body["data"]["status_breakdown"]["contacted"], 1);

    let (status, _) = send(&app, get_request("/leads?status=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_vendors_available_only() {
    let app = build_test_app();
    register_vendor(&app, "Empty", &["Hvac"], 0).await;
    let stocked = register_vendor(&app, "Stocked", &["Hvac"], 3).await;

    let (_, body) = send(&app, get_request("/vendors")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get_request("/vendors?service=hvac&available_only=true")).await;
    let vendors = body["data"].as_array().unwrap();
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0]["id"], stocked.as_str());
}

#[tokio::test]
async fn test_bulk_missing_payload_field() {
    let app = build_test_app();
    let lead = create_lead(&app, "Plumbing").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/leads/bulk",
            json!({ "lead_ids": [lead], "action": "update_status" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_bulk_export_and_partial_failure() {
    let app = build_test_app();
    let lead = create_lead(&app, "Plumbing").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/leads/bulk",
            json!({
                "lead_ids": [lead, "ghost"],
                "action": "export",
                "payload": { "format": "csv" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["succeeded"].as_array().unwrap().len(), 1);
    assert_eq!(data["failed"][0]["lead_id"], "ghost");
    assert_eq!(data["export"]["rows"], 1);
    assert_eq!(data["export"]["format"], "csv");
}
