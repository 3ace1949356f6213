use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot` method
use vanguard_webcheck::core::catalogue::{Catalogue, JobDefinition, ProbeReply, probe_fn};
use vanguard_webcheck::core::error::ProbeError;
use vanguard_webcheck::core::models::AddressKind;
use vanguard_webcheck::core::orchestrator::{DISABLED_MESSAGE, Orchestrator};
use vanguard_webcheck::server::adapter::{Platform, adapter_for};
use vanguard_webcheck::server::{ApiState, build_router};

const URL: &[AddressKind] = &[AddressKind::Url];
const ANY: &[AddressKind] = &[AddressKind::Url, AddressKind::Ipv4, AddressKind::Ipv6];

fn catalogue() -> Arc<Catalogue> {
    Arc::new(Catalogue::new([
        JobDefinition::new(
            "echo",
            ANY,
            probe_fn(|address| async move { ProbeReply::data(&json!({ "host": address.host() })) }),
        ),
        JobDefinition::new(
            "broken",
            URL,
            probe_fn(|_| async { Err(ProbeError::failed("certificate expired")) }),
        ),
        JobDefinition::new(
            "slow",
            URL,
            probe_fn(|_| async {
                tokio::time::sleep(Duration::from_secs(61)).await;
                Ok(ProbeReply::Data(json!({})))
            }),
        ),
        JobDefinition::new(
            "robots",
            URL,
            probe_fn(|_| async { Ok(ProbeReply::Skip("No robots.txt file present".into())) }),
        ),
    ]))
}

fn app_with(platform: Platform, disabled: bool) -> axum::Router {
    let orchestrator = Orchestrator::new(catalogue())
        .with_remote_timeout(Duration::from_secs(60))
        .with_watchdog(Duration::from_secs(10))
        .with_disabled(disabled);
    let state = ApiState {
        aggregate: orchestrator.clone().with_watchdog(Duration::from_secs(20)),
        orchestrator,
        adapter: adapter_for(platform),
    };
    build_router(state, "*")
}

fn app() -> axum::Router {
    app_with(Platform::Native, false)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn call(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app.oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    (status, serde_json::from_slice(&bytes).expect("Should parse JSON"))
}

// =============================================================================
// Per-job endpoints
// =============================================================================

#[tokio::test]
async fn success_returns_the_probe_payload() {
    let (status, body) = call(app(), "/api/echo?url=https://example.com/page").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "host": "example.com" }));
}

#[tokio::test]
async fn probe_failures_map_to_500() {
    let (status, body) = call(app(), "/api/broken?url=example.com").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "certificate expired");
}

#[tokio::test(start_paused = true)]
async fn remote_deadline_maps_to_408_with_a_hint() {
    let (status, body) = call(app(), "/api/slow?url=example.com").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Request timed-out after 60000 ms"));
    assert!(message.contains("API_TIMEOUT_LIMIT"));
}

#[tokio::test]
async fn probe_skips_and_kind_mismatches_answer_200_skipped() {
    let (status, body) = call(app(), "/api/robots?url=example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skipped"], "No robots.txt file present");

    let (status, body) = call(app(), "/api/broken?url=192.168.0.1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["skipped"].as_str().unwrap().contains("ipv4"));
}

#[tokio::test]
async fn request_problems() {
    let (status, body) = call(app(), "/api/echo").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No URL specified");

    let (status, _) = call(app(), "/api/echo?url=not%20a%20host").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(app(), "/api/whois?url=example.com").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn kill_switch_answers_503_everywhere() {
    for uri in ["/api/echo?url=example.com", "/api?url=example.com"] {
        let (status, body) = call(app_with(Platform::Native, true), uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], DISABLED_MESSAGE);
    }
}

// =============================================================================
// Callback calling convention
// =============================================================================

#[tokio::test]
async fn callback_platform_answers_like_native() {
    for uri in ["/api/echo?url=example.com", "/api/broken?url=example.com", "/api/echo"] {
        let (native_status, native_body) = call(app_with(Platform::Native, false), uri).await;
        let (callback_status, callback_body) = call(app_with(Platform::Callback, false), uri).await;
        assert_eq!(native_status, callback_status, "{uri}");
        assert_eq!(native_body, callback_body, "{uri}");
    }
}

#[tokio::test(start_paused = true)]
async fn callback_platform_also_maps_deadlines_to_408() {
    let response = app_with(Platform::Callback, false)
        .oneshot(get("/api/slow?url=example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json;charset=UTF-8"
    );
}

// =============================================================================
// Aggregate endpoint and CORS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn aggregate_runs_every_job() {
    let (status, body) = call(app(), "/api?url=example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["echo"], json!({ "host": "example.com" }));
    assert_eq!(body["broken"]["error"], "certificate expired");
    assert_eq!(body["robots"]["skipped"], "No robots.txt file present");
    // The 20 s aggregate ceiling fires before the 60 s remote deadline.
    assert!(body["slow"]["error"].as_str().unwrap().contains("20000 ms"));
}

#[tokio::test]
async fn aggregate_rejects_bad_input() {
    let (status, _) = call(app(), "/api").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = call(app(), "/api?url=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let request = Request::builder()
        .uri("/api/echo?url=example.com")
        .header(header::ORIGIN, "https://elsewhere.test")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
