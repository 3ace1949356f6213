// src/server/mod.rs

//! HTTP surface: one endpoint per catalogue job plus the aggregate endpoint.

pub mod adapter;

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use color_eyre::eyre::Result;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::models::{JobState, JobStatus};
use crate::core::orchestrator::Orchestrator;
use crate::server::adapter::{Adapter, NO_URL_MESSAGE, NormalizedResponse, adapter_for};

#[derive(Clone)]
pub struct ApiState {
    /// Serves the per-job endpoints.
    pub orchestrator: Orchestrator,
    /// Same catalogue, watchdog set to the aggregate ceiling.
    pub aggregate: Orchestrator,
    pub adapter: Arc<dyn Adapter>,
}

impl ApiState {
    pub fn from_config(config: &Config) -> Self {
        let orchestrator = config.orchestrator();
        let aggregate = orchestrator.clone().with_watchdog(config.aggregate_timeout());
        Self { orchestrator, aggregate, adapter: adapter_for(config.platform) }
    }
}

pub fn build_router(state: ApiState, cors_origin: &str) -> Router {
    Router::new()
        .route("/api", get(aggregate_endpoint))
        .route("/api/{job}", get(job_endpoint))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET]).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests will be refused.");
            layer
        }
    }
}

/// Binds `bind` and serves until Ctrl-C.
pub async fn serve(config: &Config, bind: SocketAddr) -> Result<()> {
    let state = ApiState::from_config(config);
    info!(
        %bind,
        platform = ?state.adapter.platform(),
        jobs = state.orchestrator.catalogue().len(),
        disabled = config.disable_everything,
        "Starting HTTP server."
    );
    let app = build_router(state, &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("HTTP server stopped.");
    Ok(())
}

async fn job_endpoint(
    State(state): State<ApiState>,
    Path(job): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.adapter.respond(&state.orchestrator, &job, query).await
}

fn normalized(response: NormalizedResponse) -> Response {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

/// Runs the whole catalogue server-side and answers with `{ job id: body }`.
async fn aggregate_endpoint(
    State(state): State<ApiState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if state.aggregate.is_disabled() {
        return normalized(NormalizedResponse::disabled());
    }
    let Some(raw) = query.get("url").filter(|raw| !raw.trim().is_empty()) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": NO_URL_MESSAGE }))).into_response();
    };

    let session = match state.aggregate.open(raw).await {
        Ok(session) => session,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    };
    session.wait_settled().await;

    let results: BTreeMap<String, Value> = session
        .jobs()
        .await
        .iter()
        .map(|job| (job.id.clone(), job_body(job)))
        .collect();
    info!(session = %session.id(), jobs = results.len(), "Aggregate scan finished.");
    Json(results).into_response()
}

fn job_body(job: &JobState) -> Value {
    match job.status {
        JobStatus::Success => job.result.clone().unwrap_or(Value::Null),
        JobStatus::Skipped => json!({ "skipped": job.error }),
        JobStatus::Error | JobStatus::TimedOut => json!({ "error": job.error }),
        JobStatus::Loading => json!({ "error": "still loading" }),
    }
}
