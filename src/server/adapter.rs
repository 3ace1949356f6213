// src/server/adapter.rs

//! The two calling conventions a job endpoint can be hosted under.
//!
//! Both shapes funnel into [`handle`], which owns every decision: kill switch,
//! address validation, applicability, the remote deadline and status mapping.
//! Adapters only translate their platform's request into that call and the
//! [`NormalizedResponse`] back out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::core::models::{Address, Outcome};
use crate::core::orchestrator::{DISABLED_MESSAGE, Orchestrator};
use crate::core::timeout::timeout_hint;

pub const NO_URL_MESSAGE: &str = "No URL specified";

/// Which calling convention the HTTP surface speaks. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Request in, response out.
    #[default]
    Native,
    /// Event in, result handed to a completion callback.
    Callback,
}

/// Platform-independent result of one job invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResponse {
    pub status_code: u16,
    pub body: Value,
}

impl NormalizedResponse {
    fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self::new(status_code, json!({ "error": message.into() }))
    }

    pub fn disabled() -> Self {
        Self::error(503, DISABLED_MESSAGE)
    }
}

/// Runs `job_id` against the `url` query parameter and normalizes the result.
pub async fn handle(orchestrator: &Orchestrator, job_id: &str, url: Option<&str>) -> NormalizedResponse {
    if orchestrator.is_disabled() {
        return NormalizedResponse::disabled();
    }
    let Some(raw) = url.filter(|raw| !raw.trim().is_empty()) else {
        return NormalizedResponse::error(500, NO_URL_MESSAGE);
    };
    let Some(job) = orchestrator.catalogue().get(job_id) else {
        return NormalizedResponse::error(404, format!("unknown job '{job_id}'"));
    };
    let address = match Address::parse(raw) {
        Ok(address) => address,
        Err(e) => return NormalizedResponse::error(400, e.to_string()),
    };
    if !job.applies_to(address.kind()) {
        let reason = format!("'{}' does not apply to {} addresses", job.id, address.kind());
        return NormalizedResponse::new(200, json!({ "skipped": reason }));
    }

    let executor = orchestrator.executor();
    let outcome = executor.execute(job, &address).await;
    let status_code = outcome.status_code();
    let body = match &outcome {
        Outcome::Error { message, remote_timeout: true } => {
            json!({ "error": format!("{message}\n\n{}", timeout_hint(executor.remote_timeout())) })
        }
        other => other.body(),
    };
    NormalizedResponse::new(status_code, body)
}

/// Translates between an axum request and one calling convention.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn respond(
        &self,
        orchestrator: &Orchestrator,
        job_id: &str,
        query: HashMap<String, String>,
    ) -> Response;
}

/// Picks the adapter for `platform`.
pub fn adapter_for(platform: Platform) -> Arc<dyn Adapter> {
    match platform {
        Platform::Native => Arc::new(NativeAdapter),
        Platform::Callback => Arc::new(CallbackAdapter),
    }
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

// --- Native: request/response ---

#[derive(Debug, Clone)]
pub struct NativeRequest {
    pub job: String,
    pub query: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeResponse {
    pub status: u16,
    pub json: Value,
}

pub async fn native_handler(orchestrator: &Orchestrator, request: NativeRequest) -> NativeResponse {
    let url = request.query.get("url").map(String::as_str);
    let normalized = handle(orchestrator, &request.job, url).await;
    NativeResponse { status: normalized.status_code, json: normalized.body }
}

#[derive(Debug, Clone, Copy)]
pub struct NativeAdapter;

#[async_trait]
impl Adapter for NativeAdapter {
    fn platform(&self) -> Platform {
        Platform::Native
    }

    async fn respond(
        &self,
        orchestrator: &Orchestrator,
        job_id: &str,
        query: HashMap<String, String>,
    ) -> Response {
        let request = NativeRequest { job: job_id.to_string(), query };
        let response = native_handler(orchestrator, request).await;
        (status_of(response.status), Json(response.json)).into_response()
    }
}

// --- Callback: event + completion callback ---

#[derive(Debug, Clone, Default)]
pub struct CallbackEvent {
    pub path: String,
    pub query_string_parameters: HashMap<String, String>,
}

/// What the callback receives: the body is already-encoded JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResult {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Runs the job named by the last path segment of `event` and reports through `callback`.
pub async fn callback_handler<F>(orchestrator: &Orchestrator, event: CallbackEvent, callback: F)
where
    F: FnOnce(CallbackResult) + Send,
{
    let job = event.path.rsplit('/').next().unwrap_or_default();
    let url = event.query_string_parameters.get("url").map(String::as_str);
    let normalized = handle(orchestrator, job, url).await;
    callback(CallbackResult {
        status_code: normalized.status_code,
        headers: vec![(
            header::CONTENT_TYPE.to_string(),
            "application/json;charset=UTF-8".to_string(),
        )],
        body: normalized.body.to_string(),
    });
}

#[derive(Debug, Clone, Copy)]
pub struct CallbackAdapter;

#[async_trait]
impl Adapter for CallbackAdapter {
    fn platform(&self) -> Platform {
        Platform::Callback
    }

    async fn respond(
        &self,
        orchestrator: &Orchestrator,
        job_id: &str,
        query: HashMap<String, String>,
    ) -> Response {
        let event = CallbackEvent { path: format!("/api/{job_id}"), query_string_parameters: query };
        let (tx, rx) = oneshot::channel();
        callback_handler(orchestrator, event, move |result| {
            if tx.send(result).is_err() {
                debug!("Callback receiver dropped before completion.");
            }
        })
        .await;

        match rx.await {
            Ok(result) => {
                let mut builder = Response::builder().status(status_of(result.status_code));
                for (name, value) in &result.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.body(Body::from(result.body)).unwrap_or_else(|e| {
                    error!(error = %e, "Could not assemble callback response.");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
            }
            Err(_) => {
                error!(job = job_id, "Completion callback was never invoked.");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalogue::{Catalogue, JobDefinition, ProbeReply, probe_fn};
    use crate::core::models::AddressKind;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(Catalogue::new([JobDefinition::new(
            "echo",
            &[AddressKind::Url],
            probe_fn(|address: Address| async move {
                Ok(ProbeReply::Data(json!({ "host": address.host() })))
            }),
        )])))
    }

    #[tokio::test]
    async fn both_shapes_produce_the_same_normalized_answer() {
        let orchestrator = orchestrator();
        let query = HashMap::from([("url".to_string(), "example.com".to_string())]);

        let native = native_handler(
            &orchestrator,
            NativeRequest { job: "echo".into(), query: query.clone() },
        )
        .await;

        let mut captured = None;
        callback_handler(
            &orchestrator,
            CallbackEvent { path: "/api/echo".into(), query_string_parameters: query },
            |result| captured = Some(result),
        )
        .await;
        let callback = captured.unwrap();

        assert_eq!(native.status, 200);
        assert_eq!(callback.status_code, 200);
        assert_eq!(serde_json::from_str::<Value>(&callback.body).unwrap(), native.json);
        assert_eq!(native.json, json!({ "host": "example.com" }));
    }

    #[tokio::test]
    async fn missing_url_and_unknown_job() {
        let orchestrator = orchestrator();
        assert_eq!(handle(&orchestrator, "echo", None).await.status_code, 500);
        assert_eq!(handle(&orchestrator, "echo", Some("  ")).await.status_code, 500);
        assert_eq!(handle(&orchestrator, "nope", Some("example.com")).await.status_code, 404);
        assert_eq!(handle(&orchestrator, "echo", Some("not an address")).await.status_code, 400);
    }

    #[tokio::test]
    async fn inapplicable_kinds_are_skipped_without_a_probe_call() {
        let response = handle(&orchestrator(), "echo", Some("10.0.0.1")).await;
        assert_eq!(response.status_code, 200);
        assert!(response.body["skipped"].is_string());
    }

    #[tokio::test]
    async fn kill_switch_short_circuits() {
        let orchestrator = orchestrator().with_disabled(true);
        assert_eq!(handle(&orchestrator, "echo", Some("example.com")).await, NormalizedResponse::disabled());
    }
}
