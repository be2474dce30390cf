//! HTTP surface: inbound email webhook + health check.
//!
//! The webhook acknowledges every delivery immediately. Processing happens in
//! a detached task that the handler never awaits.

use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pipeline::{IntakePipeline, RawPayload, spawn_intake};

/// Path the email provider posts to.
pub const WEBHOOK_PATH: &str = "/api/email-handler";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IntakePipeline>,
}

/// Build the Axum router with the webhook and health routes.
pub fn webhook_routes(pipeline: Arc<IntakePipeline>, max_body_bytes: usize) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/", get(health))
        .route(WEBHOOK_PATH, post(email_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Mailgun Webhook Server is running",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

// ── Webhook ─────────────────────────────────────────────────────────────

async fn email_handler(State(state): State<AppState>, request: Request) -> Response {
    let delivery_id = Uuid::new_v4();
    let headers = request.headers().clone();

    let raw = match read_payload(request).await {
        Ok(raw) => raw,
        Err(rejection) => {
            warn!(%delivery_id, status = %rejection.status(), "Webhook body rejected");
            return rejection;
        }
    };

    info!(%delivery_id, keys = raw.len(), "Webhook received");
    debug!(
        %delivery_id,
        headers = ?headers,
        body = %serde_json::Value::Object(raw.clone()),
        "Webhook payload"
    );

    // Fire and forget: the response below never waits on classification or forwarding.
    let _watcher = spawn_intake(Arc::clone(&state.pipeline), raw, delivery_id);

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "Webhook received successfully"})),
    )
        .into_response()
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Read the body as a payload map.
///
/// Only an unreadable body (e.g. over the size limit) is an error. Content
/// that does not parse into a key/value object becomes an empty payload.
async fn read_payload(request: Request) -> Result<RawPayload, Response> {
    if is_form(request.headers()) {
        return match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(pairs)) => Ok(pairs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect()),
            Err(rejection) => {
                let response = rejection.into_response();
                if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    Err(response)
                } else {
                    warn!("Unparseable form body, treating as empty payload");
                    Ok(RawPayload::new())
                }
            }
        };
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(parse_json_object(&body))
}

fn parse_json_object(body: &[u8]) -> RawPayload {
    if body.is_empty() {
        return RawPayload::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                kind = json_kind(&other),
                "Webhook body is not a JSON object, treating as empty payload"
            );
            RawPayload::new()
        }
        Err(e) => {
            warn!(error = %e, "Unparseable JSON body, treating as empty payload");
            RawPayload::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
