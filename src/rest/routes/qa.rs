// rest/routes/qa.rs — session orchestrator for POST /run-qa.
//
// Validate, allocate a session id, render the prompt, run the agent to
// completion, then fire the GIF converter in the background and reply.
// The response waits for the agent, never for the conversion.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::rest::guard;
use crate::{agent, prompt, recording, session, AppContext};

/// Body of every 200 response. An agent-level failure still returns
/// HTTP 200 with the failure in `error`, so callers can tell "bridge
/// worked, agent failed" apart from transport problems.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QaResponse {
    stdout: String,
    report_url: String,
    session_id: String,
    error: Option<String>,
}

pub async fn run_qa(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !guard::api_key_ok(&headers, &ctx.config.api_key) {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let payload: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            error!(err = %e, "rejecting request: invalid JSON body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON body" })),
            )
                .into_response();
        }
    };

    let task = match payload.get("chatInput").and_then(Value::as_str) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing chatInput" })),
            )
                .into_response();
        }
    };

    // Session ids are assigned server-side; every artifact of this run
    // is namespaced by the id.
    let session_id = session::allocate();
    info!(session_id, "received request, assigned session id");

    let doc = prompt::build(&task, &session_id, &ctx.config);
    let outcome = agent::invoke(&ctx.config, &doc).await;

    if !outcome.stdout.is_empty() {
        info!(session_id, stdout = %outcome.stdout, "agent stdout");
    }
    if let Some(err) = &outcome.error {
        error!(session_id, err = %err, "agent invocation failed");
    }

    // Fire-and-forget: conversion outcome is only ever logged.
    let bg_ctx = ctx.clone();
    let bg_session = session_id.clone();
    tokio::spawn(async move {
        recording::generate(&bg_ctx.config, &bg_session).await;
    });

    let report_url = agent::extract_report_url(&ctx.report_url_re, &outcome.stdout)
        .unwrap_or_else(|| agent::URL_NOT_FOUND.to_string());

    Json(QaResponse {
        stdout: outcome.stdout,
        report_url,
        session_id,
        error: outcome.error,
    })
    .into_response()
}
