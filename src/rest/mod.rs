// rest/mod.rs — HTTP surface of the bridge.
//
// Single route:
//   POST /run-qa   (x-api-key required)
//
// Everything else is 404 "Not Found", including non-POST methods on
// the route itself. Responses carry a permissive CORS header.

pub mod guard;
pub mod routes;

use anyhow::Result;
use axum::http::StatusCode;
use axum::{routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

/// Bind the guarded listener and serve until the process exits.
pub async fn start(ctx: Arc<AppContext>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.config.port));
    let listener = guard::GuardedListener::bind(addr).await?;

    info!(port = ctx.config.port, "bridge server listening");
    axum::serve(listener, build_router(ctx)).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/run-qa", post(routes::qa::run_qa))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}
