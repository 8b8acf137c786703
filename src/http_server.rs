//! HTTP surface of the bridge
//!
//! - `POST /endpoint`: raw SDP offer in, raw SDP answer out
//! - `OPTIONS /endpoint`: CORS preflight and ICE server discovery
//! - `GET /health`
//! - `GET /calls`, `GET /calls/:call_id`: exchange progress

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE, LINK,
        },
        HeaderName, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::BridgeConfig;
use crate::exchange::Bridge;

/// Response header carrying the id to look up under `/calls/:call_id`
pub const CALL_ID_HEADER: &str = "x-call-id";
const ACCEPT_POST: &str = "accept-post";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    bridge: Bridge,
    ice_server_link: Arc<String>,
}

impl AppState {
    pub fn new(bridge: Bridge, stun_server: &str) -> Self {
        Self {
            bridge,
            ice_server_link: Arc::new(format!("<{}>; rel=\"ice-server\"", stun_server)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/endpoint", post(handle_call).options(handle_options))
        .route("/health", get(health))
        .route("/calls", get(list_calls))
        .route("/calls/:call_id", get(get_call))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bridge one caller: returns Session A's answer once both broker sessions
/// exist, the AI leg completes in the background.
async fn handle_call(
    State(state): State<AppState>,
    Query(caller_params): Query<Vec<(String, String)>>,
    offer_sdp: String,
) -> Response {
    match state.bridge.start_call(offer_sdp, caller_params).await {
        Ok(call) => (
            StatusCode::OK,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
                (CONTENT_TYPE, "application/sdp".to_string()),
                (HeaderName::from_static(CALL_ID_HEADER), call.call_id),
            ],
            call.answer.sdp,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Call setup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
                e.to_string(),
            )
                .into_response()
        }
    }
}

async fn handle_options(State(state): State<AppState>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (HeaderName::from_static(ACCEPT_POST), "application/sdp".to_string()),
            (ACCESS_CONTROL_ALLOW_CREDENTIALS, "true".to_string()),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                "content-type,authorization,if-match".to_string(),
            ),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                "PATCH,POST,PUT,DELETE,OPTIONS".to_string(),
            ),
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (
                ACCESS_CONTROL_EXPOSE_HEADERS,
                "x-thunderclap,location,link,accept-post,accept-patch,etag".to_string(),
            ),
            (LINK, state.ice_server_link.as_ref().clone()),
        ],
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "call-bridge",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_calls(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bridge.registry().list().await)
}

async fn get_call(State(state): State<AppState>, Path(call_id): Path<String>) -> Response {
    match state.bridge.registry().get(&call_id).await {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown call: {}", call_id) })),
        )
            .into_response(),
    }
}

/// Bind the configured port and serve until the process is stopped
pub async fn serve(config: BridgeConfig) -> Result<()> {
    let bridge = Bridge::from_config(&config)?;
    let app = router(AppState::new(bridge, &config.stun_server));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    tracing::info!("✓ Call bridge listening on http://0.0.0.0:{}", config.port);
    tracing::info!("  POST    /endpoint        — SDP offer in, SDP answer out");
    tracing::info!("  OPTIONS /endpoint        — CORS / ICE server discovery");
    tracing::info!("  GET     /calls[/:id]     — Exchange progress");
    tracing::info!("  GET     /health          — Health check");

    axum::serve(listener, app).await?;

    Ok(())
}
