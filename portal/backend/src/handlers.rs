//! API Handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use portal_core::wire::{CreateRequestBody, CreateRequestResponse};
use tracing::{info, warn};

use crate::models::{NotFoundBody, StatusBody};
use crate::AppState;

pub async fn health() -> Json<StatusBody> {
    Json(StatusBody::ok("ServiceNow Proxy Server is running"))
}

/// Upstream session keep-alive; the proxy holds no session, so it always
/// answers OK.
pub async fn session_timeout() -> Json<StatusBody> {
    Json(StatusBody::ok("Session is active"))
}

/// Takes the raw body so malformed JSON gets the portal's own failure shape.
pub async fn create_request(State(state): State<AppState>, body: Bytes) -> Response {
    let request: CreateRequestBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected create-request body");
            return bad_request(format!("Invalid request body: {}", e));
        }
    };
    if request.catalog_item_id.trim().is_empty() {
        return bad_request("catalogItemId is required".to_string());
    }

    info!(
        catalog_item = %request.catalog_item_id,
        fields = request.form_data.len(),
        "create-request received"
    );

    let outcome = state
        .orchestrator
        .submit_with_number(&request.catalog_item_id, request.form_data, request.request_number)
        .await;

    Json(CreateRequestResponse::created(&outcome)).into_response()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(CreateRequestResponse::failure(message))).into_response()
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<NotFoundBody>) {
    (StatusCode::NOT_FOUND, Json(NotFoundBody::for_path(uri.path())))
}

/// Client-side routes get the front end's `index.html`; API paths and a
/// missing index fall through to the JSON 404.
pub async fn spa_fallback(State(state): State<AppState>, uri: Uri) -> Response {
    let Some(dir) = state.static_dir.as_deref() else {
        return not_found(uri).await.into_response();
    };
    if uri.path().starts_with("/api") {
        return not_found(uri).await.into_response();
    }

    match tokio::fs::read_to_string(dir.join("index.html")).await {
        Ok(index) => Html(index).into_response(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "index.html unavailable");
            not_found(uri).await.into_response()
        }
    }
}
