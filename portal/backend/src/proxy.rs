//! Pass-through to the upstream instance
//!
//! Everything under `/api/servicenow/` is forwarded with the prefix removed
//! and the server's Basic-Auth credentials attached. Callers never see or
//! send credentials themselves.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::ProxyError;
use crate::{handlers, AppState};

const FORWARDED_HEADERS: [HeaderName; 2] = [header::CONTENT_TYPE, header::ACCEPT];
const PREFIX: &str = "/api/servicenow/";

pub async fn proxy(
    State(state): State<AppState>,
    Path(path): Path<String>,
    uri: Uri,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::POST && path.trim_matches('/') == "create-request" {
        return handlers::create_request(State(state), body).await;
    }

    // Forward the path as received so encoded segments stay encoded
    let raw_path = uri.path().strip_prefix(PREFIX).unwrap_or(&path);
    match forward(&state, method, raw_path, query.as_deref(), &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn forward(
    state: &AppState,
    method: Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyError> {
    let mut url = format!("{}/{}", state.upstream.base_url, path.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    debug!(%method, %url, "forwarding");

    let mut req = state.http.request(method, &url);
    for name in FORWARDED_HEADERS.iter() {
        if let Some(value) = headers.get(name) {
            req = req.header(name.clone(), value.clone());
        }
    }
    if let Some(credentials) = &state.upstream.credentials {
        req = req.basic_auth(&credentials.username, Some(&credentials.password));
    }
    if !body.is_empty() {
        req = req.body(body);
    }

    let upstream = req.send().await?;
    let status =
        StatusCode::from_u16(upstream.status().as_u16()).map_err(|e| ProxyError::BadGateway(e.to_string()))?;
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await?;

    let mut response = (status, bytes).into_response();
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}
