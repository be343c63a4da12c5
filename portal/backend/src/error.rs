use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid upstream response: {0}")]
    BadGateway(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "proxy error");
        let body = ErrorBody { error: "Proxy error".to_string(), message: self.to_string() };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
