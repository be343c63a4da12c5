//! Error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

impl PortalError {
    /// True when the service could not be reached at all, as opposed to
    /// answering with an error.
    pub fn is_unreachable(&self) -> bool {
        match self {
            PortalError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
