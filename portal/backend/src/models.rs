//! Response bodies owned by the proxy itself

use serde::{Deserialize, Serialize};

pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/health",
    "/api/servicenow/create-request",
    "/api/servicenow/* (proxied to ServiceNow)",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

impl StatusBody {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { status: "OK".to_string(), message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundBody {
    pub error: String,
    pub message: String,
    pub available_endpoints: Vec<String>,
}

impl NotFoundBody {
    pub fn for_path(path: &str) -> Self {
        Self {
            error: "Not Found".to_string(),
            message: format!("Route {} not found on proxy server", path),
            available_endpoints: AVAILABLE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}
