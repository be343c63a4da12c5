//! Self-service portal proxy server
//!
//! Sits between the portal front ends and the upstream ITSM instance. It
//! forwards table and catalog calls with server-held credentials and runs the
//! request creation cascade behind `/create-request`.

use anyhow::Context;
use axum::{
    handler::Handler,
    http::HeaderValue,
    routing::{any, get, post},
    Router,
};
use portal_core::{Credentials, ServiceNowClient, SubmissionOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod handlers;
mod models;
mod proxy;

use config::ServerConfig;
use handlers::*;

/// Where and as whom forwarded calls go.
pub struct Upstream {
    pub base_url: String,
    pub credentials: Option<Credentials>,
}

#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<Upstream>,
    pub http: reqwest::Client,
    pub orchestrator: Arc<SubmissionOrchestrator>,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let client = ServiceNowClient::new(&config.base_url, config.credentials.clone());
        Self {
            upstream: Arc::new(Upstream {
                base_url: config.base_url.clone(),
                credentials: config.credentials.clone(),
            }),
            http: reqwest::Client::new(),
            orchestrator: Arc::new(SubmissionOrchestrator::new(Arc::new(client), config.portal.submitter())),
            static_dir: config.static_dir.clone(),
        }
    }
}

pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/session_timeout.do", get(session_timeout))
        .route("/create-request", post(create_request))
        // `create-request` under the prefix is dispatched inside the proxy
        .route("/api/servicenow/*path", any(proxy::proxy));

    let router = match state.static_dir.clone() {
        Some(dir) => router.fallback_service(ServeDir::new(dir).fallback(spa_fallback.with_state(state.clone()))),
        None => router.fallback(not_found),
    };

    router
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!(origin, "unusable CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;

    if config.credentials.is_none() {
        warn!("SERVICENOW_USERNAME/SERVICENOW_PASSWORD not set, forwarding without authentication");
    }
    if config.portal.oauth.enabled {
        warn!("SERVICENOW_USE_OAUTH is set but OAuth is not supported, using Basic-Auth");
    }

    let state = AppState::new(&config);
    let app = build_router(state, &config.cors_origin);

    let addr = format!("0.0.0.0:{}", config.port);
    info!(upstream = %config.base_url, cors = %config.cors_origin, "ServiceNow proxy listening on {}", addr);
    if let Some(dir) = &config.static_dir {
        info!(dir = %dir.display(), "serving front end");
    }

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use portal_core::PortalConfig;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASIC: &str = "Basic ZXh0LnBvcnRhbDpwdw==";

    fn server_config(base_url: &str, static_dir: Option<PathBuf>) -> ServerConfig {
        ServerConfig {
            port: 0,
            cors_origin: "*".to_string(),
            static_dir,
            base_url: base_url.to_string(),
            credentials: Some(Credentials::new("ext.portal", "pw")),
            portal: PortalConfig::default(),
        }
    }

    fn test_server(base_url: &str) -> TestServer {
        let config = server_config(base_url, None);
        TestServer::new(build_router(AppState::new(&config), &config.cors_origin)).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let server = test_server("http://127.0.0.1:1");
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["message"], "ServiceNow Proxy Server is running");
    }

    #[tokio::test]
    async fn test_session_timeout() {
        let server = test_server("http://127.0.0.1:1");
        let body: Value = server.get("/session_timeout.do").await.json();
        assert_eq!(body["status"], "OK");
    }

    #[tokio::test]
    async fn test_unknown_route_lists_endpoints() {
        let server = test_server("http://127.0.0.1:1");
        let response = server.get("/nope").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["message"], "Route /nope not found on proxy server");
        assert_eq!(body["availableEndpoints"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_proxy_injects_credentials_and_strips_prefix() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param("sysparm_limit", "1"))
            .and(header("authorization", BASIC))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [{"number": "INC0010001"}]})))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = test_server(&upstream.uri());
        let response = server
            .get("/api/servicenow/api/now/table/incident")
            .add_query_param("sysparm_limit", "1")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["result"][0]["number"], "INC0010001");
    }

    #[tokio::test]
    async fn test_proxy_keeps_encoded_path_segments() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/kb_knowledge/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {"sys_id": "a/b"}})))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = test_server(&upstream.uri());
        let response = server.get("/api/servicenow/api/now/table/kb_knowledge/a%2Fb").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["result"]["sys_id"], "a/b");
    }

    #[tokio::test]
    async fn test_proxy_passes_upstream_errors_through() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/now/table/incident"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": {"message": "ACL denied"}})))
            .mount(&upstream)
            .await;

        let server = test_server(&upstream.uri());
        let response = server
            .post("/api/servicenow/api/now/table/incident")
            .json(&json!({"short_description": "x"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["error"]["message"], "ACL denied");
    }

    #[tokio::test]
    async fn test_proxy_transport_error() {
        let server = test_server("http://127.0.0.1:1");
        let response = server.get("/api/servicenow/api/now/table/incident").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["error"], "Proxy error");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_request_requires_catalog_item() {
        let server = test_server("http://127.0.0.1:1");
        let response = server.post("/create-request").json(&json!({"formData": {}})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);

        let response = server.post("/create-request").json(&json!({"catalogItemId": " "})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_request_builds_request_pair() {
        let upstream = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sn_sc/servicecatalog/items/cat-001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "cat-001", "name": "Laptop Request", "category": "Hardware"}
            })))
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/now/table/sc_request"))
            .and(header("authorization", BASIC))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"sys_id": "req1", "number": "REQ0010001"}
            })))
            .expect(1)
            .mount(&upstream)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/now/table/sc_req_item"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"sys_id": "ritm1", "number": "RITM0010001"}
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let server = test_server(&upstream.uri());
        let response = server
            .post("/api/servicenow/create-request")
            .json(&json!({
                "catalogItemId": "cat-001",
                "formData": {"ram_size": "16"},
                "requestNumber": "REQ123456"
            }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["number"], "REQ0010001");
        assert_eq!(body["data"]["record_type"], "request_with_items");
        assert_eq!(body["data"]["strategy"], "request+item");
        assert_eq!(body["data"]["simulated"], false);
        assert_eq!(body["data"]["req_item"]["number"], "RITM0010001");
        assert_eq!(body["data"]["req_item"]["request"], "req1");
    }

    #[tokio::test]
    async fn test_create_request_simulates_when_upstream_is_down() {
        let server = test_server("http://127.0.0.1:1");
        let response = server.post("/create-request").json(&json!({"catalogItemId": "cat-001"})).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["simulated"], true);
        assert_eq!(body["data"]["record_type"], "simulated_request_with_items");
        assert!(body["data"]["sys_id"].as_str().unwrap().starts_with("sim_"));
    }

    #[tokio::test]
    async fn test_static_front_end_with_spa_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<div id=\"root\"></div>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('portal')").unwrap();

        let config = server_config("http://127.0.0.1:1", Some(dir.path().to_path_buf()));
        let server = TestServer::new(build_router(AppState::new(&config), "*")).unwrap();

        let asset = server.get("/app.js").await;
        asset.assert_status_ok();
        assert!(asset.text().contains("portal"));

        let route = server.get("/catalog/cat-001").await;
        route.assert_status_ok();
        assert!(route.text().contains("root"));

        server.get("/api/unknown").await.assert_status(StatusCode::NOT_FOUND);
    }
}
