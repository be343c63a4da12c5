//! Upstream ITSM API client
//!
//! REST wrapper for the ServiceNow table and service catalog APIs. The same
//! client talks to the instance directly (with Basic-Auth) or to the portal
//! proxy (without credentials, the proxy injects them).

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{Credentials, PortalConfig};
use crate::fields::{Choice, ReferenceLookup};
use crate::models::{display_value, ListQuery};
use crate::{PortalError, Result};

// =============================================================================
// Tables and records
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Incident,
    Request,
    RequestItem,
    KnowledgeArticle,
    Other(String),
}

impl Table {
    pub fn as_str(&self) -> &str {
        match self {
            Table::Incident => "incident",
            Table::Request => "sc_request",
            Table::RequestItem => "sc_req_item",
            Table::KnowledgeArticle => "kb_knowledge",
            Table::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "incident" => Table::Incident,
            "sc_request" => Table::Request,
            "sc_req_item" => Table::RequestItem,
            "kb_knowledge" => Table::KnowledgeArticle,
            other => Table::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as returned by the table API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpstreamRecord(pub Map<String, Value>);

impl UpstreamRecord {
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).map(display_value).filter(|s| !s.is_empty())
    }

    pub fn sys_id(&self) -> Option<String> {
        self.get_str("sys_id")
    }

    pub fn number(&self) -> Option<String> {
        self.get_str("number")
    }

}

#[derive(Clone, Debug, Default)]
pub struct TableQuery {
    /// Encoded query, e.g. `active=true^nameLIKEvpn`.
    pub query: Option<String>,
    pub fields: Vec<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub display_value: bool,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

// =============================================================================
// Client
// =============================================================================

#[async_trait]
pub trait ItsmClient: Send + Sync {
    async fn get_catalog_item(&self, id: &str) -> Result<Value>;

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<Vec<Value>>;

    async fn list_categories(&self) -> Result<Vec<Value>>;

    async fn create_record(&self, table: &Table, body: &Value) -> Result<UpstreamRecord>;

    async fn query_table(&self, table: &Table, query: &TableQuery) -> Result<Vec<Value>>;

    async fn get_record(&self, table: &Table, sys_id: &str) -> Result<Value>;
}

/// ServiceNow REST client
pub struct ServiceNowClient {
    base_url: String,
    credentials: Option<Credentials>,
    client: Client,
}

impl ServiceNowClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| PortalError::Config("upstream base URL is not set".to_string()))?;
        Ok(Self::new(base_url, config.credentials.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends path segments to the base URL. Each segment is
    /// percent-encoded, so ids cannot escape their position in the path.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortalError::Config(format!("invalid upstream base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| PortalError::Config(format!("upstream base URL cannot hold a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        debug!("{} {}", method, url);

        let req = self.client.request(method, url).header("Accept", "application/json");
        Ok(match &self.credentials {
            Some(c) => req.basic_auth(&c.username, Some(&c.password)),
            None => req,
        })
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Upstream { status, body });
        }

        let bytes = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl ItsmClient for ServiceNowClient {
    async fn get_catalog_item(&self, id: &str) -> Result<Value> {
        self.send(self.request(Method::GET, &["api", "sn_sc", "servicecatalog", "items", id])?)
            .await
    }

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<Vec<Value>> {
        let mut params = vec![
            ("sysparm_limit", query.limit.to_string()),
            ("sysparm_offset", query.offset().to_string()),
        ];
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("sysparm_text", search.to_string()));
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty() && *c != "all") {
            params.push(("sysparm_category", category.to_string()));
        }

        self.send(self.request(Method::GET, &["api", "sn_sc", "servicecatalog", "items"])?.query(&params))
            .await
    }

    async fn list_categories(&self) -> Result<Vec<Value>> {
        self.send(self.request(Method::GET, &["api", "sn_sc", "servicecatalog", "categories"])?)
            .await
    }

    async fn create_record(&self, table: &Table, body: &Value) -> Result<UpstreamRecord> {
        self.send(self.request(Method::POST, &["api", "now", "table", table.as_str()])?.json(body))
            .await
    }

    async fn query_table(&self, table: &Table, query: &TableQuery) -> Result<Vec<Value>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = query.query.as_deref().filter(|q| !q.is_empty()) {
            params.push(("sysparm_query", q.to_string()));
        }
        if !query.fields.is_empty() {
            params.push(("sysparm_fields", query.fields.join(",")));
        }
        if let Some(limit) = query.limit {
            params.push(("sysparm_limit", limit.to_string()));
        }
        if let Some(offset) = query.offset {
            params.push(("sysparm_offset", offset.to_string()));
        }
        if query.display_value {
            params.push(("sysparm_display_value", "true".to_string()));
        }

        self.send(self.request(Method::GET, &["api", "now", "table", table.as_str()])?.query(&params))
            .await
    }

    async fn get_record(&self, table: &Table, sys_id: &str) -> Result<Value> {
        let req = self
            .request(Method::GET, &["api", "now", "table", table.as_str(), sys_id])?
            .query(&[("sysparm_display_value", "true")]);
        match self.send(req).await {
            Err(PortalError::Upstream { status: 404, .. }) => {
                Err(PortalError::NotFound(format!("{}/{}", table, sys_id)))
            }
            other => other,
        }
    }
}

/// Resolves reference choice lists from a table on the upstream instance.
pub struct TableLookup<'a>(pub &'a dyn ItsmClient);

#[async_trait]
impl ReferenceLookup for TableLookup<'_> {
    async fn lookup(&self, table: &str) -> Result<Vec<Choice>> {
        let query = TableQuery { limit: Some(100), ..Default::default() };
        let rows = self.0.query_table(&Table::from_name(table), &query).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let value = row.get("sys_id").map(display_value).filter(|s| !s.is_empty())?;
                let label = ["name", "short_description", "title"]
                    .iter()
                    .filter_map(|k| row.get(*k).map(display_value))
                    .find(|s| !s.is_empty())
                    .unwrap_or_else(|| value.clone());
                Some(Choice { value, label })
            })
            .collect())
    }
}
