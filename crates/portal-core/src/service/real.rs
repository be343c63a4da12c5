//! Upstream-backed data service

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{DataService, ServiceKind};
use crate::config::PortalConfig;
use crate::fields::{map_fields, FieldDescriptor, RawField};
use crate::form::FormValues;
use crate::models::{display_value, CatalogItem, KnowledgeArticle, ListQuery, PaginatedResponse, ServiceRequest};
use crate::orchestrator::{generate_request_number, SubmissionOrchestrator, SubmissionOutcome};
use crate::upstream::{ItsmClient, ServiceNowClient, Table, TableLookup, TableQuery};
use crate::wire::{CreateRequestBody, CreateRequestResponse};
use crate::{PortalError, Result};

/// Path prefix the portal proxy forwards to the instance.
pub const PROXY_PREFIX: &str = "/api/servicenow";

enum Submitter {
    /// Runs the creation cascade in-process.
    Local(SubmissionOrchestrator),
    /// Hands the submission to the proxy's create-request endpoint.
    Proxy { http: reqwest::Client, url: String },
}

pub struct RealDataService {
    client: Arc<dyn ItsmClient>,
    submitter: Submitter,
    /// Only this user's requests are listed, when set.
    requester: Option<String>,
}

impl RealDataService {
    pub fn direct(client: Arc<dyn ItsmClient>, submitted_by: impl Into<String>) -> Self {
        let submitted_by = submitted_by.into();
        Self {
            submitter: Submitter::Local(SubmissionOrchestrator::new(client.clone(), submitted_by.clone())),
            client,
            requester: Some(submitted_by),
        }
    }

    pub fn proxied(proxy_url: &str, requester: Option<String>) -> Self {
        let proxy_url = proxy_url.trim_end_matches('/');
        Self {
            client: Arc::new(ServiceNowClient::new(&format!("{}{}", proxy_url, PROXY_PREFIX), None)),
            submitter: Submitter::Proxy {
                http: reqwest::Client::new(),
                url: format!("{}{}/create-request", proxy_url, PROXY_PREFIX),
            },
            requester,
        }
    }

    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        if let Some(proxy_url) = &config.proxy_url {
            let requester = config.submitted_by.clone();
            return Ok(Self::proxied(proxy_url, requester));
        }
        if config.credentials.is_none() {
            return Err(PortalError::Config("upstream credentials are not set".to_string()));
        }
        let client = ServiceNowClient::from_config(config)?;
        Ok(Self::direct(Arc::new(client), config.submitter()))
    }

    async fn submit_via_proxy(
        http: &reqwest::Client,
        url: &str,
        item_id: &str,
        values: FormValues,
    ) -> Result<SubmissionOutcome> {
        let body = CreateRequestBody {
            catalog_item_id: item_id.to_string(),
            form_data: values,
            request_number: Some(generate_request_number()),
        };
        debug!("POST {}", url);

        let response = http.post(url).json(&body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let parsed: CreateRequestResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !(200..300).contains(&status) => return Err(PortalError::Upstream { status, body: text }),
            Err(e) => return Err(e.into()),
        };
        match parsed.data {
            Some(data) if parsed.success => Ok(data.into_outcome()),
            _ => Err(PortalError::Upstream { status, body: parsed.message }),
        }
    }
}

/// Logs a failed upstream call. Callers may fall back to demo data.
fn noted<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(operation, error = %e, "upstream call failed, demo data can be used instead");
    }
    result
}

fn clause(text: &str) -> String {
    text.replace('^', "").trim().to_string()
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty() && *v != "all")
}

fn page<T>(items: Vec<T>, query: &ListQuery) -> PaginatedResponse<T> {
    // The table API reports no total, count what has been seen so far
    let total = query.offset() as u64 + items.len() as u64;
    PaginatedResponse::page_of(items, total, query)
}

#[async_trait]
impl DataService for RealDataService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Real
    }

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<PaginatedResponse<CatalogItem>> {
        let rows = noted("list_catalog_items", self.client.list_catalog_items(query).await)?;
        Ok(page(rows.iter().map(CatalogItem::from_upstream).collect(), query))
    }

    async fn get_catalog_item(&self, id: &str) -> Result<CatalogItem> {
        let raw = noted("get_catalog_item", self.client.get_catalog_item(id).await)?;
        Ok(CatalogItem::from_upstream(&raw))
    }

    async fn get_item_form(&self, id: &str) -> Result<Vec<FieldDescriptor>> {
        let raw = noted("get_item_form", self.client.get_catalog_item(id).await)?;
        let raws: Vec<RawField> = raw
            .get("variables")
            .and_then(Value::as_array)
            .map(|vars| vars.iter().map(RawField::from_value).collect())
            .unwrap_or_default();

        Ok(map_fields(&raws, &TableLookup(self.client.as_ref())).await)
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        let rows = noted("list_categories", self.client.list_categories().await)?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                ["title", "name"]
                    .iter()
                    .filter_map(|k| row.get(*k).map(display_value))
                    .find(|s| !s.is_empty())
            })
            .collect())
    }

    async fn submit_request(&self, item_id: &str, values: FormValues) -> Result<SubmissionOutcome> {
        match &self.submitter {
            Submitter::Local(orchestrator) => Ok(orchestrator.submit(item_id, values).await),
            Submitter::Proxy { http, url } => {
                noted("submit_request", Self::submit_via_proxy(http, url, item_id, values).await)
            }
        }
    }

    async fn list_knowledge_articles(&self, query: &ListQuery) -> Result<PaginatedResponse<KnowledgeArticle>> {
        let mut parts = vec!["workflow_state=published".to_string()];
        if let Some(search) = nonempty(&query.search) {
            let s = clause(search);
            parts.push(format!("short_descriptionLIKE{}^ORtextLIKE{}", s, s));
        }
        if let Some(category) = nonempty(&query.category) {
            parts.push(format!("category={}", clause(category)));
        }
        parts.push("ORDERBYDESCpublished".to_string());

        let table_query = TableQuery {
            query: Some(parts.join("^")),
            limit: Some(query.limit),
            offset: Some(query.offset()),
            display_value: true,
            ..Default::default()
        };
        let rows = noted(
            "list_knowledge_articles",
            self.client.query_table(&Table::KnowledgeArticle, &table_query).await,
        )?;
        Ok(page(rows.iter().map(KnowledgeArticle::from_upstream).collect(), query))
    }

    async fn get_knowledge_article(&self, id: &str) -> Result<KnowledgeArticle> {
        let raw = noted("get_knowledge_article", self.client.get_record(&Table::KnowledgeArticle, id).await)?;
        Ok(KnowledgeArticle::from_upstream(&raw))
    }

    async fn list_user_requests(&self, query: &ListQuery) -> Result<PaginatedResponse<ServiceRequest>> {
        let mut parts = Vec::new();
        if let Some(requester) = nonempty(&self.requester) {
            parts.push(format!("requested_for.user_name={}", clause(requester)));
        }
        if let Some(status) = nonempty(&query.status) {
            parts.push(format!("state={}", clause(status)));
        }
        if let Some(search) = nonempty(&query.search) {
            let s = clause(search);
            parts.push(format!("numberLIKE{}^ORshort_descriptionLIKE{}", s, s));
        }
        parts.push("ORDERBYDESCsys_created_on".to_string());

        let table_query = TableQuery {
            query: Some(parts.join("^")),
            limit: Some(query.limit),
            offset: Some(query.offset()),
            display_value: true,
            ..Default::default()
        };
        let rows = noted("list_user_requests", self.client.query_table(&Table::Request, &table_query).await)?;
        Ok(page(rows.iter().map(ServiceRequest::from_upstream).collect(), query))
    }

    async fn get_request(&self, id: &str) -> Result<ServiceRequest> {
        let raw = noted("get_request", self.client.get_record(&Table::Request, id).await)?;
        Ok(ServiceRequest::from_upstream(&raw))
    }
}
