use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{DataService, MockDataService, ServiceKind};
use crate::fields::FieldDescriptor;
use crate::form::FormValues;
use crate::models::{CatalogItem, KnowledgeArticle, ListQuery, PaginatedResponse, ServiceRequest};
use crate::orchestrator::SubmissionOutcome;
use crate::Result;

/// Serves demo data for reads the primary service fails. Submissions are
/// never redirected, a failed submission stays failed.
pub struct DemoFallback {
    primary: Arc<dyn DataService>,
    demo: MockDataService,
}

impl DemoFallback {
    pub fn new(primary: Arc<dyn DataService>) -> Self {
        Self { primary, demo: MockDataService::new() }
    }
}

macro_rules! read_with_fallback {
    ($self:ident, $op:ident ( $($arg:expr),* )) => {
        match $self.primary.$op($($arg),*).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(operation = stringify!($op), error = %e, "running in demo mode");
                $self.demo.$op($($arg),*).await
            }
        }
    };
}

#[async_trait]
impl DataService for DemoFallback {
    fn kind(&self) -> ServiceKind {
        self.primary.kind()
    }

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<PaginatedResponse<CatalogItem>> {
        read_with_fallback!(self, list_catalog_items(query))
    }

    async fn get_catalog_item(&self, id: &str) -> Result<CatalogItem> {
        read_with_fallback!(self, get_catalog_item(id))
    }

    async fn get_item_form(&self, id: &str) -> Result<Vec<FieldDescriptor>> {
        read_with_fallback!(self, get_item_form(id))
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        read_with_fallback!(self, list_categories())
    }

    async fn submit_request(&self, item_id: &str, values: FormValues) -> Result<SubmissionOutcome> {
        self.primary.submit_request(item_id, values).await
    }

    async fn list_knowledge_articles(&self, query: &ListQuery) -> Result<PaginatedResponse<KnowledgeArticle>> {
        read_with_fallback!(self, list_knowledge_articles(query))
    }

    async fn get_knowledge_article(&self, id: &str) -> Result<KnowledgeArticle> {
        read_with_fallback!(self, get_knowledge_article(id))
    }

    async fn list_user_requests(&self, query: &ListQuery) -> Result<PaginatedResponse<ServiceRequest>> {
        read_with_fallback!(self, list_user_requests(query))
    }

    async fn get_request(&self, id: &str) -> Result<ServiceRequest> {
        read_with_fallback!(self, get_request(id))
    }
}
