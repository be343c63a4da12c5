//! Data services
//!
//! [`DataService`] is the uniform surface the portal front ends talk to. The
//! implementation is chosen once by [`resolve`] and passed around explicitly;
//! nothing swaps it behind the caller's back.

mod fallback;
mod mock;
mod real;

pub use fallback::DemoFallback;
pub use mock::MockDataService;
pub use real::RealDataService;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::PortalConfig;
use crate::fields::FieldDescriptor;
use crate::form::{FormValues, SubmitHandler};
use crate::ledger::{RequestLedger, StoredRequest};
use crate::models::{CatalogItem, CatalogItemRef, KnowledgeArticle, ListQuery, PaginatedResponse, ServiceRequest};
use crate::orchestrator::SubmissionOutcome;
use crate::Result;

#[async_trait]
pub trait DataService: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<PaginatedResponse<CatalogItem>>;

    async fn get_catalog_item(&self, id: &str) -> Result<CatalogItem>;

    /// Mapped form fields of a catalog item, reference choices resolved.
    async fn get_item_form(&self, id: &str) -> Result<Vec<FieldDescriptor>>;

    async fn list_categories(&self) -> Result<Vec<String>>;

    async fn submit_request(&self, item_id: &str, values: FormValues) -> Result<SubmissionOutcome>;

    async fn list_knowledge_articles(&self, query: &ListQuery) -> Result<PaginatedResponse<KnowledgeArticle>>;

    async fn get_knowledge_article(&self, id: &str) -> Result<KnowledgeArticle>;

    async fn list_user_requests(&self, query: &ListQuery) -> Result<PaginatedResponse<ServiceRequest>>;

    async fn get_request(&self, id: &str) -> Result<ServiceRequest>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Mock,
    Real,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Mock => f.write_str("mock"),
            ServiceKind::Real => f.write_str("real"),
        }
    }
}

/// Mock when served from a static host or when upstream settings are missing.
pub fn select(config: &PortalConfig) -> ServiceKind {
    if config.is_static_host() {
        info!(host = ?config.host, "static host, using demo data");
        return ServiceKind::Mock;
    }
    if !config.has_upstream() {
        info!("upstream connection settings missing, using demo data");
        return ServiceKind::Mock;
    }
    ServiceKind::Real
}

/// Builds the service [`select`] picks. A real service that cannot be built
/// degrades to the mock one.
pub fn resolve(config: &PortalConfig) -> Arc<dyn DataService> {
    match select(config) {
        ServiceKind::Mock => Arc::new(MockDataService::new()),
        ServiceKind::Real => match RealDataService::from_config(config) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                warn!(error = %e, "real data service unavailable, using demo data");
                Arc::new(MockDataService::new())
            }
        },
    }
}

/// Submits a catalog item's form through a data service and records the
/// result in the ledger. Ledger failures are logged and never fail the
/// submission.
pub struct CatalogSubmission {
    service: Arc<dyn DataService>,
    item: CatalogItemRef,
    ledger: Option<Arc<RequestLedger>>,
    submitted_by: String,
}

impl CatalogSubmission {
    pub fn new(service: Arc<dyn DataService>, item: CatalogItemRef, submitted_by: impl Into<String>) -> Self {
        Self { service, item, ledger: None, submitted_by: submitted_by.into() }
    }

    pub fn with_ledger(mut self, ledger: Arc<RequestLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }
}

#[async_trait]
impl SubmitHandler for CatalogSubmission {
    async fn on_submit(&self, values: FormValues) -> Result<SubmissionOutcome> {
        let outcome = self.service.submit_request(&self.item.sys_id, values.clone()).await?;

        if let Some(ledger) = &self.ledger {
            let entry = StoredRequest::from_outcome(&outcome, self.item.clone(), values, self.submitted_by.clone());
            if let Err(e) = ledger.append(entry) {
                error!(number = %outcome.display_number, error = %e, "failed to save request to ledger");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, ENV_BASE_URL, ENV_HOST, ENV_PASSWORD, ENV_USERNAME};
    use crate::fields::FormSchema;
    use crate::form::FormSession;
    use crate::ledger::{KeyValueStore, RequestStatus};
    use crate::PortalError;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> PortalConfig {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PortalConfig::from_lookup(|k| map.get(k).cloned())
    }

    const UPSTREAM: &[(&str, &str)] =
        &[(ENV_BASE_URL, "https://acme.service-now.com"), (ENV_USERNAME, "ext.portal"), (ENV_PASSWORD, "pw")];

    #[test]
    fn test_selection_policy() {
        assert_eq!(select(&config(&[])), ServiceKind::Mock);
        assert_eq!(select(&config(&UPSTREAM[..2])), ServiceKind::Mock);
        assert_eq!(select(&config(UPSTREAM)), ServiceKind::Real);

        let mut on_pages = UPSTREAM.to_vec();
        on_pages.push((ENV_HOST, "acme.github.io"));
        assert_eq!(select(&config(&on_pages)), ServiceKind::Mock);
    }

    #[test]
    fn test_resolve_matches_selection() {
        assert_eq!(resolve(&config(&[])).kind(), ServiceKind::Mock);
        assert_eq!(resolve(&config(UPSTREAM)).kind(), ServiceKind::Real);

        let direct = PortalConfig {
            base_url: Some("https://acme.service-now.com".into()),
            credentials: Some(Credentials::new("u", "p")),
            ..Default::default()
        };
        assert_eq!(resolve(&direct).kind(), ServiceKind::Real);
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(PortalError::Storage("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        fn keys(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    async fn laptop_session(service: &Arc<dyn DataService>) -> (FormSession, CatalogItemRef) {
        let item = service.get_catalog_item("cat-001").await.unwrap();
        let fields = service.get_item_form("cat-001").await.unwrap();
        let session = FormSession::new(FormSchema::new(fields).unwrap());
        for (name, value) in [
            ("request_type", "new"),
            ("laptop_model", "dell_latitude"),
            ("ram_size", "16"),
            ("storage_size", "512"),
            ("justification", "new hire"),
            ("contact_email", "jane.doe@company.com"),
            ("department", "dept-it"),
        ] {
            session.set_value(name, value);
        }
        (session, item.reference())
    }

    #[tokio::test]
    async fn test_submission_is_recorded_in_ledger() {
        let service: Arc<dyn DataService> = Arc::new(MockDataService::new());
        let ledger = Arc::new(RequestLedger::in_memory());
        let (session, item) = laptop_session(&service).await;

        let handler = CatalogSubmission::new(service.clone(), item, "ext.portal").with_ledger(ledger.clone());
        let outcome = session.submit(&handler).await.unwrap();

        let stored = ledger.find_by_number(&outcome.display_number).unwrap();
        assert_eq!(stored.status, RequestStatus::PendingManualProcessing);
        assert_eq!(stored.catalog_item.name, "Laptop Request");
        assert_eq!(stored.form_data.get("ram_size"), Some(&serde_json::json!("16")));
    }

    #[tokio::test]
    async fn test_ledger_failure_does_not_fail_submission() {
        let service: Arc<dyn DataService> = Arc::new(MockDataService::new());
        let ledger = Arc::new(RequestLedger::new(Arc::new(BrokenStore)));
        let (session, item) = laptop_session(&service).await;

        let handler = CatalogSubmission::new(service, item, "ext.portal").with_ledger(ledger.clone());
        assert!(session.submit(&handler).await.is_ok());
        assert!(ledger.is_empty());
    }
}
