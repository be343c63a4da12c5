//! Demo data service backed by built-in fixtures

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::info;

use super::{DataService, ServiceKind};
use crate::fields::{map_fields, Choice, FieldDescriptor, RawField, ReferenceLookup};
use crate::form::FormValues;
use crate::models::{
    display_value, CatalogItem, KnowledgeArticle, ListQuery, PaginatedResponse, ServiceRequest,
};
use crate::orchestrator::{generate_request_number, CatalogItemInfo, SimulatedStrategy, SubmissionContext, SubmissionOutcome};
use crate::{PortalError, Result};

static CATALOG: Lazy<Vec<Value>> = Lazy::new(|| {
    vec![
        json!({
            "sys_id": "cat-001",
            "name": "Laptop Request",
            "short_description": "Request a new laptop for your work needs.",
            "description": "Complete laptop request form covering hardware options, delivery and approvals.",
            "category": "Hardware",
            "picture": "/api/images/laptop-request.jpg",
            "active": true,
            "order": 1,
            "availability": "available",
            "variables": [
                {"name": "request_type", "label": "Request Type", "type": "choice", "mandatory": true, "choices": [
                    {"value": "new", "label": "New Laptop"},
                    {"value": "replacement", "label": "Replacement Laptop"},
                    {"value": "upgrade", "label": "Hardware Upgrade"}
                ]},
                {"name": "laptop_model", "label": "Laptop Model", "type": "choice", "mandatory": true, "choices": [
                    {"value": "dell_latitude", "label": "Dell Latitude"},
                    {"value": "hp_elitebook", "label": "HP EliteBook"},
                    {"value": "lenovo_thinkpad", "label": "Lenovo ThinkPad"}
                ]},
                {"name": "ram_size", "label": "RAM Size", "type": "choice", "mandatory": true, "choices": [
                    {"value": "8", "label": "8GB"},
                    {"value": "16", "label": "16GB"},
                    {"value": "32", "label": "32GB"}
                ]},
                {"name": "storage_size", "label": "Storage Size", "type": "choice", "mandatory": true, "choices": [
                    {"value": "256", "label": "256GB SSD"},
                    {"value": "512", "label": "512GB SSD"},
                    {"value": "1tb", "label": "1TB SSD"}
                ]},
                {"name": "urgent_request", "label": "Urgent Request", "type": "boolean", "mandatory": false},
                {"name": "justification", "label": "Justification", "type": "textarea", "mandatory": true, "max_length": 1000},
                {"name": "preferred_delivery_date", "label": "Preferred Delivery Date", "type": "glide_date", "mandatory": false},
                {"name": "contact_email", "label": "Contact Email", "type": "email", "mandatory": true},
                {"name": "phone_number", "label": "Phone Number", "type": "string", "mandatory": false, "max_length": 20},
                {"name": "department", "label": "Department", "type": "reference", "mandatory": true, "reference": "cmn_department"},
                {"name": "attachments", "label": "Supporting Documents", "type": "file", "mandatory": false}
            ]
        }),
        json!({
            "sys_id": "cat-002",
            "name": "Software License Request",
            "short_description": "Request software licenses for your projects.",
            "description": "Software license request with team sizing and cost center approval.",
            "category": "Software",
            "picture": "/api/images/software-request.jpg",
            "active": true,
            "order": 2,
            "availability": "available",
            "variables": [
                {"name": "software_type", "label": "Software Type", "type": "choice", "mandatory": true, "choices": [
                    {"value": "development", "label": "Development Tools"},
                    {"value": "design", "label": "Design Software"},
                    {"value": "productivity", "label": "Productivity Suite"},
                    {"value": "other", "label": "Other"}
                ]},
                {"name": "software_name", "label": "Software Name", "type": "string", "mandatory": true, "max_length": 100},
                {"name": "license_type", "label": "License Type", "type": "choice", "mandatory": true, "choices": [
                    {"value": "individual", "label": "Individual License"},
                    {"value": "team", "label": "Team License"},
                    {"value": "enterprise", "label": "Enterprise License"}
                ]},
                {"name": "number_of_users", "label": "Number of Users", "type": "number", "mandatory": false,
                 "show_when": {"field": "license_type", "value": "team"}},
                {"name": "project_code", "label": "Project Code", "type": "string", "mandatory": false, "max_length": 20},
                {"name": "cost_center", "label": "Cost Center", "type": "reference", "mandatory": true, "reference": "cmn_cost_center"},
                {"name": "justification", "label": "Business Justification", "type": "textarea", "mandatory": true, "max_length": 500},
                {"name": "requested_by", "label": "Requested By", "type": "reference", "mandatory": true, "reference": "sys_user"}
            ]
        }),
        json!({
            "sys_id": "cat-003",
            "name": "Access Request",
            "short_description": "Request access to systems and applications.",
            "description": "Access request with fields that depend on the kind of access.",
            "category": "Access",
            "picture": "/api/images/access-request.jpg",
            "active": true,
            "order": 3,
            "availability": "available",
            "variables": [
                {"name": "access_type", "label": "Access Type", "type": "choice", "mandatory": true, "choices": [
                    {"value": "system", "label": "System Access"},
                    {"value": "application", "label": "Application Access"},
                    {"value": "database", "label": "Database Access"},
                    {"value": "network", "label": "Network Access"}
                ]},
                {"name": "system_name", "label": "System Name", "type": "string", "mandatory": true,
                 "show_when": {"field": "access_type", "value": "system"}},
                {"name": "application_name", "label": "Application Name", "type": "string", "mandatory": true,
                 "show_when": {"field": "access_type", "value": "application"}},
                {"name": "database_name", "label": "Database Name", "type": "string", "mandatory": true,
                 "show_when": {"field": "access_type", "value": "database"}},
                {"name": "network_location", "label": "Network Location", "type": "string", "mandatory": true,
                 "show_when": {"field": "access_type", "value": "network"}},
                {"name": "access_level", "label": "Access Level", "type": "choice", "mandatory": true, "choices": [
                    {"value": "read", "label": "Read Only"},
                    {"value": "write", "label": "Read/Write"},
                    {"value": "admin", "label": "Administrator"}
                ]},
                {"name": "duration", "label": "Access Duration", "type": "choice", "mandatory": true, "choices": [
                    {"value": "temporary", "label": "Temporary"},
                    {"value": "permanent", "label": "Permanent"}
                ]},
                {"name": "end_date", "label": "End Date", "type": "glide_date", "mandatory": true,
                 "show_when": {"field": "duration", "value": "temporary"}},
                {"name": "manager_approval", "label": "Manager Approval Required", "type": "boolean", "mandatory": false},
                {"name": "justification", "label": "Business Justification", "type": "textarea", "mandatory": true, "max_length": 300}
            ]
        }),
    ]
});

fn seed_requests() -> Vec<ServiceRequest> {
    [
        json!({
            "sys_id": "req-001",
            "number": "REQ-2023-001",
            "short_description": "Laptop Request - Dell Latitude",
            "description": "Request for a new Dell Latitude laptop with 16GB RAM and 512GB SSD for development work.",
            "category": "Hardware",
            "priority": "3",
            "state": "in_progress",
            "assigned_to": {"sys_id": "user-001", "name": "John Smith", "email": "john.smith@company.com"},
            "requested_by": {"sys_id": "user-002", "name": "Jane Doe", "email": "jane.doe@company.com"},
            "sys_created_on": "2023-12-01T10:00:00Z",
            "sys_updated_on": "2023-12-02T14:30:00Z"
        }),
        json!({
            "sys_id": "req-002",
            "number": "REQ-2023-002",
            "short_description": "Software License - Adobe Creative Suite",
            "description": "Request for Adobe Creative Suite license for design team.",
            "category": "Software",
            "priority": "2",
            "state": "new",
            "requested_by": {"sys_id": "user-003", "name": "Mike Johnson", "email": "mike.johnson@company.com"},
            "sys_created_on": "2023-12-03T09:15:00Z"
        }),
    ]
    .iter()
    .map(ServiceRequest::from_upstream)
    .collect()
}

static ARTICLES: Lazy<Vec<KnowledgeArticle>> = Lazy::new(|| {
    let raw = [
        (
            json!({
                "sys_id": "kb-001",
                "number": "KB-2023-001",
                "title": "How to Request a New Laptop",
                "short_description": "Step-by-step guide for requesting a new laptop through the service portal.",
                "text": "Open the catalog, pick Laptop Request, choose a model and fill in the justification.",
                "category": "Hardware",
                "subcategory": "Laptops",
                "author": {"sys_id": "user-001", "name": "John Smith"},
                "published": "2023-11-15T10:00:00Z",
                "view_count": 45,
                "helpful_count": 12
            }),
            ["laptop", "hardware", "request", "guide"],
        ),
        (
            json!({
                "sys_id": "kb-002",
                "number": "KB-2023-002",
                "title": "Software License Request Process",
                "short_description": "Understanding the software license request process and approval workflow.",
                "text": "License requests need a cost center and, for team licenses, the number of users.",
                "category": "Software",
                "subcategory": "Licenses",
                "author": {"sys_id": "user-004", "name": "Sarah Wilson"},
                "published": "2023-11-10T09:00:00Z",
                "view_count": 32,
                "helpful_count": 8
            }),
            ["software", "license", "process", "approval"],
        ),
    ];

    raw.iter()
        .map(|(value, tags)| {
            let mut article = KnowledgeArticle::from_upstream(value);
            article.tags = tags.iter().map(|t| t.to_string()).collect();
            article
        })
        .collect()
});

/// Fixed reference tables. Unknown tables have no rows.
pub struct FixtureLookup;

#[async_trait]
impl ReferenceLookup for FixtureLookup {
    async fn lookup(&self, table: &str) -> Result<Vec<Choice>> {
        let rows: &[(&str, &str)] = match table {
            "cmn_department" => &[
                ("dept-it", "IT"),
                ("dept-finance", "Finance"),
                ("dept-hr", "Human Resources"),
                ("dept-ops", "Operations"),
            ],
            "cmn_cost_center" => &[("cc-100", "CC-100 Engineering"), ("cc-200", "CC-200 Design"), ("cc-300", "CC-300 Sales")],
            "sys_user" => &[
                ("user-001", "John Smith"),
                ("user-002", "Jane Doe"),
                ("user-003", "Mike Johnson"),
                ("user-004", "Sarah Wilson"),
            ],
            _ => &[],
        };
        Ok(rows.iter().map(|(value, label)| Choice::new(*value, *label)).collect())
    }
}

/// Demo data service. Submissions are simulated and show up in the request
/// list for the lifetime of the service.
pub struct MockDataService {
    requests: RwLock<Vec<ServiceRequest>>,
}

impl Default for MockDataService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataService {
    pub fn new() -> Self {
        Self { requests: RwLock::new(seed_requests()) }
    }

    fn raw_item(id: &str) -> Result<&'static Value> {
        CATALOG
            .iter()
            .find(|item| item.get("sys_id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| PortalError::NotFound(format!("catalog item {}", id)))
    }

    fn raw_fields(raw: &Value) -> Vec<RawField> {
        raw.get("variables")
            .and_then(Value::as_array)
            .map(|vars| vars.iter().map(RawField::from_value).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataService for MockDataService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Mock
    }

    async fn list_catalog_items(&self, query: &ListQuery) -> Result<PaginatedResponse<CatalogItem>> {
        let items: Vec<CatalogItem> = CATALOG
            .iter()
            .map(CatalogItem::from_upstream)
            .filter(|item| query.matches_search(&[item.name.as_str(), item.short_description.as_str()]))
            .filter(|item| query.matches_category(&item.category))
            .filter(|item| query.availability.map_or(true, |a| a == item.availability))
            .collect();

        Ok(PaginatedResponse::paginate(items, query))
    }

    async fn get_catalog_item(&self, id: &str) -> Result<CatalogItem> {
        let raw = Self::raw_item(id)?;
        let mut item = CatalogItem::from_upstream(raw);
        item.fields = map_fields(&Self::raw_fields(raw), &FixtureLookup).await;
        Ok(item)
    }

    async fn get_item_form(&self, id: &str) -> Result<Vec<FieldDescriptor>> {
        let raw = Self::raw_item(id)?;
        Ok(map_fields(&Self::raw_fields(raw), &FixtureLookup).await)
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = Vec::new();
        for raw in CATALOG.iter() {
            let category = raw.get("category").map(display_value).unwrap_or_default();
            if !category.is_empty() && !categories.contains(&category) {
                categories.push(category);
            }
        }
        Ok(categories)
    }

    async fn submit_request(&self, item_id: &str, values: FormValues) -> Result<SubmissionOutcome> {
        let item = CatalogItem::from_upstream(Self::raw_item(item_id)?);
        let ctx = SubmissionContext {
            item: CatalogItemInfo {
                sys_id: item.sys_id.clone(),
                name: item.name.clone(),
                category: item.category.clone(),
                subcategory: item.subcategory.clone(),
            },
            form_values: values,
            request_number: generate_request_number(),
            submitter: "Current User".to_string(),
            incident_shaped: false,
        };
        let outcome = SimulatedStrategy.build(&ctx);

        self.requests.write().push(ServiceRequest::from_upstream(&json!({
            "sys_id": outcome.record_id,
            "number": outcome.display_number,
            "short_description": format!("Request for {}", item.name),
            "description": item.short_description,
            "category": item.category,
            "priority": "3",
            "state": "new",
            "requested_by": {"sys_id": "user-current", "name": "Current User", "email": "user@company.com"},
            "sys_created_on": outcome.created_at.to_rfc3339()
        })));
        info!(number = %outcome.display_number, item = %item.name, "demo request simulated");

        Ok(outcome)
    }

    async fn list_knowledge_articles(&self, query: &ListQuery) -> Result<PaginatedResponse<KnowledgeArticle>> {
        let articles: Vec<KnowledgeArticle> = ARTICLES
            .iter()
            .filter(|a| query.matches_search(&[a.title.as_str(), a.short_description.as_str()]))
            .filter(|a| query.matches_category(&a.category))
            .cloned()
            .collect();

        Ok(PaginatedResponse::paginate(articles, query))
    }

    async fn get_knowledge_article(&self, id: &str) -> Result<KnowledgeArticle> {
        ARTICLES
            .iter()
            .find(|a| a.sys_id == id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("knowledge article {}", id)))
    }

    async fn list_user_requests(&self, query: &ListQuery) -> Result<PaginatedResponse<ServiceRequest>> {
        let requests: Vec<ServiceRequest> = self
            .requests
            .read()
            .iter()
            .filter(|r| query.matches_search(&[r.number.as_str(), r.short_description.as_str()]))
            .filter(|r| query.status.as_deref().map_or(true, |s| s.is_empty() || s == r.state))
            .filter(|r| query.matches_category(&r.category))
            .cloned()
            .collect();

        Ok(PaginatedResponse::paginate(requests, query))
    }

    async fn get_request(&self, id: &str) -> Result<ServiceRequest> {
        self.requests
            .read()
            .iter()
            .find(|r| r.sys_id == id || r.number == id)
            .cloned()
            .ok_or_else(|| PortalError::NotFound(format!("request {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldKind, FormSchema};
    use crate::models::Availability;
    use crate::form::validate;

    #[tokio::test]
    async fn test_catalog_filters_and_paging() {
        let service = MockDataService::new();

        let all = service.list_catalog_items(&ListQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);

        let query = ListQuery { search: Some("LICENSE".into()), ..Default::default() };
        let found = service.list_catalog_items(&query).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].sys_id, "cat-002");

        let query = ListQuery { category: Some("Access".into()), ..Default::default() };
        assert_eq!(service.list_catalog_items(&query).await.unwrap().items[0].name, "Access Request");

        let query = ListQuery { availability: Some(Availability::Unavailable), ..Default::default() };
        assert_eq!(service.list_catalog_items(&query).await.unwrap().total, 0);

        let query = ListQuery { page: 2, limit: 2, ..Default::default() };
        let page = service.list_catalog_items(&query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages, 2);
    }

    #[tokio::test]
    async fn test_license_form_shows_users_for_team_only() {
        let service = MockDataService::new();
        let fields = service.get_item_form("cat-002").await.unwrap();
        let schema = FormSchema::new(fields).unwrap();

        let users = schema.field("number_of_users").unwrap();
        assert_eq!(users.kind, FieldKind::Number);
        assert_eq!(schema.field("cost_center").unwrap().choices.len(), 3);
        assert_eq!(schema.field("requested_by").unwrap().kind, FieldKind::Reference);

        let mut values = FormValues::new();
        values.set("license_type", "individual");
        assert!(!crate::form::is_visible(users, &values));
        values.set("license_type", "team");
        assert!(crate::form::is_visible(users, &values));
    }

    #[tokio::test]
    async fn test_access_form_conditional_requirements() {
        let service = MockDataService::new();
        let fields = service.get_item_form("cat-003").await.unwrap();

        let mut values = FormValues::new();
        values.set("access_type", "network");
        values.set("duration", "permanent");
        let errors = validate(&fields, &values);
        assert!(errors.contains_key("network_location"));
        assert!(!errors.contains_key("system_name"));
        assert!(!errors.contains_key("end_date"));
    }

    #[tokio::test]
    async fn test_unknown_reference_table_is_empty() {
        assert!(FixtureLookup.lookup("cmn_location").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_is_simulated_and_listed() {
        let service = MockDataService::new();
        let outcome = service.submit_request("cat-001", FormValues::new()).await.unwrap();
        assert!(outcome.is_simulated);
        assert!(outcome.display_number.starts_with("REQ"));

        let requests = service.list_user_requests(&ListQuery::default()).await.unwrap();
        assert_eq!(requests.total, 3);
        assert_eq!(service.get_request(&outcome.record_id).await.unwrap().state, "new");

        assert!(matches!(
            service.submit_request("cat-999", FormValues::new()).await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_knowledge_and_requests_fixtures() {
        let service = MockDataService::new();

        let query = ListQuery { search: Some("laptop".into()), ..Default::default() };
        let articles = service.list_knowledge_articles(&query).await.unwrap();
        assert_eq!(articles.items.len(), 1);
        assert_eq!(articles.items[0].tags.len(), 4);
        assert_eq!(service.get_knowledge_article("kb-002").await.unwrap().author.name, "Sarah Wilson");

        let query = ListQuery { status: Some("in_progress".into()), ..Default::default() };
        let requests = service.list_user_requests(&query).await.unwrap();
        assert_eq!(requests.items[0].assigned_to.as_ref().unwrap().name, "John Smith");

        assert_eq!(service.list_categories().await.unwrap(), vec!["Hardware", "Software", "Access"]);
    }
}
