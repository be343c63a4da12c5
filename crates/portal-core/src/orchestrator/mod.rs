//! Request submission orchestrator
//!
//! Turns a catalog item id plus form values into a record upstream. Creation
//! strategies are tried strictly in order and the first one that produces a
//! record wins. When all of them fail, a fully simulated outcome is built
//! locally, so [`SubmissionOrchestrator::submit`] always returns an outcome.
//!
//! Default order:
//!
//! 1. incident (incident-shaped items only)
//! 2. request + request item (other items; the parent may be a placeholder)
//! 3. incident as fallback (any item)
//! 4. full simulation

mod classify;
mod payload;
mod strategies;

pub use classify::{IncidentClassifier, KeywordClassifier};
pub use payload::{generate_request_number, placeholder_id, placeholder_number};
pub use strategies::{IncidentStrategy, RequestPairStrategy, SimulatedStrategy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::form::FormValues;
use crate::models::display_value;
use crate::upstream::ItsmClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyTag {
    #[serde(rename = "incident")]
    Incident,
    #[serde(rename = "request+item")]
    RequestItem,
    #[serde(rename = "incident-fallback")]
    IncidentFallback,
    #[serde(rename = "simulated")]
    Simulated,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Incident => "incident",
            StrategyTag::RequestItem => "request+item",
            StrategyTag::IncidentFallback => "incident-fallback",
            StrategyTag::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dependent request item of a request + item pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItemRef {
    pub sys_id: String,
    pub number: String,
    /// sys_id of the parent request.
    pub request: String,
    pub cat_item: String,
    pub short_description: String,
    pub table: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub strategy_used: StrategyTag,
    pub record_id: String,
    pub display_number: String,
    pub created_at: DateTime<Utc>,
    /// True when any part of the result was synthesized locally.
    pub is_simulated: bool,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_item: Option<RequestItemRef>,
}

impl SubmissionOutcome {
    pub fn record_type(&self) -> &'static str {
        match self.strategy_used {
            StrategyTag::Incident | StrategyTag::IncidentFallback => "incident",
            StrategyTag::RequestItem | StrategyTag::Simulated if self.is_simulated => {
                "simulated_request_with_items"
            }
            StrategyTag::RequestItem | StrategyTag::Simulated => "request_with_items",
        }
    }
}

/// What the orchestrator knows about the catalog item being ordered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogItemInfo {
    pub sys_id: String,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
}

impl CatalogItemInfo {
    pub fn from_upstream(raw: &Value, id: &str) -> Self {
        let text = |key: &str| raw.get(key).map(display_value).unwrap_or_default();
        let name = text("name");

        Self {
            sys_id: Some(text("sys_id")).filter(|s| !s.is_empty()).unwrap_or_else(|| id.to_string()),
            name: if name.is_empty() { id.to_string() } else { name },
            category: text("category"),
            subcategory: Some(text("subcategory")).filter(|s| !s.is_empty()),
        }
    }

    /// Stand-in used when the item could not be fetched.
    pub fn unknown(id: &str) -> Self {
        Self { sys_id: id.to_string(), name: id.to_string(), ..Default::default() }
    }
}

/// Everything a strategy needs to build its payloads.
#[derive(Clone, Debug)]
pub struct SubmissionContext {
    pub item: CatalogItemInfo,
    pub form_values: FormValues,
    pub request_number: String,
    /// Recorded as caller / requested for.
    pub submitter: String,
    pub incident_shaped: bool,
}

/// One tier of the cascade. `None` means "no record, try the next tier".
#[async_trait]
pub trait CreationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, ctx: &SubmissionContext, client: &dyn ItsmClient) -> Option<SubmissionOutcome>;
}

pub struct SubmissionOrchestrator {
    client: Arc<dyn ItsmClient>,
    classifier: Box<dyn IncidentClassifier>,
    strategies: Vec<Box<dyn CreationStrategy>>,
    submitter: String,
}

impl SubmissionOrchestrator {
    pub fn new(client: Arc<dyn ItsmClient>, submitter: impl Into<String>) -> Self {
        Self {
            client,
            classifier: Box::new(KeywordClassifier::default()),
            strategies: vec![
                Box::new(IncidentStrategy::primary()),
                Box::new(RequestPairStrategy),
                Box::new(IncidentStrategy::fallback()),
            ],
            submitter: submitter.into(),
        }
    }

    pub fn with_classifier(mut self, classifier: impl IncidentClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Replaces the fallible tiers. The simulated tier always runs last.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn CreationStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(SimulatedStrategy.name()))
            .collect()
    }

    pub async fn submit(&self, catalog_item_id: &str, form_values: FormValues) -> SubmissionOutcome {
        self.submit_with_number(catalog_item_id, form_values, None).await
    }

    /// Runs the cascade. Not idempotent: every call creates a new record or
    /// placeholder.
    pub async fn submit_with_number(
        &self,
        catalog_item_id: &str,
        form_values: FormValues,
        request_number: Option<String>,
    ) -> SubmissionOutcome {
        let item = match self.client.get_catalog_item(catalog_item_id).await {
            Ok(raw) => CatalogItemInfo::from_upstream(&raw, catalog_item_id),
            Err(e) => {
                warn!(item = %catalog_item_id, error = %e, "catalog item lookup failed, classifying by id");
                CatalogItemInfo::unknown(catalog_item_id)
            }
        };

        let incident_shaped = self.classifier.is_incident(&item);
        info!(item = %item.name, category = %item.category, incident_shaped, "submitting catalog request");

        let ctx = SubmissionContext {
            item,
            form_values,
            request_number: request_number
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(generate_request_number),
            submitter: self.submitter.clone(),
            incident_shaped,
        };

        for strategy in &self.strategies {
            if let Some(outcome) = strategy.attempt(&ctx, self.client.as_ref()).await {
                info!(
                    strategy = strategy.name(),
                    number = %outcome.display_number,
                    simulated = outcome.is_simulated,
                    "request created"
                );
                return outcome;
            }
        }

        warn!(item = %ctx.item.name, "every creation tier failed, simulating request");
        SimulatedStrategy.build(&ctx)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;
    use serde_json::json;

    fn values() -> FormValues {
        let mut v = FormValues::new();
        v.set("justification", "new hire");
        v
    }

    fn orchestrator(client: ScriptedClient) -> (Arc<ScriptedClient>, SubmissionOrchestrator) {
        let client = Arc::new(client);
        let orch = SubmissionOrchestrator::new(client.clone(), "ext.portal");
        (client, orch)
    }

    #[tokio::test]
    async fn test_incident_shaped_item_creates_incident() {
        let (client, orch) =
            orchestrator(ScriptedClient::new(json!({"name": "Report system outage", "category": "Hardware"})));

        let outcome = orch.submit("item1", values()).await;

        assert_eq!(outcome.strategy_used, StrategyTag::Incident);
        assert!(!outcome.is_simulated);
        assert_eq!(outcome.display_number, "INC0010001");
        assert_eq!(outcome.record_type(), "incident");
        assert_eq!(client.created_tables(), vec!["incident"]);

        let body = client.body_for("incident").unwrap();
        assert_eq!(body["short_description"], "System Issue: Report system outage");
        assert_eq!(body["caller_id"], "ext.portal");
    }

    #[tokio::test]
    async fn test_request_pair_for_regular_item() {
        let (client, orch) = orchestrator(ScriptedClient::new(json!({"name": "Laptop", "category": "Hardware"})));

        let outcome = orch.submit_with_number("item2", values(), Some("REQ123456".into())).await;

        assert_eq!(outcome.strategy_used, StrategyTag::RequestItem);
        assert!(!outcome.is_simulated);
        assert_eq!(outcome.record_id, "sc_request_1");
        assert_eq!(outcome.record_type(), "request_with_items");
        let item = outcome.request_item.unwrap();
        assert_eq!(item.request, "sc_request_1");
        assert_eq!(item.number, "RITM0010001");

        let body = client.body_for("sc_req_item").unwrap();
        assert_eq!(body["request"], "sc_request_1");
        assert_eq!(body["cat_item"], "item2");
        assert!(client.body_for("sc_request").unwrap()["description"]
            .as_str()
            .unwrap()
            .contains("Request Number: REQ123456"));
    }

    #[tokio::test]
    async fn test_failed_parent_uses_placeholder() {
        let (client, orch) =
            orchestrator(ScriptedClient::new(json!({"name": "Laptop", "category": "Hardware"})).failing(&["sc_request"]));

        let outcome = orch.submit("item2", values()).await;

        assert_eq!(outcome.strategy_used, StrategyTag::RequestItem);
        assert!(outcome.is_simulated);
        assert!(outcome.record_id.starts_with("sim_"));
        assert!(outcome.display_number.starts_with("REQ"));
        assert_eq!(outcome.record_type(), "simulated_request_with_items");

        let body = client.body_for("sc_req_item").unwrap();
        assert_eq!(body["request"], json!(outcome.record_id));
    }

    #[tokio::test]
    async fn test_failed_pair_falls_back_to_incident() {
        let (client, orch) = orchestrator(
            ScriptedClient::new(json!({"name": "Laptop"})).failing(&["sc_request", "sc_req_item"]),
        );

        let outcome = orch.submit("item2", values()).await;

        assert_eq!(outcome.strategy_used, StrategyTag::IncidentFallback);
        assert!(!outcome.is_simulated);
        assert_eq!(client.created_tables(), vec!["sc_request", "sc_req_item", "incident"]);
        assert_eq!(client.body_for("incident").unwrap()["short_description"], "Request: Laptop");
        assert_eq!(client.body_for("incident").unwrap()["category"], "General");
    }

    #[tokio::test]
    async fn test_everything_failing_is_simulated() {
        let (_client, orch) = orchestrator(
            ScriptedClient::new(json!({"name": "VPN issue"}))
                .failing(&["incident", "sc_request", "sc_req_item"])
                .without_item(),
        );

        let outcome = orch.submit("item3", values()).await;

        assert_eq!(outcome.strategy_used, StrategyTag::Simulated);
        assert!(outcome.is_simulated);
        assert!(!outcome.record_id.is_empty());
        assert!(!outcome.display_number.is_empty());
        assert!(outcome.request_item.is_some());
    }

    #[tokio::test]
    async fn test_custom_classifier_and_strategy_names() {
        let (client, orch) = orchestrator(ScriptedClient::new(json!({"name": "Laptop"})));
        let orch = orch.with_classifier(|item: &CatalogItemInfo| item.name == "Laptop");

        let outcome = orch.submit("item2", values()).await;
        assert_eq!(outcome.strategy_used, StrategyTag::Incident);
        assert_eq!(client.created_tables(), vec!["incident"]);
        assert_eq!(orch.strategy_names(), vec!["incident", "request+item", "incident-fallback", "simulated"]);
    }

    #[tokio::test]
    async fn test_not_idempotent() {
        let (client, orch) = orchestrator(ScriptedClient::new(json!({"name": "Laptop"})));
        orch.submit("item2", values()).await;
        orch.submit("item2", values()).await;
        assert_eq!(client.created_tables().len(), 4);
    }

    #[test]
    fn test_outcome_serializes_strategy_tag() {
        let outcome = SimulatedStrategy.build(&SubmissionContext {
            item: CatalogItemInfo::unknown("x"),
            form_values: FormValues::new(),
            request_number: "REQ000001".into(),
            submitter: "portal".into(),
            incident_shaped: false,
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["strategy_used"], "simulated");
        assert_eq!(json["table"], "sc_request");
    }
}
