//! Create-request wire format shared by the proxy server and its clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::form::FormValues;
use crate::orchestrator::{RequestItemRef, StrategyTag, SubmissionOutcome};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub catalog_item_id: String,
    #[serde(default)]
    pub form_data: FormValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_number: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRequestData {
    pub sys_id: String,
    pub number: String,
    pub table: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub record_type: String,
    #[serde(default)]
    pub strategy: Option<StrategyTag>,
    #[serde(default)]
    pub simulated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_item: Option<RequestItemRef>,
}

impl From<&SubmissionOutcome> for CreateRequestData {
    fn from(outcome: &SubmissionOutcome) -> Self {
        Self {
            sys_id: outcome.record_id.clone(),
            number: outcome.display_number.clone(),
            table: outcome.table.clone(),
            created_at: Some(outcome.created_at),
            record_type: outcome.record_type().to_string(),
            strategy: Some(outcome.strategy_used),
            simulated: Some(outcome.is_simulated),
            req_item: outcome.request_item.clone(),
        }
    }
}

impl CreateRequestData {
    /// Rebuilds the outcome. Older servers omit `strategy` and `simulated`;
    /// those are inferred from the record type and the record id.
    pub fn into_outcome(self) -> SubmissionOutcome {
        let simulated = self.simulated.unwrap_or_else(|| {
            self.record_type == "simulated_request_with_items" || self.sys_id.starts_with("sim_")
        });
        let strategy = self.strategy.unwrap_or(match self.record_type.as_str() {
            "incident" => StrategyTag::Incident,
            _ => StrategyTag::RequestItem,
        });

        SubmissionOutcome {
            strategy_used: strategy,
            record_id: self.sys_id,
            display_number: self.number,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            is_simulated: simulated,
            table: self.table,
            request_item: self.req_item,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRequestResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CreateRequestData>,
}

impl CreateRequestResponse {
    pub fn created(outcome: &SubmissionOutcome) -> Self {
        let message = if outcome.is_simulated {
            format!("Request {} recorded; some records were simulated and need manual processing", outcome.display_number)
        } else {
            format!("Request {} created successfully", outcome.display_number)
        };
        Self { success: true, message, data: Some(outcome.into()) }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_uses_camel_case() {
        let body: CreateRequestBody = serde_json::from_value(json!({
            "catalogItemId": "cat-001",
            "formData": {"ram_size": "16"},
            "requestNumber": "REQ123456"
        }))
        .unwrap();
        assert_eq!(body.catalog_item_id, "cat-001");
        assert_eq!(body.form_data.get("ram_size"), Some(&json!("16")));
    }

    #[test]
    fn test_legacy_response_infers_simulation() {
        let data: CreateRequestData = serde_json::from_value(json!({
            "sys_id": "sim_1700000000000_abcdefghi",
            "number": "REQ000001",
            "table": "sc_request",
            "record_type": "simulated_request_with_items"
        }))
        .unwrap();
        let outcome = data.into_outcome();
        assert!(outcome.is_simulated);
        assert_eq!(outcome.strategy_used, StrategyTag::RequestItem);
    }

    #[test]
    fn test_incident_record_type() {
        let data: CreateRequestData = serde_json::from_value(json!({
            "sys_id": "abc", "number": "INC0010001", "table": "incident", "record_type": "incident"
        }))
        .unwrap();
        let outcome = data.into_outcome();
        assert_eq!(outcome.strategy_used, StrategyTag::Incident);
        assert!(!outcome.is_simulated);
    }
}
