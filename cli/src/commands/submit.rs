//! Submit command

use anyhow::{anyhow, Result};
use colored::Colorize;
use portal_core::form::{FormError, Notice};
use portal_core::service::CatalogSubmission;
use portal_core::{FormSchema, FormSession, SubmissionOutcome};

use super::{assignments, Portal};
use crate::output::OutputFormat;

/// Fills the item's form from `values` and submits it. The session keeps
/// the notice and the field errors for the caller to show.
pub async fn submit(
    portal: &Portal,
    id: &str,
    values: &[String],
    store: bool,
) -> Result<(FormSession, std::result::Result<SubmissionOutcome, FormError>)> {
    let item = portal.service.get_catalog_item(id).await?;
    let fields = portal.service.get_item_form(id).await?;
    let entered = assignments(&fields, values)?;

    let session = FormSession::new(FormSchema::new(fields)?);
    for (name, value) in entered {
        session.set_value(name, value);
    }

    let mut handler = CatalogSubmission::new(portal.service.clone(), item.reference(), portal.submitted_by.clone());
    if store {
        handler = handler.with_ledger(portal.ledger.clone());
    }

    let result = session.submit(&handler).await;
    Ok((session, result))
}

pub async fn handle(portal: &Portal, id: &str, values: &[String], no_store: bool) -> Result<()> {
    let (session, result) = submit(portal, id, values, !no_store).await?;

    match result {
        Ok(outcome) => {
            if let Some(Notice::Success(message)) = session.notice() {
                eprintln!("{}", message.green());
            }
            match portal.format {
                OutputFormat::Table => portal.format.print(&portal_core::wire::CreateRequestData::from(&outcome)),
                _ => portal.format.print(&outcome),
            }
        }
        Err(FormError::Invalid(errors)) => {
            for (field, error) in &errors {
                eprintln!("  {} {}", format!("{}:", field).yellow(), error);
            }
            let notice = session.notice().map(|n| n.message().to_string()).unwrap_or_default();
            Err(anyhow!(notice))
        }
        Err(e) => {
            let notice = session.notice().map(|n| n.message().to_string()).unwrap_or_else(|| e.to_string());
            Err(anyhow!("{}: {}", notice, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::{MockDataService, RequestLedger, RequestStatus};
    use std::sync::Arc;

    fn demo_portal() -> Portal {
        Portal {
            service: Arc::new(MockDataService::new()),
            ledger: Arc::new(RequestLedger::in_memory()),
            submitted_by: "jane.doe".to_string(),
            format: OutputFormat::Json,
        }
    }

    fn laptop_values() -> Vec<String> {
        [
            "request_type=new",
            "laptop_model=dell_latitude",
            "ram_size=16",
            "storage_size=512",
            "justification=new hire",
            "contact_email=jane.doe@company.com",
            "department=dept-it",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[tokio::test]
    async fn test_submission_is_stored() {
        let portal = demo_portal();
        let (_, result) = submit(&portal, "cat-001", &laptop_values(), true).await.unwrap();
        let outcome = result.unwrap();

        let stored = portal.ledger.find_by_number(&outcome.display_number).unwrap();
        assert_eq!(stored.submitted_by, "jane.doe");
        assert_eq!(stored.status, RequestStatus::PendingManualProcessing);
    }

    #[tokio::test]
    async fn test_no_store_skips_ledger() {
        let portal = demo_portal();
        let (_, result) = submit(&portal, "cat-001", &laptop_values(), false).await.unwrap();
        assert!(result.is_ok());
        assert!(portal.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_missing_fields_keep_errors() {
        let portal = demo_portal();
        let (session, result) = submit(&portal, "cat-001", &["ram_size=16".to_string()], true).await.unwrap();

        match result {
            Err(FormError::Invalid(errors)) => assert!(errors.contains_key("request_type")),
            other => panic!("expected validation failure, got {:?}", other.map(|o| o.display_number)),
        }
        assert_eq!(session.notice().unwrap().message(), "Please fix the errors in the form");
        assert_eq!(session.values().get("ram_size"), Some(&serde_json::json!("16")));
        assert!(portal.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let portal = demo_portal();
        assert!(submit(&portal, "cat-999", &[], true).await.is_err());
    }
}
