//! Locally stored requests

use anyhow::{anyhow, Result};
use portal_core::{RequestLedger, RequestStatus, StoredRequest};
use tabled::Tabled;

use super::Portal;
use crate::StoredCommands;

#[derive(Tabled)]
struct StoredRow {
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "Item")]
    item: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Submitted")]
    submitted: String,
    #[tabled(rename = "By")]
    by: String,
}

impl From<&StoredRequest> for StoredRow {
    fn from(r: &StoredRequest) -> Self {
        Self {
            number: r.number.clone(),
            item: r.catalog_item.name.clone(),
            status: r.status.to_string(),
            table: r.table.clone().unwrap_or_default(),
            submitted: r.submitted_at.format("%Y-%m-%d %H:%M").to_string(),
            by: r.submitted_by.clone(),
        }
    }
}

/// Looks a stored request up by display number, then by record id.
pub fn find(ledger: &RequestLedger, key: &str) -> Option<StoredRequest> {
    ledger.find_by_number(key).or_else(|| ledger.find_by_record_id(key))
}

pub fn set_status(ledger: &RequestLedger, number: &str, status: &str) -> Result<RequestStatus> {
    let status: RequestStatus = status.parse()?;
    if !ledger.update_status(number, status)? {
        return Err(anyhow!("No stored request {}", number));
    }
    Ok(status)
}

pub fn handle(action: StoredCommands, portal: &Portal) -> Result<()> {
    match action {
        StoredCommands::List => {
            let requests = portal.ledger.list_newest_first();
            portal.format.print_list(&requests, || requests.iter().map(StoredRow::from).collect())?;
        }
        StoredCommands::Get { key } => {
            let request = find(&portal.ledger, &key).ok_or_else(|| anyhow!("No stored request {}", key))?;
            portal.format.print(&request)?;
        }
        StoredCommands::Status { number, status } => {
            let status = set_status(&portal.ledger, &number, &status)?;
            println!("{} is now {}", number, status);
        }
        StoredCommands::Clear => {
            let count = portal.ledger.len();
            portal.ledger.clear()?;
            println!("Removed {} stored request(s)", count);
        }
    }
    Ok(())
}
