//! Request commands

use anyhow::Result;
use portal_core::models::ServiceRequest;
use tabled::Tabled;

use super::Portal;
use crate::output::truncate;
use crate::RequestCommands;

#[derive(Tabled)]
struct RequestRow {
    #[tabled(rename = "Number")]
    number: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Assigned To")]
    assigned_to: String,
    #[tabled(rename = "Created")]
    created: String,
}

impl From<&ServiceRequest> for RequestRow {
    fn from(r: &ServiceRequest) -> Self {
        Self {
            number: r.number.clone(),
            description: truncate(&r.short_description, 50),
            state: r.state.clone(),
            priority: r.priority.clone(),
            assigned_to: r.assigned_to.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            created: r.created_on.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(action: RequestCommands, portal: &Portal) -> Result<()> {
    match action {
        RequestCommands::List { list, state } => {
            let mut query = list.query();
            query.status = state;
            let page = portal.service.list_user_requests(&query).await?;
            portal.format.print_list(&page, || page.items.iter().map(RequestRow::from).collect())?;
        }
        RequestCommands::Get { id } => {
            let request = portal.service.get_request(&id).await?;
            portal.format.print(&request)?;
        }
    }
    Ok(())
}
