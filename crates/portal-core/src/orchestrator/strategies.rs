use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::payload::{
    incident_payload, placeholder_id, placeholder_number, request_item_payload, request_item_title, request_payload,
};
use super::{CreationStrategy, RequestItemRef, StrategyTag, SubmissionContext, SubmissionOutcome};
use crate::upstream::{ItsmClient, Table, UpstreamRecord};

/// Record id and number, with placeholders filling whatever upstream left out.
fn identify(record: &UpstreamRecord, fallback_number: &str) -> (String, String) {
    (
        record.sys_id().unwrap_or_else(placeholder_id),
        record.number().unwrap_or_else(|| fallback_number.to_string()),
    )
}

/// Creates an incident. The primary variant only runs for incident-shaped
/// items; the fallback variant runs for anything.
pub struct IncidentStrategy {
    fallback: bool,
}

impl IncidentStrategy {
    pub fn primary() -> Self {
        Self { fallback: false }
    }

    pub fn fallback() -> Self {
        Self { fallback: true }
    }
}

#[async_trait]
impl CreationStrategy for IncidentStrategy {
    fn name(&self) -> &'static str {
        if self.fallback {
            "incident-fallback"
        } else {
            "incident"
        }
    }

    async fn attempt(&self, ctx: &SubmissionContext, client: &dyn ItsmClient) -> Option<SubmissionOutcome> {
        if !self.fallback && !ctx.incident_shaped {
            return None;
        }

        let body = incident_payload(ctx, !self.fallback);
        match client.create_record(&Table::Incident, &body).await {
            Ok(record) => {
                let (record_id, display_number) = identify(&record, &ctx.request_number);
                Some(SubmissionOutcome {
                    strategy_used: if self.fallback { StrategyTag::IncidentFallback } else { StrategyTag::Incident },
                    record_id,
                    display_number,
                    created_at: Utc::now(),
                    is_simulated: false,
                    table: Table::Incident.to_string(),
                    request_item: None,
                })
            }
            Err(e) => {
                warn!(strategy = self.name(), error = %e, "incident creation failed");
                None
            }
        }
    }
}

/// Creates a parent request and a dependent request item. A failed parent is
/// replaced by a placeholder and the item is still attempted; a failed item
/// under a real parent is replaced by a placeholder. Only when both writes
/// fail does the tier give up.
pub struct RequestPairStrategy;

#[async_trait]
impl CreationStrategy for RequestPairStrategy {
    fn name(&self) -> &'static str {
        "request+item"
    }

    async fn attempt(&self, ctx: &SubmissionContext, client: &dyn ItsmClient) -> Option<SubmissionOutcome> {
        if ctx.incident_shaped {
            return None;
        }

        let (parent_id, parent_number, parent_real) =
            match client.create_record(&Table::Request, &request_payload(ctx)).await {
                Ok(record) => {
                    let (id, number) = identify(&record, &ctx.request_number);
                    (id, number, true)
                }
                Err(e) => {
                    warn!(error = %e, "request creation failed, using placeholder parent");
                    (placeholder_id(), placeholder_number("REQ"), false)
                }
            };

        let item_body = request_item_payload(ctx, &parent_id, &parent_number);
        let (item_id, item_number, item_real) = match client.create_record(&Table::RequestItem, &item_body).await {
            Ok(record) => {
                let (id, number) = identify(&record, &placeholder_number("RITM"));
                (id, number, true)
            }
            Err(e) if parent_real => {
                warn!(error = %e, "request item creation failed, using placeholder item");
                (placeholder_id(), placeholder_number("RITM"), false)
            }
            Err(e) => {
                warn!(error = %e, "request and request item creation both failed");
                return None;
            }
        };
        debug!(parent = %parent_id, item = %item_id, "request pair built");

        Some(SubmissionOutcome {
            strategy_used: StrategyTag::RequestItem,
            record_id: parent_id.clone(),
            display_number: parent_number,
            created_at: Utc::now(),
            is_simulated: !(parent_real && item_real),
            table: Table::Request.to_string(),
            request_item: Some(RequestItemRef {
                sys_id: item_id,
                number: item_number,
                request: parent_id,
                cat_item: ctx.item.sys_id.clone(),
                short_description: request_item_title(ctx),
                table: Table::RequestItem.to_string(),
            }),
        })
    }
}

/// Terminal tier: placeholder parent and item, built locally. Cannot fail.
pub struct SimulatedStrategy;

impl SimulatedStrategy {
    pub fn name(&self) -> &'static str {
        "simulated"
    }

    pub fn build(&self, ctx: &SubmissionContext) -> SubmissionOutcome {
        let parent_id = placeholder_id();

        SubmissionOutcome {
            strategy_used: StrategyTag::Simulated,
            record_id: parent_id.clone(),
            display_number: placeholder_number("REQ"),
            created_at: Utc::now(),
            is_simulated: true,
            table: Table::Request.to_string(),
            request_item: Some(RequestItemRef {
                sys_id: placeholder_id(),
                number: placeholder_number("RITM"),
                request: parent_id,
                cat_item: ctx.item.sys_id.clone(),
                short_description: request_item_title(ctx),
                table: Table::RequestItem.to_string(),
            }),
        }
    }
}
