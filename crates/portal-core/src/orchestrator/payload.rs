//! Record bodies and placeholder identifiers.

use chrono::Utc;
use serde_json::{json, Value};

use super::SubmissionContext;

const FOOTER: &str = "Submitted via External Portal.";

/// `sim_<millis>_<9 lowercase alphanumerics>`
pub fn placeholder_id() -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(9).collect();
    format!("sim_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Prefix plus the last six digits of the millisecond clock, e.g. `REQ482913`.
pub fn placeholder_number(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let tail = &millis[millis.len().saturating_sub(6)..];
    format!("{}{}", prefix, tail)
}

pub fn generate_request_number() -> String {
    placeholder_number("REQ")
}

fn pretty_values(ctx: &SubmissionContext) -> String {
    serde_json::to_string_pretty(&ctx.form_values).unwrap_or_else(|_| "{}".to_string())
}

fn category_or(ctx: &SubmissionContext, default: &str) -> String {
    if ctx.item.category.is_empty() {
        default.to_string()
    } else {
        ctx.item.category.clone()
    }
}

fn description(heading: &str, reference: (&str, &str), ctx: &SubmissionContext, category: Option<&str>) -> String {
    let mut lines = vec![
        format!("{}:", heading),
        String::new(),
        format!("{}: {}", reference.0, reference.1),
        format!("Catalog Item: {}", ctx.item.name),
    ];
    if let Some(category) = category {
        lines.push(format!("Category: {}", category));
    }
    lines.push(format!("Form Data: {}", pretty_values(ctx)));
    lines.push(String::new());
    lines.push(FOOTER.to_string());
    lines.join("\n")
}

/// Incident body. `primary` selects the system-issue wording; otherwise the
/// fallback request wording is used.
pub fn incident_payload(ctx: &SubmissionContext, primary: bool) -> Value {
    let (title, heading, default_category, default_subcategory) = if primary {
        ("System Issue", "System Issue Report", "Technical Support", "System Issues")
    } else {
        ("Request", "Request Details (Fallback)", "General", "Request")
    };
    let category = category_or(ctx, default_category);

    json!({
        "short_description": format!("{}: {}", title, ctx.item.name),
        "description": description(heading, ("Request Number", &ctx.request_number), ctx, Some(&category)),
        "caller_id": ctx.submitter,
        "category": category,
        "subcategory": ctx.item.subcategory.clone().unwrap_or_else(|| default_subcategory.to_string()),
        "impact": "2",
        "urgency": "2",
        "assignment_group": "",
        "cmdb_ci": "",
        "contact_type": "self-service",
        "priority": "3",
    })
}

pub fn request_payload(ctx: &SubmissionContext) -> Value {
    let category = category_or(ctx, "General");

    json!({
        "short_description": format!("Request for {}", ctx.item.name),
        "description": description("Catalog Request Details", ("Request Number", &ctx.request_number), ctx, Some(&category)),
        "requested_for": ctx.submitter,
        "requested_by": ctx.submitter,
        "category": category,
        "subcategory": ctx.item.subcategory.clone().unwrap_or_else(|| "Catalog Request".to_string()),
        "impact": "2",
        "urgency": "2",
        "priority": "3",
    })
}

pub fn request_item_payload(ctx: &SubmissionContext, parent_id: &str, parent_number: &str) -> Value {
    json!({
        "request": parent_id,
        "cat_item": ctx.item.sys_id,
        "short_description": request_item_title(ctx),
        "description": description("Request Item Details", ("Request", parent_number), ctx, None),
        "requested_for": ctx.submitter,
        "quantity": 1,
    })
}

pub fn request_item_title(ctx: &SubmissionContext) -> String {
    format!("Request Item: {}", ctx.item.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormValues;
    use crate::orchestrator::CatalogItemInfo;

    fn ctx(category: &str) -> SubmissionContext {
        let mut values = FormValues::new();
        values.set("quantity", 2);
        SubmissionContext {
            item: CatalogItemInfo {
                sys_id: "cat1".into(),
                name: "Laptop".into(),
                category: category.into(),
                subcategory: None,
            },
            form_values: values,
            request_number: "REQ654321".into(),
            submitter: "ext.portal".into(),
            incident_shaped: false,
        }
    }

    #[test]
    fn test_placeholder_formats() {
        let id = placeholder_id();
        let parts: Vec<_> = id.splitn(3, '_').collect();
        assert_eq!(parts[0], "sim");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        let number = placeholder_number("RITM");
        assert!(number.starts_with("RITM"));
        assert_eq!(number.len(), 10);
    }

    #[test]
    fn test_incident_defaults() {
        let primary = incident_payload(&ctx(""), true);
        assert_eq!(primary["category"], "Technical Support");
        assert_eq!(primary["subcategory"], "System Issues");
        assert_eq!(primary["impact"], "2");
        assert_eq!(primary["priority"], "3");

        let fallback = incident_payload(&ctx("Hardware"), false);
        assert_eq!(fallback["short_description"], "Request: Laptop");
        assert_eq!(fallback["category"], "Hardware");
        let description = fallback["description"].as_str().unwrap();
        assert!(description.contains("Request Number: REQ654321"));
        assert!(description.contains("\"quantity\": 2"));
        assert!(description.ends_with(FOOTER));
    }

    #[test]
    fn test_request_item_links_parent() {
        let body = request_item_payload(&ctx(""), "sim_1_abc", "REQ000001");
        assert_eq!(body["request"], "sim_1_abc");
        assert_eq!(body["cat_item"], "cat1");
        assert_eq!(body["quantity"], 1);
        assert!(body["description"].as_str().unwrap().contains("Request: REQ000001"));
    }
}
