//! CLI Commands

pub mod catalog;
pub mod config;
pub mod knowledge;
pub mod requests;
pub mod stored;
pub mod submit;

use anyhow::{anyhow, Result};
use portal_core::{DataService, FieldDescriptor, FieldKind, RequestLedger};
use serde_json::Value;
use std::sync::Arc;

use crate::output::OutputFormat;

/// What every command runs against.
pub struct Portal {
    pub service: Arc<dyn DataService>,
    pub ledger: Arc<RequestLedger>,
    pub submitted_by: String,
    pub format: OutputFormat,
}

/// Splits a `name=value` assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
        _ => Err(anyhow!("expected name=value, got '{}'", raw)),
    }
}

/// Converts typed text to the value a form field holds. Unknown fields and
/// text that does not parse for the field's kind stay strings.
pub fn coerce(field: Option<&FieldDescriptor>, raw: String) -> Value {
    match field.map(|f| f.kind) {
        Some(FieldKind::Boolean) => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Value::Bool(true),
            "false" | "no" | "0" | "off" | "" => Value::Bool(false),
            _ => Value::String(raw),
        },
        Some(FieldKind::Number) => match raw.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => match raw.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Some(n) => Value::Number(n),
                None => Value::String(raw),
            },
        },
        _ => Value::String(raw),
    }
}

/// Applies `name=value` assignments against a field list.
pub fn assignments(fields: &[FieldDescriptor], raw: &[String]) -> Result<Vec<(String, Value)>> {
    raw.iter()
        .map(|a| {
            let (name, value) = parse_assignment(a)?;
            let field = fields.iter().find(|f| f.name == name);
            Ok((name, coerce(field, value)))
        })
        .collect()
}
