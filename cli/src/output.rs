//! Output formatting

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Prints a single record. Table mode renders it as a two-column
    /// field/value table.
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(data)?),
            OutputFormat::Table => {
                let rows = match serde_json::to_value(data)? {
                    serde_json::Value::Object(map) => map
                        .into_iter()
                        .map(|(field, value)| FieldRow { field, value: cell(&value) })
                        .collect(),
                    other => vec![FieldRow { field: "value".into(), value: cell(&other) }],
                };
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
        Ok(())
    }

    /// Prints a collection. `rows` is only built for table output.
    pub fn print_list<T, R, F>(&self, data: &T, rows: F) -> Result<()>
    where
        T: Serialize,
        R: Tabled,
        F: FnOnce() -> Vec<R>,
    {
        match self {
            OutputFormat::Table => {
                let rows = rows();
                if rows.is_empty() {
                    println!("(none)");
                } else {
                    println!("{}", Table::new(rows).with(Style::rounded()));
                }
                Ok(())
            }
            _ => self.print(data),
        }
    }
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Flattens a JSON value for a table cell.
pub fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) if items.iter().all(|v| !v.is_object()) => {
            items.iter().map(cell).collect::<Vec<_>>().join(", ")
        }
        other => other.to_string(),
    }
}

/// Cuts long text for table columns.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell() {
        assert_eq!(cell(&json!(null)), "");
        assert_eq!(cell(&json!("text")), "text");
        assert_eq!(cell(&json!(["vpn", "remote"])), "vpn, remote");
        assert_eq!(cell(&json!({"name": "John"})), r#"{"name":"John"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("המערכת לא עובדת", 6), "המערכ…");
    }
}
