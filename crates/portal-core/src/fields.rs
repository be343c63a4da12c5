//! Field descriptors and the upstream field mapper
//!
//! Upstream catalog items describe their form as a list of loosely typed
//! variables. [`map_fields`] turns them into [`FieldDescriptor`]s the form
//! layer can render without knowing anything about the upstream platform.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::form::FormValues;
use crate::models::display_value;

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Boolean,
    Choice,
    Reference,
    Date,
    DateTime,
    Email,
    Url,
    Textarea,
    File,
}

impl FieldKind {
    pub const ALL: [FieldKind; 11] = [
        FieldKind::Text,
        FieldKind::Number,
        FieldKind::Boolean,
        FieldKind::Choice,
        FieldKind::Reference,
        FieldKind::Date,
        FieldKind::DateTime,
        FieldKind::Email,
        FieldKind::Url,
        FieldKind::Textarea,
        FieldKind::File,
    ];

    /// Total mapping from upstream type names. Anything unknown renders as text.
    pub fn from_upstream(type_name: &str) -> Self {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "single_line_text" | "password" => FieldKind::Text,
            "number" | "integer" | "decimal" | "numeric" => FieldKind::Number,
            "boolean" | "checkbox" | "yes_no" => FieldKind::Boolean,
            "choice" | "select" | "select_box" | "radio" | "multiple_choice" => FieldKind::Choice,
            "reference" | "lookup_select_box" => FieldKind::Reference,
            "glide_date" | "date" => FieldKind::Date,
            "glide_date_time" | "datetime" | "date_time" => FieldKind::DateTime,
            "email" => FieldKind::Email,
            "url" => FieldKind::Url,
            "textarea" | "multi_line_text" | "html" => FieldKind::Textarea,
            "file" | "attachment" => FieldKind::File,
            _ => FieldKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Choice => "choice",
            FieldKind::Reference => "reference",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::Textarea => "textarea",
            FieldKind::File => "file",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// Field is shown only while `field` currently holds `value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub field: String,
    pub value: Value,
}

impl VisibilityRule {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self { field: field.into(), value: value.into() }
    }

    pub fn is_satisfied(&self, values: &FormValues) -> bool {
        match values.get(&self.field) {
            Some(current) => current == &self.value || display_value(current) == display_value(&self.value),
            None => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub mandatory: bool,
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub reference_table: Option<String>,
    pub visibility_rule: Option<VisibilityRule>,
    pub help_text: Option<String>,
    pub placeholder: Option<String>,
    pub max_length: Option<u32>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            mandatory: false,
            choices: Vec::new(),
            reference_table: None,
            visibility_rule: None,
            help_text: None,
            placeholder: None,
            max_length: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn referencing(mut self, table: impl Into<String>) -> Self {
        self.reference_table = Some(table.into());
        self
    }

    pub fn visible_when(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.visibility_rule = Some(VisibilityRule::new(field, value));
        self
    }
}

// =============================================================================
// Schema
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate field name: {0}")]
    DuplicateField(String),

    #[error("field {field} depends on unknown field {depends_on}")]
    UnknownDependency { field: String, depends_on: String },
}

/// A field list that satisfies the schema invariants: unique names, and
/// visibility rules that only point at fields of the same schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FormSchema {
    fields: Vec<FieldDescriptor>,
}

impl FormSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let mut names = HashSet::new();
        for field in &fields {
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        for field in &fields {
            if let Some(rule) = &field.visibility_rule {
                if !names.contains(rule.field.as_str()) {
                    return Err(SchemaError::UnknownDependency {
                        field: field.name.clone(),
                        depends_on: rule.field.clone(),
                    });
                }
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

}

// =============================================================================
// Raw upstream metadata
// =============================================================================

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    })
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawChoice {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawShowWhen {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

/// One variable as the upstream catalog API reports it.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Value,
    #[serde(default)]
    pub friendly_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub mandatory: bool,
    #[serde(default)]
    pub choices: Vec<RawChoice>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default, alias = "showWhen")]
    pub show_when: Option<RawShowWhen>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
}

impl RawField {
    /// Never fails: anything that is not an object becomes an empty field.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            debug!(error = %e, "unreadable field metadata, using defaults");
            RawField::default()
        })
    }

    fn type_name(&self) -> String {
        self.friendly_type
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| display_value(&self.field_type))
    }

    fn reference_table(&self) -> Option<String> {
        self.reference.clone().filter(|t| !t.trim().is_empty())
    }
}

// =============================================================================
// Mapper
// =============================================================================

/// Source of choice lists for reference fields.
#[async_trait]
pub trait ReferenceLookup: Send + Sync {
    async fn lookup(&self, table: &str) -> crate::Result<Vec<Choice>>;
}

/// Lookup that never resolves anything. Reference fields fall back to free text.
pub struct NoLookup;

#[async_trait]
impl ReferenceLookup for NoLookup {
    async fn lookup(&self, _table: &str) -> crate::Result<Vec<Choice>> {
        Ok(Vec::new())
    }
}

/// Maps one field without touching reference tables.
pub fn map_field(raw: &RawField) -> FieldDescriptor {
    let kind = FieldKind::from_upstream(&raw.type_name());
    let label = raw.label.clone().filter(|l| !l.is_empty()).unwrap_or_else(|| raw.name.clone());

    FieldDescriptor {
        name: raw.name.clone(),
        label,
        kind,
        mandatory: raw.mandatory,
        choices: raw
            .choices
            .iter()
            .map(|c| {
                let value = display_value(&c.value);
                let label = c.label.clone().unwrap_or_else(|| value.clone());
                Choice { value, label }
            })
            .collect(),
        reference_table: raw.reference_table(),
        visibility_rule: raw
            .show_when
            .as_ref()
            .filter(|rule| !rule.field.is_empty())
            .map(|rule| VisibilityRule::new(rule.field.clone(), rule.value.clone())),
        help_text: raw.help_text.clone().filter(|h| !h.is_empty()),
        placeholder: raw.placeholder.clone().filter(|p| !p.is_empty()),
        max_length: raw.max_length,
    }
}

/// Maps upstream field metadata in order. Reference tables are looked up for
/// fields that carry no inline choices; a failed lookup leaves the choices
/// empty and the field renders as free text.
///
/// The output always forms a valid [`FormSchema`]: nameless and repeated
/// names get a positional suffix, and visibility rules pointing at fields
/// outside the list are dropped.
pub async fn map_fields(raw_fields: &[RawField], lookup: &dyn ReferenceLookup) -> Vec<FieldDescriptor> {
    let mut fields = Vec::with_capacity(raw_fields.len());

    for raw in raw_fields {
        let mut field = map_field(raw);

        if field.choices.is_empty() {
            if let Some(table) = field.reference_table.clone() {
                match lookup.lookup(&table).await {
                    Ok(choices) => {
                        debug!(field = %field.name, table = %table, count = choices.len(), "reference choices loaded");
                        field.choices = choices;
                    }
                    Err(e) => {
                        warn!(field = %field.name, table = %table, error = %e, "reference lookup failed, rendering as free text");
                    }
                }
            }
        }

        fields.push(field);
    }

    dedupe_names(&mut fields);
    drop_dangling_rules(&mut fields);
    fields
}

fn dedupe_names(fields: &mut [FieldDescriptor]) {
    let mut seen = HashSet::new();
    for (index, field) in fields.iter_mut().enumerate() {
        if !field.name.is_empty() && seen.insert(field.name.clone()) {
            continue;
        }
        let base = if field.name.is_empty() { "field".to_string() } else { field.name.clone() };
        let mut candidate = format!("{}_{}", base, index);
        while seen.contains(&candidate) {
            candidate.push('_');
        }
        debug!(original = %field.name, renamed = %candidate, "field name made unique");
        if field.label.is_empty() {
            field.label = candidate.clone();
        }
        seen.insert(candidate.clone());
        field.name = candidate;
    }
}

fn drop_dangling_rules(fields: &mut [FieldDescriptor]) {
    let names: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
    for field in fields.iter_mut() {
        if let Some(rule) = &field.visibility_rule {
            if !names.contains(&rule.field) {
                debug!(field = %field.name, depends_on = %rule.field, "dropping visibility rule on unknown field");
                field.visibility_rule = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PortalError;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FixedLookup {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReferenceLookup for FixedLookup {
        async fn lookup(&self, table: &str) -> crate::Result<Vec<Choice>> {
            self.calls.lock().push(table.to_string());
            match table {
                "cmn_department" => Ok(vec![Choice::new("d1", "Finance"), Choice::new("d2", "IT")]),
                _ => Err(PortalError::Upstream { status: 403, body: "ACL".into() }),
            }
        }
    }

    fn raw(value: Value) -> RawField {
        RawField::from_value(&value)
    }

    #[test]
    fn test_type_mapping_is_total() {
        assert_eq!(FieldKind::from_upstream("glide_date_time"), FieldKind::DateTime);
        assert_eq!(FieldKind::from_upstream("multi_line_text"), FieldKind::Textarea);
        assert_eq!(FieldKind::from_upstream("Boolean"), FieldKind::Boolean);
        assert_eq!(FieldKind::from_upstream("masked"), FieldKind::Text);
        assert_eq!(FieldKind::from_upstream(""), FieldKind::Text);
    }

    #[test]
    fn test_friendly_type_wins_over_type() {
        let field = map_field(&raw(json!({"name": "dept", "type": 8, "friendly_type": "reference", "reference": "cmn_department"})));
        assert_eq!(field.kind, FieldKind::Reference);
        assert_eq!(field.reference_table.as_deref(), Some("cmn_department"));
    }

    #[test]
    fn test_label_and_mandatory_coercion() {
        let field = map_field(&raw(json!({"name": "phone", "type": "string", "mandatory": "true"})));
        assert_eq!(field.label, "phone");
        assert!(field.mandatory);
    }

    #[test]
    fn test_show_when_becomes_visibility_rule() {
        let field = map_field(&raw(json!({
            "name": "number_of_users", "type": "number",
            "show_when": {"field": "license_type", "value": "team"}
        })));
        let rule = field.visibility_rule.expect("rule");
        assert_eq!(rule.field, "license_type");

        let mut values = FormValues::new();
        assert!(!rule.is_satisfied(&values));
        values.set("license_type", "team");
        assert!(rule.is_satisfied(&values));
    }

    #[tokio::test]
    async fn test_map_fields_preserves_order_and_length() {
        let lookup = FixedLookup { calls: Mutex::new(Vec::new()) };
        let raws = vec![
            raw(json!({"name": "a", "type": "weird_type"})),
            raw(json!("not an object")),
            raw(json!({"name": "b", "type": "choice", "choices": [{"value": 1, "label": "One"}]})),
            raw(json!({"name": "c", "type": "email"})),
        ];
        let fields = map_fields(&raws, &lookup).await;

        assert_eq!(fields.len(), raws.len());
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].kind, FieldKind::Text);
        assert_eq!(fields[1].kind, FieldKind::Text);
        assert_eq!(fields[2].choices, vec![Choice::new("1", "One")]);
        assert_eq!(fields[3].kind, FieldKind::Email);
        assert!(fields.iter().all(|f| FieldKind::ALL.contains(&f.kind)));
        assert!(lookup.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reference_lookup_success_and_failure() {
        let lookup = FixedLookup { calls: Mutex::new(Vec::new()) };
        let raws = vec![
            raw(json!({"name": "dept", "type": "reference", "reference": "cmn_department"})),
            raw(json!({"name": "user", "type": "reference", "reference": "sys_user"})),
        ];
        let fields = map_fields(&raws, &lookup).await;

        assert_eq!(fields[0].choices.len(), 2);
        assert_eq!(fields[1].kind, FieldKind::Reference);
        assert!(fields[1].choices.is_empty());
        assert_eq!(*lookup.calls.lock(), vec!["cmn_department".to_string(), "sys_user".to_string()]);
    }

    #[test]
    fn test_schema_invariants() {
        let ok = FormSchema::new(vec![
            FieldDescriptor::new("license_type", "License", FieldKind::Choice),
            FieldDescriptor::new("users", "Users", FieldKind::Number).visible_when("license_type", "team"),
        ]);
        assert!(ok.is_ok());

        let dup = FormSchema::new(vec![
            FieldDescriptor::new("a", "A", FieldKind::Text),
            FieldDescriptor::new("a", "A again", FieldKind::Text),
        ]);
        assert_eq!(dup, Err(SchemaError::DuplicateField("a".into())));

        let dangling = FormSchema::new(vec![FieldDescriptor::new("b", "B", FieldKind::Text).visible_when("missing", true)]);
        assert!(matches!(dangling, Err(SchemaError::UnknownDependency { .. })));
    }

    #[tokio::test]
    async fn test_mapped_fields_always_form_a_schema() {
        let lookup = FixedLookup { calls: Mutex::new(Vec::new()) };
        let raws = vec![
            raw(json!({"name": "a", "type": "string"})),
            raw(json!({"name": "b", "type": "string", "show_when": {"field": "gone", "value": "x"}})),
            raw(json!({"type": "container_start"})),
            raw(json!({"type": "label"})),
            raw(json!({"name": "a", "type": "string"})),
            raw(json!({"name": "c", "type": "string", "show_when": {"field": "a", "value": "y"}})),
        ];
        let fields = map_fields(&raws, &lookup).await;

        assert_eq!(fields.len(), raws.len());
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[2].name, "field_2");
        assert_eq!(fields[3].name, "field_3");
        assert_eq!(fields[4].name, "a_4");
        assert!(fields[1].visibility_rule.is_none());
        assert_eq!(fields[5].visibility_rule.as_ref().unwrap().field, "a");

        let schema = FormSchema::new(fields).unwrap();
        assert_eq!(schema.fields().len(), 6);
    }
}
