//! Catalog, knowledge and request models

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::FieldDescriptor;

/// Reads a display string out of an upstream value that is either a plain
/// string or a reference object (`{display_value, value, title, name}`).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(map) => ["display_value", "value", "title", "name"]
            .iter()
            .filter_map(|key| map.get(*key))
            .filter_map(|v| v.as_str())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn text(raw: &Value, key: &str) -> String {
    raw.get(key).map(display_value).unwrap_or_default()
}

fn opt_text(raw: &Value, key: &str) -> Option<String> {
    Some(text(raw, key)).filter(|s| !s.is_empty())
}

fn count(raw: &Value, key: &str) -> u64 {
    match raw.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    Available,
    Unavailable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogItem {
    pub sys_id: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub availability: Availability,
    pub picture: Option<String>,
    pub order: i64,
    pub active: bool,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl CatalogItem {
    pub fn from_upstream(raw: &Value) -> Self {
        let availability = match raw.get("availability").and_then(Value::as_str) {
            Some("on_desktop") | Some("available") | None => Availability::Available,
            Some(_) => Availability::Unavailable,
        };
        let active = match raw.get("active") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s != "false",
            _ => true,
        };
        let order = match raw.get("order") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        };

        Self {
            sys_id: text(raw, "sys_id"),
            name: text(raw, "name"),
            short_description: text(raw, "short_description"),
            description: text(raw, "description"),
            category: text(raw, "category"),
            subcategory: opt_text(raw, "subcategory"),
            availability,
            picture: opt_text(raw, "picture").or_else(|| opt_text(raw, "icon")),
            order,
            active,
            fields: Vec::new(),
        }
    }

    pub fn reference(&self) -> CatalogItemRef {
        CatalogItemRef {
            sys_id: self.sys_id.clone(),
            name: self.name.clone(),
            category: if self.category.is_empty() { "N/A".into() } else { self.category.clone() },
        }
    }
}

/// Compact catalog item reference stored with submitted requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItemRef {
    pub sys_id: String,
    pub name: String,
    pub category: String,
}

// =============================================================================
// Knowledge
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub sys_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl Person {
    fn from_upstream(raw: Option<&Value>, fallback_name: &str) -> Self {
        match raw {
            Some(Value::String(id)) if !id.is_empty() => Person { sys_id: id.clone(), name: id.clone(), email: String::new() },
            Some(obj @ Value::Object(_)) => {
                let name = opt_text(obj, "display_value")
                    .or_else(|| opt_text(obj, "name"))
                    .or_else(|| opt_text(obj, "value"))
                    .unwrap_or_else(|| fallback_name.to_string());
                let sys_id = opt_text(obj, "value").or_else(|| opt_text(obj, "sys_id")).unwrap_or_default();
                Person { sys_id, name, email: text(obj, "email") }
            }
            _ => Person { sys_id: String::new(), name: fallback_name.to_string(), email: String::new() },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeArticle {
    pub sys_id: String,
    pub number: Option<String>,
    pub title: String,
    pub short_description: String,
    pub body: String,
    pub category: String,
    pub subcategory: String,
    pub author: Person,
    pub published: String,
    pub view_count: u64,
    pub helpful_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl KnowledgeArticle {
    pub fn from_upstream(raw: &Value) -> Self {
        let short_description = text(raw, "short_description");
        let title = opt_text(raw, "title")
            .or_else(|| Some(short_description.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "Untitled Article".to_string());

        Self {
            sys_id: text(raw, "sys_id"),
            number: opt_text(raw, "number"),
            title,
            short_description,
            body: opt_text(raw, "text").or_else(|| opt_text(raw, "description")).unwrap_or_default(),
            category: opt_text(raw, "category").unwrap_or_else(|| "General".into()),
            subcategory: opt_text(raw, "subcategory").unwrap_or_else(|| "General".into()),
            author: Person::from_upstream(raw.get("author"), "System"),
            published: opt_text(raw, "published").or_else(|| opt_text(raw, "sys_created_on")).unwrap_or_default(),
            view_count: count(raw, "view_count"),
            helpful_count: count(raw, "helpful_count"),
            tags: Vec::new(),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub sys_id: String,
    pub number: String,
    pub short_description: String,
    pub description: String,
    pub state: String,
    pub priority: String,
    pub category: String,
    pub requested_by: Person,
    pub assigned_to: Option<Person>,
    pub created_on: Option<String>,
    pub updated_on: Option<String>,
}

impl ServiceRequest {
    pub fn from_upstream(raw: &Value) -> Self {
        let assigned_to = raw
            .get("assigned_to")
            .filter(|v| !display_value(v).is_empty())
            .map(|v| Person::from_upstream(Some(v), ""));

        Self {
            sys_id: text(raw, "sys_id"),
            number: text(raw, "number"),
            short_description: text(raw, "short_description"),
            description: text(raw, "description"),
            state: text(raw, "state"),
            priority: text(raw, "priority"),
            category: text(raw, "category"),
            requested_by: Person::from_upstream(raw.get("requested_by"), ""),
            assigned_to,
            created_on: opt_text(raw, "sys_created_on"),
            updated_on: opt_text(raw, "sys_updated_on"),
        }
    }
}

// =============================================================================
// Queries and paging
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub availability: Option<Availability>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self { search: None, category: None, status: None, availability: None, page: 1, limit: 10 }
    }
}

impl ListQuery {
    pub fn offset(&self) -> u32 {
        self.page.max(1).saturating_sub(1) * self.limit
    }

    /// Case-insensitive substring match against any of the given haystacks.
    pub fn matches_search(&self, haystacks: &[&str]) -> bool {
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_lowercase();
                haystacks.iter().any(|h| h.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    pub fn matches_category(&self, category: &str) -> bool {
        match self.category.as_deref() {
            None | Some("") | Some("all") => true,
            Some(wanted) => wanted == category,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Slices an already filtered list down to the requested page.
    pub fn paginate(all: Vec<T>, query: &ListQuery) -> Self {
        let total = all.len() as u64;
        let per_page = query.limit.max(1);
        let items = all.into_iter().skip(query.offset() as usize).take(per_page as usize).collect();
        Self::page_of(items, total, query)
    }

    /// Wraps one page that was already cut upstream.
    pub fn page_of(items: Vec<T>, total: u64, query: &ListQuery) -> Self {
        let per_page = query.limit.max(1);
        Self {
            items,
            total,
            page: query.page.max(1),
            per_page,
            total_pages: ((total + per_page as u64 - 1) / per_page as u64) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value_variants() {
        assert_eq!(display_value(&json!("Hardware")), "Hardware");
        assert_eq!(display_value(&json!({"display_value": "Hardware", "value": "abc"})), "Hardware");
        assert_eq!(display_value(&json!({"title": "Software"})), "Software");
        assert_eq!(display_value(&json!(null)), "");
    }

    #[test]
    fn test_catalog_item_from_reference_fields() {
        let item = CatalogItem::from_upstream(&json!({
            "sys_id": "abc",
            "name": "Laptop",
            "category": {"title": "Hardware", "sys_id": "cat1"},
            "availability": "on_desktop",
            "active": "true",
            "order": "3"
        }));
        assert_eq!(item.category, "Hardware");
        assert_eq!(item.availability, Availability::Available);
        assert!(item.active);
        assert_eq!(item.order, 3);
        assert_eq!(item.reference().category, "Hardware");
    }

    #[test]
    fn test_knowledge_article_defaults() {
        let article = KnowledgeArticle::from_upstream(&json!({
            "sys_id": "kb1",
            "short_description": "Reset VPN",
            "author": {"display_value": "Jane", "value": "u1"},
            "view_count": "12"
        }));
        assert_eq!(article.title, "Reset VPN");
        assert_eq!(article.category, "General");
        assert_eq!(article.author.name, "Jane");
        assert_eq!(article.author.sys_id, "u1");
        assert_eq!(article.view_count, 12);
    }

    #[test]
    fn test_pagination() {
        let query = ListQuery { page: 2, limit: 2, ..Default::default() };
        let page = PaginatedResponse::paginate(vec![1, 2, 3, 4, 5], &query);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
    }
}
