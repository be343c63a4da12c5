use super::CatalogItemInfo;

/// Decides whether a catalog item should be filed as an incident instead of a
/// request.
pub trait IncidentClassifier: Send + Sync {
    fn is_incident(&self, item: &CatalogItemInfo) -> bool;
}

impl<F> IncidentClassifier for F
where
    F: Fn(&CatalogItemInfo) -> bool + Send + Sync,
{
    fn is_incident(&self, item: &CatalogItemInfo) -> bool {
        self(item)
    }
}

/// Case-insensitive keyword match against the item name and category.
#[derive(Clone, Debug)]
pub struct KeywordClassifier {
    name_keywords: Vec<String>,
    category_keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<N, C>(name_keywords: N, category_keywords: C) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            name_keywords: name_keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
            category_keywords: category_keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        // "המערכת" is Hebrew for "the system"
        Self::new(["המערכת", "system", "issue", "problem"], ["support", "technical"])
    }
}

impl IncidentClassifier for KeywordClassifier {
    fn is_incident(&self, item: &CatalogItemInfo) -> bool {
        let name = item.name.to_lowercase();
        let category = item.category.to_lowercase();

        self.name_keywords.iter().any(|k| name.contains(k.as_str()))
            || (!category.is_empty() && self.category_keywords.iter().any(|k| category.contains(k.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, category: &str) -> CatalogItemInfo {
        CatalogItemInfo { name: name.into(), category: category.into(), ..Default::default() }
    }

    #[test]
    fn test_default_keywords() {
        let c = KeywordClassifier::default();
        assert!(c.is_incident(&item("Printer Problem", "Hardware")));
        assert!(c.is_incident(&item("בעיה במערכת - המערכת לא עובדת", "")));
        assert!(c.is_incident(&item("Laptop", "Technical Support")));
        assert!(!c.is_incident(&item("Laptop", "Hardware")));
        assert!(!c.is_incident(&item("Software License", "")));
    }

    #[test]
    fn test_custom_keywords() {
        let c = KeywordClassifier::new(["outage"], Vec::<String>::new());
        assert!(c.is_incident(&item("Network OUTAGE", "")));
        assert!(!c.is_incident(&item("System access", "Support")));
    }
}
