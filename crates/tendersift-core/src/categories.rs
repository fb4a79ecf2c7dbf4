//! Keyword → category lookup table.

use serde::{Deserialize, Serialize};

/// Ordered keyword table plus the closed set of allowed categories.
///
/// Matching walks `keywords` in order and the first keyword found wins, so
/// order is part of the table's meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    pub allowed: Vec<String>,
    pub keywords: Vec<(String, String)>,
}

const ALLOWED: &[&str] = &[
    "Water Treatment",
    "Wastewater Treatment",
    "Power Transmission",
    "IT / Software",
    "Consulting",
    "Aerospace",
    "Audio",
    "Construction",
    "Educational Services",
    "Radioactive",
    "Repair",
    "Telecom",
    "Telephone",
    "Waterworks",
    "Web Development",
    "Cybersecurity",
    "Elevators / Lift",
];

const KEYWORDS: &[(&str, &str)] = &[
    ("elevator", "Elevators / Lift"),
    ("lift", "Elevators / Lift"),
    ("construct", "Construction"),
    ("civil", "Construction"),
    ("building", "Construction"),
    ("website", "Web Development"),
    ("web portal", "Web Development"),
    ("portal", "Web Development"),
    ("software", "IT / Software"),
    ("it ", "IT / Software"),
    ("application", "IT / Software"),
    ("vapt", "Cybersecurity"),
    ("security audit", "Cybersecurity"),
    ("safe to host", "Cybersecurity"),
    ("cert-in", "Cybersecurity"),
    ("water", "Water Treatment"),
    ("effluent", "Wastewater Treatment"),
    ("wastewater", "Wastewater Treatment"),
    ("power", "Power Transmission"),
    ("transmission", "Power Transmission"),
    ("education", "Educational Services"),
    ("school", "Educational Services"),
    ("audio", "Audio"),
    ("speaker", "Audio"),
    ("telecom", "Telecom"),
    ("telephone", "Telephone"),
    ("phone", "Telephone"),
    ("nuclear", "Radioactive"),
    ("radioactive", "Radioactive"),
    ("repair", "Repair"),
    ("maintenance", "Repair"),
];

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            allowed: ALLOWED.iter().map(|s| s.to_string()).collect(),
            keywords: KEYWORDS
                .iter()
                .map(|(k, c)| (k.to_string(), c.to_string()))
                .collect(),
        }
    }
}

impl CategoryTable {
    /// First category whose keyword occurs in `text` (case-insensitive).
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|(keyword, _)| lower.contains(keyword.as_str()))
            .map(|(_, category)| category.as_str())
    }

    /// Canonical spelling of `value` if it names an allowed category.
    pub fn canonical(&self, value: &str) -> Option<&str> {
        let v = value.trim();
        self.allowed
            .iter()
            .find(|c| c.eq_ignore_ascii_case(v))
            .map(|c| c.as_str())
    }

    pub fn is_allowed(&self, value: &str) -> bool {
        self.canonical(value).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_keyword_in_table_order_wins() {
        let table = CategoryTable::default();
        // "lift" precedes "construct", "water" and "maintenance".
        assert_eq!(
            table.detect("Construction and maintenance of lift at water plant"),
            Some("Elevators / Lift")
        );
        assert_eq!(table.detect("Civil works for school"), Some("Construction"));
        assert_eq!(table.detect("Supply of stationery"), None);
    }

    #[test]
    fn test_canonical_category() {
        let table = CategoryTable::default();
        assert_eq!(table.canonical("it / software"), Some("IT / Software"));
        assert!(table.is_allowed("Telecom"));
        assert!(!table.is_allowed("Groceries"));
    }
}
