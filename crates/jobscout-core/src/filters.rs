//! Per-company title filters.

use serde::{Deserialize, Serialize};

/// Include/exclude title filters from the user's company settings.
///
/// Terms are compared after trimming and lowercasing. An absent or
/// empty include list accepts every title; an absent or empty exclude
/// list rejects nothing. Include is an OR over terms, exclude an
/// AND of negations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleFilters {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TitleFilters {
    /// Build filters from optional raw term lists, normalizing at the
    /// boundary: `None` and `[]` collapse to the same accept-all /
    /// reject-none value, terms are trimmed and lowercased, and blank
    /// terms are dropped.
    pub fn new(include: Option<Vec<String>>, exclude: Option<Vec<String>>) -> Self {
        Self {
            include: normalize(include),
            exclude: normalize(exclude),
        }
    }

    pub fn accept_all() -> Self {
        Self::default()
    }

    /// Whether a job with this title passes the filters.
    pub fn accepts(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        if !self.include.is_empty() && !self.include.iter().any(|term| title.contains(term)) {
            return false;
        }
        !self.exclude.iter().any(|term| title.contains(term))
    }
}

fn normalize(terms: Option<Vec<String>>) -> Vec<String> {
    terms
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(include: &[&str], exclude: &[&str]) -> TitleFilters {
        TitleFilters::new(
            Some(include.iter().map(|s| s.to_string()).collect()),
            Some(exclude.iter().map(|s| s.to_string()).collect()),
        )
    }

    #[test]
    fn test_empty_accepts_all() {
        let f = TitleFilters::accept_all();
        assert!(f.accepts("Staff Software Engineer"));
        assert!(f.accepts(""));

        // None and empty list behave identically.
        assert_eq!(TitleFilters::new(None, None), filters(&[], &[]));
    }

    #[test]
    fn test_include_is_or_of_substrings() {
        let f = filters(&["engineer", "scientist"], &[]);
        assert!(f.accepts("Software Engineer II"));
        assert!(f.accepts("Data Scientist"));
        assert!(!f.accepts("Product Manager"));
    }

    #[test]
    fn test_exclude_rejects_any_match() {
        let f = filters(&[], &["senior", "staff"]);
        assert!(f.accepts("Software Engineer"));
        assert!(!f.accepts("Senior Software Engineer"));
        assert!(!f.accepts("Staff Engineer"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filters(&["engineer"], &["staff"]);
        assert!(f.accepts("Backend Engineer"));
        assert!(!f.accepts("Staff Engineer"));
    }

    #[test]
    fn test_case_insensitive_and_trimmed() {
        let f = filters(&["  ENGINEER  "], &[" MANAGER "]);
        assert!(f.accepts("software engineer"));
        assert!(!f.accepts("Engineering Manager"));
    }

    #[test]
    fn test_blank_terms_dropped() {
        let f = filters(&["", "   "], &[""]);
        assert!(f.accepts("anything at all"));
    }

    #[test]
    fn test_serializes_to_empty_lists_not_null() {
        let json = serde_json::to_value(TitleFilters::accept_all()).unwrap();
        assert_eq!(json, serde_json::json!({"include": [], "exclude": []}));
    }
}
