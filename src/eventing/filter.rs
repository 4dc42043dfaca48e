//! Subscription filters.
//!
//! A subscription selects events by name and by spec. Names match either
//! exactly or through a regular expression. A subscription spec matches an
//! event spec when every entry it lists is present with an equal value.

use std::fmt;

use regex::Regex;

use crate::error::{ArborResult, ValidationError};

/// Key/value constraints attached to events and subscriptions.
pub type Spec = serde_json::Map<String, serde_json::Value>;

/// Event-name filter of a subscription.
#[derive(Debug, Clone)]
pub enum NameFilter {
    /// Matches exactly this name.
    Exact(String),
    /// Matches every name the expression finds a match in.
    Pattern(Regex),
}

impl NameFilter {
    /// Creates an exact-name filter.
    #[must_use]
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    /// Compiles a regular-expression filter.
    pub fn pattern(pattern: &str) -> ArborResult<Self> {
        let re = Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::Pattern(re))
    }

    /// Returns true if `name` is accepted by this filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Pattern(re) => re.is_match(name),
        }
    }

    /// The exact name, or the source text of the expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Exact(exact) => exact,
            Self::Pattern(re) => re.as_str(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl PartialEq for NameFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(exact) => write!(f, "{exact}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for NameFilter {
    fn from(name: &str) -> Self {
        Self::Exact(name.to_string())
    }
}

impl From<String> for NameFilter {
    fn from(name: String) -> Self {
        Self::Exact(name)
    }
}

impl From<Regex> for NameFilter {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// Returns true if every entry of `filter` appears in `probe` with an equal value.
#[must_use]
pub fn spec_matches(filter: &Spec, probe: &Spec) -> bool {
    filter
        .iter()
        .all(|(key, expected)| probe.get(key).is_some_and(|actual| actual == expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: serde_json::Value) -> Spec {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn exact_filter() {
        let filter = NameFilter::from("click");
        assert!(filter.matches("click"));
        assert!(!filter.matches("clicked"));
        assert_eq!(filter.to_string(), "click");
    }

    #[test]
    fn pattern_filter() {
        let filter = NameFilter::pattern("^service:.*:enabled$").unwrap();
        assert!(filter.matches("service:load:enabled"));
        assert!(!filter.matches("service:load"));
        assert_eq!(filter.to_string(), "/^service:.*:enabled$/");
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let err = NameFilter::pattern("(").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn empty_spec_matches_everything() {
        assert!(spec_matches(&Spec::new(), &spec(json!({"kind": "a"}))));
        assert!(spec_matches(&Spec::new(), &Spec::new()));
    }

    #[test]
    fn spec_requires_every_filter_entry() {
        let filter = spec(json!({"kind": "a", "level": 2}));
        assert!(spec_matches(&filter, &spec(json!({"kind": "a", "level": 2, "x": true}))));
        assert!(!spec_matches(&filter, &spec(json!({"kind": "a"}))));
        assert!(!spec_matches(&filter, &spec(json!({"kind": "a", "level": 3}))));
    }

    #[test]
    fn filters_compare_by_source() {
        assert_eq!(NameFilter::from("a"), NameFilter::exact("a"));
        assert_eq!(NameFilter::pattern("a+").unwrap(), NameFilter::pattern("a+").unwrap());
        assert_ne!(NameFilter::from("a+"), NameFilter::pattern("a+").unwrap());
    }
}
