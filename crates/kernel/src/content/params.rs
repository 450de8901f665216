//! Request parameters as seen by tree operations.

use std::collections::HashMap;
use std::str::FromStr;

use super::error::{TreeError, TreeResult};

/// Flat string parameters merged from the query string and the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: HashMap<String, String>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by tests and fixtures.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Merge `other` over `self`; keys in `other` win.
    pub fn merge(&mut self, other: RequestParams) {
        self.values.extend(other.values);
    }

    /// Non-blank value of `key`, trimmed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse a value, failing validation when it is present but malformed.
    pub fn parse<T: FromStr>(&self, key: &str) -> TreeResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| TreeError::validation(format!("'{key}' has invalid value '{raw}'"))),
        }
    }

    /// Parse a boolean (`true`/`false`, `1`/`0`, case-insensitive).
    pub fn parse_bool(&self, key: &str) -> TreeResult<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(TreeError::validation(format!(
                    "'{key}' has invalid value '{raw}'"
                ))),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_absent() {
        let params = RequestParams::new().with("q", "  ").with("id", " 7 ");
        assert_eq!(params.get("q"), None);
        assert_eq!(params.parse::<i64>("id").unwrap(), Some(7));
    }

    #[test]
    fn malformed_numbers_fail_validation() {
        let params = RequestParams::new().with("skip", "ten");
        let err = params.parse::<usize>("skip").unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn booleans() {
        let params = RequestParams::new()
            .with("a", "True")
            .with("b", "0")
            .with("c", "maybe");
        assert_eq!(params.parse_bool("a").unwrap(), Some(true));
        assert_eq!(params.parse_bool("b").unwrap(), Some(false));
        assert_eq!(params.parse_bool("missing").unwrap(), None);
        assert!(params.parse_bool("c").is_err());
    }

    #[test]
    fn merge_prefers_other() {
        let mut query = RequestParams::new().with("id", "1").with("pages", "true");
        query.merge(RequestParams::new().with("id", "2"));
        assert_eq!(query.get("id"), Some("2"));
        assert_eq!(query.get("pages"), Some("true"));
    }
}
