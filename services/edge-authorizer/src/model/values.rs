//! Single-or-many values and case-insensitive header maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A header or query value that is either single or an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiValue {
    /// Exactly one value
    Single(String),
    /// An ordered sequence of values
    Multi(Vec<String>),
}

impl MultiValue {
    /// Flattens to [`MultiValue::Single`] only when exactly one value is present.
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            Self::Single(values.remove(0))
        } else {
            Self::Multi(values)
        }
    }

    /// First value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(vs) => vs.first().map(String::as_str),
        }
    }

    /// All values in order.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Appends a value, promoting a single value to a sequence.
    pub fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multi(vec![first, value]);
            }
            Self::Multi(vs) => vs.push(value),
        }
    }
}

impl From<&str> for MultiValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for MultiValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for MultiValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// Header map preserving the names as received, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, MultiValue>);

impl Headers {
    /// Empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the header stored under exactly `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MultiValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Inserts unless a header with the same name in any casing exists.
    pub fn insert_if_absent(&mut self, name: &str, value: impl Into<MultiValue>) {
        if !self.contains(name) {
            self.insert(name, value);
        }
    }

    /// Appends a value to the header stored under exactly `name`.
    pub fn append(&mut self, name: impl Into<String>, value: String) {
        match self.0.entry(name.into()) {
            Entry::Occupied(mut slot) => slot.get_mut().push(value),
            Entry::Vacant(slot) => {
                slot.insert(MultiValue::Single(value));
            }
        }
    }

    /// First header whose name matches case-insensitively.
    ///
    /// When several casings of the same name are present only one of them is
    /// considered, the first in the map's (sorted) order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MultiValue> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// First value of the matching header.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(MultiValue::first)
    }

    /// Whether a header with this name exists in any casing.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates headers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MultiValue)> {
        self.0.iter()
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<MultiValue>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Headers {
    type Item = (String, MultiValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, MultiValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Parses a raw query string; repeated keys become ordered sequences.
#[must_use]
pub fn parse_query(query: &str) -> BTreeMap<String, MultiValue> {
    let mut params: BTreeMap<String, MultiValue> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        match params.entry(key.into_owned()) {
            Entry::Occupied(mut slot) => slot.get_mut().push(value.into_owned()),
            Entry::Vacant(slot) => {
                slot.insert(MultiValue::Single(value.into_owned()));
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_flattens_only_single() {
        assert_eq!(
            MultiValue::from_values(vec!["a".to_string()]),
            MultiValue::Single("a".to_string())
        );
        assert_eq!(
            MultiValue::from_values(vec!["a".to_string(), "b".to_string()]),
            MultiValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(MultiValue::from_values(vec![]), MultiValue::Multi(vec![]));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let headers: Headers = [("AUTHORIZATION", "Bearer x")].into_iter().collect();
        assert_eq!(headers.get_first("authorization"), Some("Bearer x"));
        assert_eq!(headers.get_first("Authorization"), Some("Bearer x"));
        assert!(headers.get("cookie").is_none());
    }

    #[test]
    fn test_only_one_casing_is_considered() {
        let headers: Headers = [("Authorization", "Bearer upper"), ("authorization", "Bearer lower")]
            .into_iter()
            .collect();
        assert_eq!(headers.get_first("AUTHORIZATION"), Some("Bearer upper"));
    }

    #[test]
    fn test_insert_if_absent_respects_other_casing() {
        let mut headers: Headers = [("access-control-allow-origin", "https://a.example")]
            .into_iter()
            .collect();
        headers.insert_if_absent("Access-Control-Allow-Origin", "*");
        assert_eq!(headers.len(), 1);
        assert_eq!(
            headers.get_first("Access-Control-Allow-Origin"),
            Some("https://a.example")
        );
    }

    #[test]
    fn test_parse_query_repeated_keys() {
        let params = parse_query("a=1&b=two%20words&a=3");
        assert_eq!(
            params.get("a"),
            Some(&MultiValue::Multi(vec!["1".to_string(), "3".to_string()]))
        );
        assert_eq!(params.get("b"), Some(&MultiValue::Single("two words".to_string())));
    }

    #[test]
    fn test_parse_query_empty() {
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn test_untagged_serde() {
        let single: MultiValue = serde_json::from_str("\"x\"").unwrap();
        let multi: MultiValue = serde_json::from_str("[\"x\",\"y\"]").unwrap();
        assert_eq!(single, MultiValue::Single("x".to_string()));
        assert_eq!(multi.values(), vec!["x", "y"]);
    }
}
