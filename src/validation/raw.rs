//! Untyped request parameters
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An untyped bag of parameters taken straight from a request.
///
/// Values are kept as JSON: query strings produce strings (or arrays of strings for repeated
/// keys), path segments produce strings, and JSON bodies keep their nested structure. Nothing is
/// sanitized on the way in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParameters(Map<String, Value>);

impl RawParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a URL query string (without the leading `?`).
    ///
    /// A key that appears more than once becomes an array of its values in order of appearance.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.append(key.into_owned(), value.into_owned());
        }
        params
    }

    /// Wraps matched path segments.
    pub fn from_path(segments: HashMap<String, String>) -> Self {
        Self(
            segments
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }

    /// Wraps a JSON object. Any other JSON value yields `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Adds a value, turning an existing entry into an array if needed.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = Value::String(value.into());
        match self.0.entry(key.into()) {
            serde_json::map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
            serde_json::map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Array(values) => values.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }

    /// Sets a value, replacing whatever was there.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
