//! Raw query-string parameters
//!
//! Parameters keep the shape produced by bracket-style query strings:
//!
//! ```text
//! ?gpa[gte]=3&page=2&tag=a&tag=b
//! → { gpa: { gte: "3" }, page: "2", tag: ["a", "b"] }
//! ```
//!
//! The mapping is a read-only snapshot; pipeline stages take working copies.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::core::error::{CampusError, ValidationError};

/// Keys consumed by the query pipeline rather than the filter
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// A single query parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `key=value`
    Single(String),
    /// `key=a&key=b`
    Many(Vec<String>),
    /// `key[sub]=value`
    Nested(IndexMap<String, ParamValue>),
    /// `key=value` together with `key[sub]=value`; kept so the filter can
    /// reject it
    Mixed {
        values: Vec<String>,
        nested: IndexMap<String, ParamValue>,
    },
}

impl ParamValue {
    /// Flatten to text: lists are comma-joined, nested maps have no text form
    pub fn as_text(&self) -> Option<String> {
        match self {
            ParamValue::Single(s) => Some(s.clone()),
            ParamValue::Many(values) => Some(values.join(",")),
            ParamValue::Nested(_) | ParamValue::Mixed { .. } => None,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(existing) => {
                *self = ParamValue::Many(vec![std::mem::take(existing), value]);
            }
            ParamValue::Many(values) => values.push(value),
            ParamValue::Nested(nested) => {
                *self = ParamValue::Mixed {
                    values: vec![value],
                    nested: std::mem::take(nested),
                };
            }
            ParamValue::Mixed { values, .. } => values.push(value),
        }
    }

    /// Nested map to descend into, converting scalars into a mixed value
    fn nested_mut(&mut self) -> Option<&mut IndexMap<String, ParamValue>> {
        let scalars = match self {
            ParamValue::Single(existing) => Some(vec![std::mem::take(existing)]),
            ParamValue::Many(existing) => Some(std::mem::take(existing)),
            ParamValue::Nested(_) | ParamValue::Mixed { .. } => None,
        };
        if let Some(values) = scalars {
            *self = ParamValue::Mixed {
                values,
                nested: IndexMap::new(),
            };
        }
        match self {
            ParamValue::Nested(nested) | ParamValue::Mixed { nested, .. } => Some(nested),
            ParamValue::Single(_) | ParamValue::Many(_) => None,
        }
    }
}

/// Ordered mapping of query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: IndexMap<String, ParamValue>,
}

impl QueryParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded `key=value` pairs, expanding `key[sub]` notation
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert_pair(&key.into(), value.into());
        }
        params
    }

    fn insert_pair(&mut self, raw_key: &str, value: String) {
        let (root, path) = split_key(raw_key);
        if root.is_empty() {
            return;
        }
        insert_path(&mut self.values, root, &path, value);
    }

    /// Insert a top-level value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Get a raw parameter value
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Get a parameter as text (see [`ParamValue::as_text`])
    pub fn text(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(ParamValue::as_text)
    }

    /// Get a parameter as a non-empty string
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.trim().is_empty())
    }

    /// Working copy without the pipeline control keys
    pub fn without_reserved(&self) -> IndexMap<String, ParamValue> {
        self.values
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }
}

/// Lenient integer parsing: surrounding whitespace is ignored, anything
/// else non-numeric yields `None`
pub fn parse_int(value: Option<String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

fn split_key(raw: &str) -> (&str, Vec<&str>) {
    let Some(open) = raw.find('[') else {
        return (raw, Vec::new());
    };

    let root = &raw[..open];
    let mut path = Vec::new();
    let mut rest = &raw[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            // Unbalanced bracket: treat the whole key literally
            return (raw, Vec::new());
        };
        path.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (raw, Vec::new());
    }
    (root, path)
}

fn insert_path(map: &mut IndexMap<String, ParamValue>, key: &str, path: &[&str], value: String) {
    match path.split_first() {
        None => match map.entry(key.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(ParamValue::Single(value));
            }
        },
        // `key[]=a` appends to a list
        Some((&"", _)) => match map.entry(key.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(ParamValue::Many(vec![value]));
            }
        },
        Some((first, rest)) => {
            let slot = map
                .entry(key.to_string())
                .or_insert_with(|| ParamValue::Nested(IndexMap::new()));
            if let Some(inner) = slot.nested_mut() {
                insert_path(inner, first, rest, value);
            }
        }
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = CampusError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri).map_err(
            |e| ValidationError::InvalidBody {
                message: format!("malformed query string: {}", e),
            },
        )?;
        Ok(QueryParams::from_pairs(pairs))
    }
}
