//! Structured filters built from query parameters
//!
//! A [`Filter`] is a conjunction of per-field [`Condition`]s. Operator
//! tokens from the query string (`gte`, `gt`, `lte`, `lt`) map onto the
//! closed [`ComparisonOperator`] enum; anything else under a field is
//! rejected before the filter reaches a collection.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::core::error::QueryError;
use crate::core::query::ParamValue;
use crate::core::sort::compare_values;

/// Comparison operators accepted in filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl ComparisonOperator {
    pub const ALL: [ComparisonOperator; 4] = [
        ComparisonOperator::Gte,
        ComparisonOperator::Gt,
        ComparisonOperator::Lte,
        ComparisonOperator::Lt,
    ];

    /// Bare token as written in the query string
    pub fn token(&self) -> &'static str {
        match self {
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Lt => "lt",
        }
    }

    /// Operator in document-query syntax
    pub fn query_operator(&self) -> &'static str {
        match self {
            ComparisonOperator::Gte => "$gte",
            ComparisonOperator::Gt => "$gt",
            ComparisonOperator::Lte => "$lte",
            ComparisonOperator::Lt => "$lt",
        }
    }

    /// Whether `ordering` (value compared to operand) satisfies the operator
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Gte => ordering != Ordering::Less,
            ComparisonOperator::Gt => ordering == Ordering::Greater,
            ComparisonOperator::Lte => ordering != Ordering::Greater,
            ComparisonOperator::Lt => ordering == Ordering::Less,
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonOperator::ALL
            .into_iter()
            .find(|op| op.token() == s)
            .ok_or(())
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_operator())
    }
}

/// Condition on a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value
    Eq(String),
    /// Field equals any of the values
    In(Vec<String>),
    /// Field satisfies every comparison
    Compare(Vec<(ComparisonOperator, String)>),
}

/// Conjunction of field conditions; empty matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: IndexMap<String, Condition>,
}

impl Filter {
    /// Filter matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a condition, replacing any existing one on the same field
    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.insert(field.into(), condition);
        self
    }

    /// Build a filter from non-reserved query parameters
    pub fn from_params(params: &IndexMap<String, ParamValue>) -> Result<Self, QueryError> {
        let mut filter = Filter::all();
        for (field, value) in params {
            if field.parse::<ComparisonOperator>().is_ok() {
                return Err(QueryError::OperatorWithoutField {
                    operator: field.clone(),
                });
            }
            let condition = match value {
                ParamValue::Single(v) => Condition::Eq(v.clone()),
                ParamValue::Many(vs) => Condition::In(vs.clone()),
                ParamValue::Nested(ops) => Condition::Compare(parse_comparisons(field, ops)?),
                ParamValue::Mixed { .. } => {
                    return Err(QueryError::UnsupportedValue {
                        field: field.clone(),
                        message: "a value cannot be combined with operators".to_string(),
                    });
                }
            };
            filter.clauses.insert(field.clone(), condition);
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.clauses.iter()
    }

    pub fn condition(&self, field: &str) -> Option<&Condition> {
        self.clauses.get(field)
    }

    /// Merge another filter into this one (conjunction)
    pub fn merge(&mut self, other: Filter) {
        for (field, condition) in other.clauses {
            if let (Some(Condition::Compare(existing)), Condition::Compare(more)) =
                (self.clauses.get_mut(&field), &condition)
            {
                existing.extend(more.iter().cloned());
                continue;
            }
            self.clauses.insert(field, condition);
        }
    }

    /// Render in document-query syntax, e.g. `{"price": {"$gte": "10"}}`
    pub fn to_document(&self) -> Value {
        self.to_document_with(|s| Value::String(s.to_string()))
    }

    /// Render with a custom scalar conversion (used by typed backends)
    pub fn to_document_with(&self, scalar: impl Fn(&str) -> Value) -> Value {
        let mut doc = Map::new();
        for (field, condition) in &self.clauses {
            let rendered = match condition {
                Condition::Eq(v) => scalar(v.as_str()),
                Condition::In(vs) => {
                    let mut inner = Map::new();
                    inner.insert(
                        "$in".to_string(),
                        Value::Array(vs.iter().map(|v| scalar(v.as_str())).collect()),
                    );
                    Value::Object(inner)
                }
                Condition::Compare(ops) => {
                    let mut inner = Map::new();
                    for (op, v) in ops {
                        inner.insert(op.query_operator().to_string(), scalar(v.as_str()));
                    }
                    Value::Object(inner)
                }
            };
            doc.insert(field.clone(), rendered);
        }
        Value::Object(doc)
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.clauses.iter().all(|(field, condition)| {
            let Some(value) = record.get(field) else {
                return false;
            };
            match condition {
                Condition::Eq(expected) => value_equals(value, expected),
                Condition::In(options) => options.iter().any(|o| value_equals(value, o)),
                Condition::Compare(ops) => ops.iter().all(|(op, operand)| {
                    compare_to_operand(value, operand).is_some_and(|ord| op.accepts(ord))
                }),
            }
        })
    }
}

fn parse_comparisons(
    field: &str,
    ops: &IndexMap<String, ParamValue>,
) -> Result<Vec<(ComparisonOperator, String)>, QueryError> {
    ops.iter()
        .map(|(token, value)| {
            let op = token
                .parse::<ComparisonOperator>()
                .map_err(|_| QueryError::UnknownOperator {
                    field: field.to_string(),
                    operator: token.clone(),
                })?;
            match value {
                ParamValue::Single(v) => Ok((op, v.clone())),
                _ => Err(QueryError::UnsupportedValue {
                    field: field.to_string(),
                    message: format!("operator '{}' expects a single value", token),
                }),
            }
        })
        .collect()
}

/// Interpret the textual operand in terms of the stored value's type
fn coerce_operand(stored: &Value, operand: &str) -> Option<Value> {
    match stored {
        Value::Number(_) => operand
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Value::Bool(_) => operand.parse::<bool>().ok().map(Value::Bool),
        Value::String(_) => Some(Value::String(operand.to_string())),
        _ => None,
    }
}

fn compare_to_operand(stored: &Value, operand: &str) -> Option<Ordering> {
    compare_values(stored, &coerce_operand(stored, operand)?)
}

fn value_equals(stored: &Value, expected: &str) -> bool {
    match stored {
        Value::Array(items) => items.iter().any(|item| value_equals(item, expected)),
        other => compare_to_operand(other, expected) == Some(Ordering::Equal),
    }
}
