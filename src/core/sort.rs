//! Recursive comparison sort over record fields
//!
//! [`quick_sort`] orders a slice by one named field without touching the
//! platform sort. The last element is the pivot; every other element goes
//! left when it compares `<=` (ascending) or `>=` (descending) against the
//! pivot, right otherwise. Worst case is quadratic in time on already-ordered
//! or tied input.
//!
//! Partitions hold references into the input and every record is cloned once,
//! into the output. The recursion runs on an explicit work stack, so long
//! runs of equal values cannot overflow the thread stack.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::ValidationError;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    /// Only the exact literals are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ValidationError::InvalidSortOrder {
                value: other.to_string(),
            }),
        }
    }
}

/// Anything whose fields can be looked up by name
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&Value>;
}

impl FieldSource for Map<String, Value> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldSource for Value {
    fn field(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|obj| obj.get(name))
    }
}

/// Native ordering between two raw values
///
/// Numbers compare numerically, strings lexicographically, booleans with
/// `false < true`. Mixed or structured values are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn belongs_left(value: Option<&Value>, pivot: Option<&Value>, order: SortOrder) -> bool {
    let (Some(value), Some(pivot)) = (value, pivot) else {
        return false;
    };
    match (compare_values(value, pivot), order) {
        (Some(ord), SortOrder::Asc) => ord != Ordering::Greater,
        (Some(ord), SortOrder::Desc) => ord != Ordering::Less,
        (None, _) => false,
    }
}

enum Step<'a, T> {
    Partition(Vec<&'a T>),
    Emit(&'a T),
}

/// Sort `items` by `field` in the given order, returning a new vector
///
/// The result is `sort(left) ++ [pivot] ++ sort(right)` at every level.
pub fn quick_sort<T>(items: &[T], field: &str, order: SortOrder) -> Vec<T>
where
    T: FieldSource + Clone,
{
    let mut sorted = Vec::with_capacity(items.len());
    let mut pending = vec![Step::Partition(items.iter().collect())];

    while let Some(step) = pending.pop() {
        let mut group = match step {
            Step::Emit(item) => {
                sorted.push(item.clone());
                continue;
            }
            Step::Partition(group) => group,
        };
        let Some(pivot) = group.pop() else {
            continue;
        };
        if group.is_empty() {
            sorted.push(pivot.clone());
            continue;
        }

        let pivot_value = pivot.field(field);
        let (left, right): (Vec<&T>, Vec<&T>) = group
            .into_iter()
            .partition(|item| belongs_left(item.field(field), pivot_value, order));

        // Popped in reverse: left, then pivot, then right
        pending.push(Step::Partition(right));
        pending.push(Step::Emit(pivot));
        pending.push(Step::Partition(left));
    }
    sorted
}
