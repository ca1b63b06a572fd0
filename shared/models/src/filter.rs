//! Filter algebra applied to retrieval results. Retrievers push down what they
//! can to their backing store and apply the remainder in-process over the
//! result's metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
    NotExists,
}

impl FilterOp {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "not_contains" => Some(Self::NotContains),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "exists" => Some(Self::Exists),
            "not_exists" => Some(Self::NotExists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    /// Dot-notation path into the result, e.g. "metadata.user_id".
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Resolve a dot-notation field path against a JSON value.
fn resolve_path<'a>(root: &'a Value, field: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn numeric(value: &Value) -> Option<f64> {
    value.as_f64()
}

fn compare_numeric(target: &Value, filter_value: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (numeric(target), numeric(filter_value)) {
        (Some(t), Some(f)) => cmp(t, f),
        _ => false,
    }
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self { field: field.into(), op, value }
    }

    /// Evaluate this filter against a JSON representation of a result (or its metadata).
    pub fn evaluate(&self, target: &Value) -> bool {
        let found = resolve_path(target, &self.field);

        match self.op {
            FilterOp::Exists => found.is_some(),
            FilterOp::NotExists => found.is_none(),
            FilterOp::Equals => found.map(|v| v == &self.value).unwrap_or(false),
            FilterOp::NotEquals => found.map(|v| v != &self.value).unwrap_or(true),
            FilterOp::Contains => match found {
                Some(Value::String(s)) => self.value.as_str().map(|needle| s.contains(needle)).unwrap_or(false),
                Some(Value::Array(items)) => items.contains(&self.value),
                _ => false,
            },
            FilterOp::NotContains => match found {
                Some(Value::String(s)) => !self.value.as_str().map(|needle| s.contains(needle)).unwrap_or(false),
                Some(Value::Array(items)) => !items.contains(&self.value),
                _ => true,
            },
            FilterOp::In => match (&self.value, found) {
                (Value::Array(options), Some(v)) => options.contains(v),
                _ => false,
            },
            FilterOp::NotIn => match (&self.value, found) {
                (Value::Array(options), Some(v)) => !options.contains(v),
                _ => true,
            },
            FilterOp::Gt => found.map(|v| compare_numeric(v, &self.value, |a, b| a > b)).unwrap_or(false),
            FilterOp::Gte => found.map(|v| compare_numeric(v, &self.value, |a, b| a >= b)).unwrap_or(false),
            FilterOp::Lt => found.map(|v| compare_numeric(v, &self.value, |a, b| a < b)).unwrap_or(false),
            FilterOp::Lte => found.map(|v| compare_numeric(v, &self.value, |a, b| a <= b)).unwrap_or(false),
        }
    }

    /// Evaluate, logging and returning false for any filter whose `op` string
    /// failed to parse into a known `FilterOp` upstream.
    pub fn evaluate_raw(field: &str, raw_op: &str, value: &Value, target: &Value) -> bool {
        match FilterOp::parse(raw_op) {
            Some(op) => Filter::new(field, op, value.clone()).evaluate(target),
            None => {
                tracing::warn!(field = field, op = raw_op, "unknown filter operator, evaluating false");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dot_path_resolves_nested_field() {
        let target = json!({ "metadata": { "user_id": "u1" } });
        let f = Filter::new("metadata.user_id", FilterOp::Equals, json!("u1"));
        assert!(f.evaluate(&target));
    }

    #[test]
    fn missing_field_exists_is_false() {
        let target = json!({ "metadata": {} });
        let f = Filter::new("metadata.user_id", FilterOp::Exists, Value::Null);
        assert!(!f.evaluate(&target));
    }

    #[test]
    fn unknown_operator_logs_and_evaluates_false() {
        let target = json!({ "score": 0.9 });
        assert!(!Filter::evaluate_raw("score", "bogus_op", &json!(0.5), &target));
    }

    #[test]
    fn numeric_comparisons() {
        let target = json!({ "score": 0.75 });
        assert!(Filter::new("score", FilterOp::Gte, json!(0.5)).evaluate(&target));
        assert!(!Filter::new("score", FilterOp::Lt, json!(0.5)).evaluate(&target));
    }
}
