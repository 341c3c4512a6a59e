use crate::Chunk;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Conjunction of relational predicates over chunk/document metadata.
///
/// Both retrieval paths evaluate the same filter before scoring, so an
/// excluded chunk cannot surface through either list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataFilter {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(flatten)]
    pub op: FilterOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
    Range {
        #[serde(default)]
        gte: Option<Value>,
        #[serde(default)]
        lte: Option<Value>,
    },
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Eq(value),
        });
        self
    }

    pub fn one_of(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::In(values),
        });
        self
    }

    pub fn range(mut self, field: impl Into<String>, gte: Option<Value>, lte: Option<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op: FilterOp::Range { gte, lte },
        });
        self
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        self.conditions.iter().all(|c| c.matches(chunk))
    }

    /// Reject filters that can never be evaluated meaningfully.
    pub fn validate(&self) -> crate::Result<()> {
        for condition in &self.conditions {
            if condition.field.trim().is_empty() {
                return Err(crate::AskError::invalid_request("filter field must not be empty"));
            }
            match &condition.op {
                FilterOp::Range { gte: None, lte: None } => {
                    return Err(crate::AskError::invalid_request(format!(
                        "range filter on '{}' needs gte or lte",
                        condition.field
                    )));
                }
                FilterOp::In(values) if values.is_empty() => {
                    return Err(crate::AskError::invalid_request(format!(
                        "'in' filter on '{}' needs at least one value",
                        condition.field
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Condition {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let Some(actual) = chunk.field(&self.field) else {
            return false;
        };
        match &self.op {
            FilterOp::Eq(expected) => value_matches(&actual, expected),
            FilterOp::In(options) => options.iter().any(|o| value_matches(&actual, o)),
            FilterOp::Range { gte, lte } => {
                let lower_ok = gte
                    .as_ref()
                    .map(|bound| {
                        matches!(compare(&actual, bound), Some(Ordering::Greater | Ordering::Equal))
                    })
                    .unwrap_or(true);
                let upper_ok = lte
                    .as_ref()
                    .map(|bound| {
                        matches!(compare(&actual, bound), Some(Ordering::Less | Ordering::Equal))
                    })
                    .unwrap_or(true);
                lower_ok && upper_ok
            }
        }
    }
}

// Array-valued fields (tags) match when any element matches.
fn value_matches(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| scalar_eq(item, expected)),
        _ => scalar_eq(actual, expected),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
