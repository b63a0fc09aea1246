//! Filter predicates and comparison operators

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::params::{ParamValue, ParameterMap};

/// Comparison operators understood by the document store
///
/// Only the four range operators may be written in a query string
/// (`price[lt]=500`). The rest are available to code that builds
/// predicates directly, such as default scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

impl CompareOp {
    /// Operators accepted from query strings
    pub const QUERY_OPERATORS: [CompareOp; 4] = [Self::Gte, Self::Gt, Self::Lte, Self::Lt];

    /// The prefixed store token, e.g. `$gte`
    pub fn token(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
        }
    }

    /// Map a query-string sub-key (`gte`) to its operator
    pub fn from_query_key(key: &str) -> Option<Self> {
        Self::QUERY_OPERATORS
            .into_iter()
            .find(|op| &op.token()[1..] == key)
    }

    /// Map a store token (`$gte`) to its operator
    pub fn from_token(token: &str) -> Option<Self> {
        [
            Self::Eq,
            Self::Ne,
            Self::Gt,
            Self::Gte,
            Self::Lt,
            Self::Lte,
            Self::In,
            Self::Nin,
        ]
        .into_iter()
        .find(|op| op.token() == token)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A document predicate: field name to literal or `{ $op: value }` map
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use tourbook_service::query::{CompareOp, Predicate};
///
/// let scope = Predicate::new().compare("secretTour", CompareOp::Ne, true);
/// let caller = Predicate::new()
///     .field("difficulty", "easy")
///     .compare("secretTour", CompareOp::Ne, false);
///
/// // The scope already constrains secretTour, so it keeps its value.
/// let merged = scope.merge(caller);
/// assert_eq!(
///     merged.into_value(),
///     json!({"difficulty": "easy", "secretTour": {"$ne": true}})
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Predicate(Map<String, Value>);

impl Predicate {
    /// An unconstrained predicate
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a predicate from a filter parameter map.
    ///
    /// Sub-map keys in the query operator vocabulary are renamed to their
    /// store tokens at every depth; all other keys and values pass through
    /// as strings. Repeated values become arrays (match any).
    pub fn from_filter(params: &ParameterMap) -> Self {
        Self(
            params
                .iter()
                .map(|(key, value)| (key.clone(), param_to_value(value)))
                .collect(),
        )
    }

    /// Constrain `name` to equal `value`
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Add `{ op: value }` to the operator map for `name`.
    ///
    /// A literal constraint already on `name` is replaced.
    #[must_use]
    pub fn compare(mut self, name: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        let slot = self
            .0
            .entry(name.into())
            .or_insert_with(|| Value::Object(Map::new()));
        if !is_operator_map(slot) {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(ops) = slot {
            ops.insert(op.token().to_string(), value.into());
        }
        self
    }

    /// Combine two predicates, keeping our constraint wherever both touch
    /// the same field. Two operator maps are unioned key by key.
    #[must_use]
    pub fn merge(mut self, other: Predicate) -> Self {
        for (key, incoming) in other.0 {
            match self.0.get_mut(&key) {
                None => {
                    self.0.insert(key, incoming);
                }
                Some(existing) => {
                    if let (Value::Object(ours), Value::Object(theirs)) = (&mut *existing, &incoming) {
                        if is_operator_object(ours) && is_operator_object(theirs) {
                            for (op, value) in theirs {
                                ours.entry(op.clone()).or_insert_with(|| value.clone());
                            }
                        }
                    }
                }
            }
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// `true` for a non-empty object whose keys are all `$` tokens
pub fn is_operator_map(value: &Value) -> bool {
    matches!(value, Value::Object(map) if is_operator_object(map))
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn param_to_value(value: &ParamValue) -> Value {
    match value {
        ParamValue::Single(raw) => Value::String(raw.clone()),
        ParamValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        ParamValue::Nested(inner) => Value::Object(
            inner
                .iter()
                .map(|(key, value)| (rename_operator(key), param_to_value(value)))
                .collect(),
        ),
    }
}

fn rename_operator(key: &str) -> String {
    CompareOp::from_query_key(key)
        .map_or_else(|| key.to_string(), |op| op.token().to_string())
}
