//! Predicate evaluation, ordering and projection over JSON documents

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::traits::Document;
use crate::query::{is_operator_map, CompareOp, Predicate, Projection, SortDirection, SortKey, ID_FIELD};

const MAX_PATH_DEPTH: usize = 16;

pub fn matches(doc: &Document, predicate: &Predicate) -> bool {
    predicate
        .iter()
        .all(|(path, condition)| matches_condition(get_path(doc, path), condition))
}

fn matches_condition(actual: Option<&Value>, condition: &Value) -> bool {
    let Value::Object(ops) = condition else {
        return values_equal(actual, condition);
    };
    if !is_operator_map(condition) {
        return values_equal(actual, condition);
    }

    ops.iter().all(|(token, expected)| match CompareOp::from_token(token) {
        Some(CompareOp::Eq) => values_equal(actual, expected),
        Some(CompareOp::Ne) => !values_equal(actual, expected),
        Some(CompareOp::In) => in_set(actual, expected),
        Some(CompareOp::Nin) => !in_set(actual, expected),
        Some(op @ (CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte)) => {
            satisfies_range(actual, op, expected)
        }
        None => false,
    })
}

fn in_set(actual: Option<&Value>, set: &Value) -> bool {
    match set {
        Value::Array(members) => members.iter().any(|member| values_equal(actual, member)),
        single => values_equal(actual, single),
    }
}

fn satisfies_range(actual: Option<&Value>, op: CompareOp, expected: &Value) -> bool {
    let Some(actual) = actual else {
        return false;
    };
    if let Value::Array(items) = actual {
        return items
            .iter()
            .any(|item| satisfies_range(Some(item), op, expected));
    }
    let Some(ordering) = compare_coerced(actual, expected) else {
        return false;
    };
    match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        _ => false,
    }
}

/// Equality with query-string coercion.
///
/// A condition array matches any of its members, and an array field matches
/// if any element does. String conditions are cast to the stored value's
/// type, so `"5"` equals `5` and `"true"` equals `true`.
fn values_equal(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), Value::Array(wanted)) => {
            items == wanted || items.iter().any(|item| wanted.contains(item))
        }
        (Some(actual), Value::Array(wanted)) => {
            wanted.iter().any(|member| values_equal(Some(actual), member))
        }
        (Some(Value::Array(items)), expected) => {
            items.iter().any(|item| values_equal(Some(item), expected))
        }
        (Some(actual), expected) => {
            compare_coerced(actual, expected) == Some(Ordering::Equal)
        }
    }
}

/// Order `actual` against a condition value of possibly different type.
fn compare_coerced(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => Some(a.as_f64()?.total_cmp(&b.as_f64()?)),
        (Value::Number(a), Value::String(b)) => {
            Some(a.as_f64()?.total_cmp(&b.trim().parse::<f64>().ok()?))
        }
        (Value::String(a), Value::Number(b)) => {
            Some(a.trim().parse::<f64>().ok()?.total_cmp(&b.as_f64()?))
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::String(b)) => match b.as_str() {
            "true" => Some(a.cmp(&true)),
            "false" => Some(a.cmp(&false)),
            _ => None,
        },
        (Value::Object(_), Value::Object(_)) => (actual == expected).then_some(Ordering::Equal),
        _ => None,
    }
}

/// Resolve a dotted path
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for (depth, part) in parts.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Multi-key document ordering; missing fields sort first
pub fn compare_docs(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = match (get_path(a, &key.field), get_path(b, &key.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Apply a projection. `_id` is always kept; `hidden` fields are dropped
/// unless an inclusion projection names them.
pub fn project(doc: &Document, projection: &Projection, hidden: &[&str]) -> Document {
    match projection {
        Projection::Include(fields) => {
            let mut out = Document::new();
            if let Some(id) = doc.get(ID_FIELD) {
                out.insert(ID_FIELD.to_string(), id.clone());
            }
            for field in fields {
                if let Some(value) = get_path(doc, field) {
                    set_path(&mut out, field, value.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for field in fields.iter().map(String::as_str).chain(hidden.iter().copied()) {
                if field != ID_FIELD {
                    remove_path(&mut out, field);
                }
            }
            out
        }
    }
}
