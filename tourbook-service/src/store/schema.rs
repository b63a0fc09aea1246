//! Collection schemas for the in-memory store
//!
//! A schema casts incoming values to their declared kind, fills defaults,
//! and runs validation rules. It also carries the collection's standing
//! query behaviour: a scope every find is narrowed by, the relations every
//! find populates, fields computed on output, and rollups kept up to date
//! on the documents this collection points at.
//!
//! ```rust
//! use tourbook_service::store::{CollectionSchema, FieldSpec};
//!
//! let schema = CollectionSchema::new("tours")
//!     .field(FieldSpec::text("name").required("A tour must have a name"))
//!     .field(FieldSpec::number("price").required("Price must have a value"));
//!
//! let errors = schema.prepare_create(serde_json::Map::new()).unwrap_err();
//! assert_eq!(errors, vec!["A tour must have a name", "Price must have a value"]);
//! ```

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use super::traits::Document;
use crate::query::{CompareOp, Populate, Predicate};

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// RFC 3339 timestamp string
    Timestamp,
    /// Any JSON value; no casting
    Any,
}

impl FieldKind {
    /// Name used in cast error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Timestamp => "date",
            Self::Any => "Mixed",
        }
    }
}

/// Default applied when a field is missing on create
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Value(Value),
    /// Current time, RFC 3339 with millisecond precision
    Now,
}

/// A rule checked against a present, non-null value
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    MinLength(usize, String),
    MaxLength(usize, String),
    Min(f64, String),
    Max(f64, String),
    OneOf(Vec<String>, String),
    Email(String),
    /// Numeric value must be below the named sibling field. `{VALUE}` in
    /// the message is replaced with the offending value.
    BelowField(String, String),
}

/// One field of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: Option<String>,
    pub rules: Vec<Rule>,
    pub default: Option<FieldDefault>,
    /// Left out of results unless a projection names it
    pub hidden: bool,
    pub trim: bool,
    /// Round numbers to this many decimal places
    pub round_to: Option<u32>,
    /// Set on create to a URL slug of the named text field
    pub slug_of: Option<String>,
}

/// A filter value that cannot be cast to its field's kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastFailure {
    pub path: String,
    pub value: String,
    pub kind: FieldKind,
}

/// An output-only field derived from stored ones
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    /// `source / divisor`, present whenever `source` is a number
    Quotient {
        path: String,
        source: String,
        divisor: f64,
    },
}

impl Computed {
    pub fn quotient(path: impl Into<String>, source: impl Into<String>, divisor: f64) -> Self {
        Self::Quotient {
            path: path.into(),
            source: source.into(),
            divisor,
        }
    }

    fn apply(&self, document: &mut Document) {
        match self {
            Self::Quotient { path, source, divisor } => {
                let value = document
                    .get(source)
                    .and_then(Value::as_f64)
                    .and_then(|n| Number::from_f64(n / divisor));
                if let Some(value) = value {
                    document.insert(path.clone(), Value::Number(value));
                }
            }
        }
    }
}

/// Count and mean of this collection's `value_field`, grouped by
/// `foreign_field` and written onto the matching `target` document
///
/// ```rust
/// use tourbook_service::store::Rollup;
///
/// let ratings = Rollup::new("tour", "rating", "tours")
///     .into_fields("ratingsQuantity", "ratingsAverage")
///     .empty_average(4.5);
/// assert_eq!(ratings.count_field, "ratingsQuantity");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub foreign_field: String,
    pub value_field: String,
    pub target: String,
    pub count_field: String,
    pub average_field: String,
    /// Average written once nothing points at the target any more
    pub empty_average: f64,
}

impl Rollup {
    pub fn new(
        foreign_field: impl Into<String>,
        value_field: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            foreign_field: foreign_field.into(),
            value_field: value_field.into(),
            target: target.into(),
            count_field: "count".to_string(),
            average_field: "average".to_string(),
            empty_average: 0.0,
        }
    }

    #[must_use]
    pub fn into_fields(mut self, count: impl Into<String>, average: impl Into<String>) -> Self {
        self.count_field = count.into();
        self.average_field = average.into();
        self
    }

    #[must_use]
    pub fn empty_average(mut self, average: f64) -> Self {
        self.empty_average = average;
        self
    }

    /// The patch for a target given the grouped values
    pub fn summary(&self, values: &[f64]) -> Document {
        let (count, average) = if values.is_empty() {
            (0, self.empty_average)
        } else {
            (values.len(), values.iter().sum::<f64>() / values.len() as f64)
        };
        let mut patch = Document::new();
        patch.insert(self.count_field.clone(), Value::from(count));
        patch.insert(self.average_field.clone(), Value::from(average));
        patch
    }
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: None,
            rules: Vec::new(),
            default: None,
            hidden: false,
            trim: false,
            round_to: None,
            slug_of: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Any)
    }

    #[must_use]
    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    #[must_use]
    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    #[must_use]
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }

    #[must_use]
    pub fn round_to(mut self, places: u32) -> Self {
        self.round_to = Some(places);
        self
    }

    /// Derive this field from `source` whenever a document is created
    #[must_use]
    pub fn slug_of(mut self, source: impl Into<String>) -> Self {
        self.slug_of = Some(source.into());
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn min_length(self, len: usize, message: impl Into<String>) -> Self {
        self.rule(Rule::MinLength(len, message.into()))
    }

    #[must_use]
    pub fn max_length(self, len: usize, message: impl Into<String>) -> Self {
        self.rule(Rule::MaxLength(len, message.into()))
    }

    #[must_use]
    pub fn min(self, min: f64, message: impl Into<String>) -> Self {
        self.rule(Rule::Min(min, message.into()))
    }

    #[must_use]
    pub fn max(self, max: f64, message: impl Into<String>) -> Self {
        self.rule(Rule::Max(max, message.into()))
    }

    #[must_use]
    pub fn one_of<I, S>(self, values: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rule(Rule::OneOf(
            values.into_iter().map(Into::into).collect(),
            message.into(),
        ))
    }

    #[must_use]
    pub fn email(self, message: impl Into<String>) -> Self {
        self.rule(Rule::Email(message.into()))
    }

    #[must_use]
    pub fn below_field(self, other: impl Into<String>, message: impl Into<String>) -> Self {
        self.rule(Rule::BelowField(other.into(), message.into()))
    }

    /// Cast `value` to this field's kind, or describe why it cannot be.
    fn cast(&self, value: Value) -> Result<Value, String> {
        self.try_cast(value).map_err(|rejected| {
            format!(
                "Cast to {} failed for value {} at path \"{}\"",
                self.kind.name(),
                rejected,
                self.name
            )
        })
    }

    /// Cast `value` to this field's kind, handing back the value on failure
    fn try_cast(&self, value: Value) -> Result<Value, Value> {
        let cast = match (self.kind, value) {
            (_, Value::Null) => Ok(Value::Null),
            (FieldKind::Any, value) => Ok(value),
            (FieldKind::Text, Value::String(s)) => Ok(Value::String(s)),
            (FieldKind::Text, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (FieldKind::Text, Value::Bool(b)) => Ok(Value::String(b.to_string())),
            (FieldKind::Number, Value::Number(n)) => Ok(Value::Number(n)),
            (FieldKind::Number, Value::String(s)) if s.trim().is_empty() => Ok(Value::Null),
            (FieldKind::Number, Value::String(s)) => parse_number(&s).ok_or(Value::String(s)),
            (FieldKind::Boolean, Value::Bool(b)) => Ok(Value::Bool(b)),
            (FieldKind::Boolean, Value::String(s)) => match s.as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(Value::String(s)),
            },
            (FieldKind::Timestamp, Value::String(s)) => match parse_timestamp(&s) {
                Some(parsed) => Ok(Value::String(parsed)),
                None => Err(Value::String(s)),
            },
            (_, other) => Err(other),
        };
        cast.map(|value| self.normalize(value))
    }

    /// Cast one filter condition: a literal, a list of alternatives, or an
    /// operator map whose operands are cast one by one
    fn cast_condition(&self, condition: Value) -> Result<Value, Value> {
        match condition {
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.try_cast(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => ops
                .into_iter()
                .map(|(token, operand)| -> Result<(String, Value), Value> {
                    let operand = match (CompareOp::from_token(&token), operand) {
                        (Some(CompareOp::In | CompareOp::Nin), Value::Array(items)) => items
                            .into_iter()
                            .map(|item| self.try_cast(item))
                            .collect::<Result<Vec<_>, _>>()
                            .map(Value::Array)?,
                        (_, operand) => self.try_cast(operand)?,
                    };
                    Ok((token, operand))
                })
                .collect::<Result<Map<String, Value>, Value>>()
                .map(Value::Object),
            Value::Object(other) => Ok(Value::Object(other)),
            scalar => self.try_cast(scalar),
        }
    }

    fn normalize(&self, value: Value) -> Value {
        match value {
            Value::String(s) if self.trim => Value::String(s.trim().to_string()),
            Value::Number(n) => match (self.round_to, n.as_f64()) {
                (Some(places), Some(f)) if !n.is_i64() && !n.is_u64() => {
                    let factor = 10f64.powi(places as i32);
                    Number::from_f64((f * factor).round() / factor)
                        .map_or(Value::Number(n), Value::Number)
                }
                _ => Value::Number(n),
            },
            other => other,
        }
    }

    fn check(&self, value: &Value, document: &Document, errors: &mut Vec<String>) {
        for rule in &self.rules {
            let passed = match rule {
                Rule::MinLength(len, _) => value.as_str().map_or(true, |s| s.chars().count() >= *len),
                Rule::MaxLength(len, _) => value.as_str().map_or(true, |s| s.chars().count() <= *len),
                Rule::Min(min, _) => value.as_f64().map_or(true, |n| n >= *min),
                Rule::Max(max, _) => value.as_f64().map_or(true, |n| n <= *max),
                Rule::OneOf(allowed, _) => value
                    .as_str()
                    .map_or(true, |s| allowed.iter().any(|a| a == s)),
                Rule::Email(_) => value.as_str().map_or(true, looks_like_email),
                Rule::BelowField(other, _) => {
                    match (value.as_f64(), document.get(other).and_then(Value::as_f64)) {
                        (Some(ours), Some(theirs)) => ours < theirs,
                        _ => true,
                    }
                }
            };
            if !passed {
                errors.push(rule_message(rule, value));
            }
        }
    }
}

fn rule_message(rule: &Rule, value: &Value) -> String {
    match rule {
        Rule::MinLength(_, message)
        | Rule::MaxLength(_, message)
        | Rule::Min(_, message)
        | Rule::Max(_, message)
        | Rule::OneOf(_, message)
        | Rule::Email(message) => message.clone(),
        Rule::BelowField(_, message) => message.replace("{VALUE}", &value.to_string()),
    }
}

/// RFC 3339, or a bare `YYYY-MM-DD` taken as midnight UTC
fn parse_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.with_timezone(&Utc),
        Err(_) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    };
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Lowercase alphanumeric words joined by `-`
fn slugify(raw: &str) -> String {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn parse_number(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn looks_like_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !raw.chars().any(char::is_whitespace)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Schema and standing query behaviour of one collection
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    /// Field sets whose combined values must be unique
    pub unique: Vec<Vec<String>>,
    /// Narrows every find, lookup, update and delete
    pub scope: Predicate,
    /// Relations expanded on every read
    pub populate: Vec<Populate>,
    /// Fields added to every document read out
    pub computed: Vec<Computed>,
    /// Summaries this collection maintains on other collections
    pub rollups: Vec<Rollup>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            unique: Vec::new(),
            scope: Predicate::new(),
            populate: Vec::new(),
            computed: Vec::new(),
            rollups: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Require the values of `fields` to be unique together
    #[must_use]
    pub fn unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique.push(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: Predicate) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    #[must_use]
    pub fn computed(mut self, computed: Computed) -> Self {
        self.computed.push(computed);
        self
    }

    #[must_use]
    pub fn rollup(mut self, rollup: Rollup) -> Self {
        self.rollups.push(rollup);
        self
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Add computed fields to a document on its way out
    pub fn apply_computed(&self, document: &mut Document) {
        for computed in &self.computed {
            computed.apply(document);
        }
    }

    /// Cast filter values to the kinds of the fields they constrain.
    ///
    /// Paths without a declared field pass through untouched. The first
    /// value that cannot be cast is reported.
    pub fn cast_predicate(&self, predicate: Predicate) -> Result<Predicate, CastFailure> {
        let mut cast = Map::new();
        for (path, condition) in predicate.iter() {
            let condition = match self.field_spec(path) {
                Some(field) if field.kind != FieldKind::Any => field
                    .cast_condition(condition.clone())
                    .map_err(|rejected| CastFailure {
                        path: path.clone(),
                        value: match rejected {
                            Value::String(s) => s,
                            other => other.to_string(),
                        },
                        kind: field.kind,
                    })?,
                _ => condition.clone(),
            };
            cast.insert(path.clone(), condition);
        }
        Ok(Predicate::from(cast))
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|field| field.hidden)
            .map(|field| field.name.as_str())
    }

    /// Apply defaults, casts and every rule to a new document.
    ///
    /// Returns one message per failing check, in field order.
    pub fn prepare_create(&self, document: Document) -> Result<Document, Vec<String>> {
        let mut document = self.fill_defaults(document);
        let mut errors = Vec::new();
        self.cast_fields(&mut document, &mut errors);
        self.derive_slugs(&mut document);

        for field in &self.fields {
            let value = document.get(&field.name);
            if let Some(message) = &field.required {
                if is_blank(value) {
                    errors.push(message.clone());
                    continue;
                }
            }
            if let Some(value) = value.filter(|v| !v.is_null()) {
                field.check(value, &document, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(document)
        } else {
            Err(errors)
        }
    }

    /// Cast the fields present in `patch` and, when `validate` is set, run
    /// their rules. Only fields in the patch are checked; a required field is
    /// rejected only if the patch blanks it.
    pub fn prepare_update(&self, mut patch: Document, validate: bool) -> Result<Document, Vec<String>> {
        let mut errors = Vec::new();
        self.cast_fields(&mut patch, &mut errors);

        if validate {
            for field in &self.fields {
                if !patch.contains_key(&field.name) {
                    continue;
                }
                let value = patch.get(&field.name);
                if let Some(message) = &field.required {
                    if is_blank(value) {
                        errors.push(message.clone());
                        continue;
                    }
                }
                if let Some(value) = value.filter(|v| !v.is_null()) {
                    field.check(value, &patch, &mut errors);
                }
            }
        }

        if errors.is_empty() {
            Ok(patch)
        } else {
            Err(errors)
        }
    }

    /// Defaults and casts only, for trusted bulk loads
    pub fn prepare_import(&self, document: Document) -> Result<Document, Vec<String>> {
        let mut document = self.fill_defaults(document);
        let mut errors = Vec::new();
        self.cast_fields(&mut document, &mut errors);
        self.derive_slugs(&mut document);
        if errors.is_empty() {
            Ok(document)
        } else {
            Err(errors)
        }
    }

    fn derive_slugs(&self, document: &mut Document) {
        for field in &self.fields {
            let Some(source) = &field.slug_of else {
                continue;
            };
            if let Some(text) = document.get(source).and_then(Value::as_str) {
                let slug = slugify(text);
                document.insert(field.name.clone(), Value::String(slug));
            }
        }
    }

    fn fill_defaults(&self, mut document: Document) -> Document {
        for field in &self.fields {
            let Some(default) = &field.default else {
                continue;
            };
            if document.get(&field.name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let value = match default {
                FieldDefault::Value(value) => value.clone(),
                FieldDefault::Now => {
                    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
                }
            };
            document.insert(field.name.clone(), value);
        }
        document
    }

    fn cast_fields(&self, document: &mut Document, errors: &mut Vec<String>) {
        for field in &self.fields {
            let Some(value) = document.get(&field.name).cloned() else {
                continue;
            };
            match field.cast(value) {
                Ok(cast) => {
                    document.insert(field.name.clone(), cast);
                }
                Err(message) => errors.push(message),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn tours() -> CollectionSchema {
        CollectionSchema::new("tours")
            .field(
                FieldSpec::text("name")
                    .required("A tour must have a name")
                    .trim()
                    .min_length(10, "A tour name must have at least 10 characters"),
            )
            .field(FieldSpec::number("price").required("Price must have a value"))
            .field(
                FieldSpec::number("discount")
                    .below_field("price", "Discount price ({VALUE}) should be below regular price"),
            )
            .field(
                FieldSpec::text("difficulty")
                    .one_of(["easy", "medium", "difficult"], "Difficulty is either: easy, medium, difficult"),
            )
            .field(
                FieldSpec::number("ratingsAverage")
                    .default_value(4.5)
                    .min(1.0, "Rating must be above 1.0")
                    .max(5.0, "Rating must be below 5.0")
                    .round_to(1),
            )
            .field(FieldSpec::timestamp("createdAt").default_now().hidden())
    }

    #[test]
    fn test_defaults_and_casts() {
        let prepared = tours()
            .prepare_create(doc(json!({"name": "  The Forest Hiker  ", "price": "497"})))
            .unwrap();
        assert_eq!(prepared["name"], json!("The Forest Hiker"));
        assert_eq!(prepared["price"], json!(497));
        assert_eq!(prepared["ratingsAverage"], json!(4.5));
        assert!(prepared["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_rules_report_in_field_order() {
        let errors = tours()
            .prepare_create(doc(json!({
                "name": "Short",
                "price": 100,
                "discount": 150,
                "difficulty": "extreme",
                "ratingsAverage": 7
            })))
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                "A tour name must have at least 10 characters",
                "Discount price (150) should be below regular price",
                "Difficulty is either: easy, medium, difficult",
                "Rating must be below 5.0",
            ]
        );
    }

    #[test]
    fn test_cast_failure_is_reported() {
        let errors = tours()
            .prepare_create(doc(json!({"name": "The Forest Hiker", "price": "cheap"})))
            .unwrap_err();
        assert_eq!(
            errors,
            vec!["Cast to Number failed for value \"cheap\" at path \"price\""]
        );
    }

    #[test]
    fn test_rounding() {
        let prepared = tours()
            .prepare_create(doc(json!({"name": "The Forest Hiker", "price": 1, "ratingsAverage": 4.666})))
            .unwrap();
        assert_eq!(prepared["ratingsAverage"], json!(4.7));
    }

    #[test]
    fn test_update_checks_only_present_fields() {
        let schema = tours();
        assert!(schema.prepare_update(doc(json!({"price": "20"})), true).is_ok());
        assert_eq!(
            schema
                .prepare_update(doc(json!({"name": ""})), true)
                .unwrap_err(),
            vec!["A tour must have a name"]
        );
        assert!(schema
            .prepare_update(doc(json!({"difficulty": "extreme"})), false)
            .is_ok());
    }

    #[test]
    fn test_hidden_fields() {
        assert_eq!(tours().hidden_fields().collect::<Vec<_>>(), vec!["createdAt"]);
    }

    #[test]
    fn test_filter_values_are_cast() {
        let schema = tours().field(FieldSpec::boolean("secretTour"));
        let predicate = Predicate::from(doc(json!({
            "price": {"$gte": "100", "$in": ["1", "2"]},
            "secretTour": "false",
            "difficulty": ["easy", "medium"],
            "unknown": "anything"
        })));
        let cast = schema.cast_predicate(predicate).unwrap();
        assert_eq!(cast.get("price"), Some(&json!({"$gte": 100, "$in": [1, 2]})));
        assert_eq!(cast.get("secretTour"), Some(&json!(false)));
        assert_eq!(cast.get("difficulty"), Some(&json!(["easy", "medium"])));
        assert_eq!(cast.get("unknown"), Some(&json!("anything")));
    }

    #[test]
    fn test_uncastable_filter_value_is_reported() {
        let failure = tours()
            .cast_predicate(Predicate::from(doc(json!({"price": {"$gte": "lots"}}))))
            .unwrap_err();
        assert_eq!(
            failure,
            CastFailure {
                path: "price".into(),
                value: "lots".into(),
                kind: FieldKind::Number,
            }
        );

        let failure = tours()
            .cast_predicate(Predicate::from(doc(json!({"createdAt": "yesterday"}))))
            .unwrap_err();
        assert_eq!(failure.path, "createdAt");
    }

    #[test]
    fn test_date_only_timestamps() {
        assert_eq!(
            parse_timestamp("2021-03-01").as_deref(),
            Some("2021-03-01T00:00:00.000Z")
        );
        assert_eq!(
            parse_timestamp("2021-03-01T10:00:00+02:00").as_deref(),
            Some("2021-03-01T08:00:00.000Z")
        );
        assert!(parse_timestamp("March").is_none());
    }

    #[test]
    fn test_slug_follows_name_on_create() {
        let schema = tours().field(FieldSpec::text("slug").slug_of("name"));
        let prepared = schema
            .prepare_create(doc(json!({"name": "The Park Camper!", "price": 1, "slug": "x"})))
            .unwrap();
        assert_eq!(prepared["slug"], json!("the-park-camper"));

        let imported = schema
            .prepare_import(doc(json!({"name": "  The   Sea Explorer "})))
            .unwrap();
        assert_eq!(imported["slug"], json!("the-sea-explorer"));
    }

    #[test]
    fn test_computed_quotient() {
        let schema = tours().computed(Computed::quotient("durationWeeks", "duration", 7.0));
        let mut tour = doc(json!({"duration": 14}));
        schema.apply_computed(&mut tour);
        assert_eq!(tour["durationWeeks"], json!(2.0));

        let mut without = doc(json!({"name": "x"}));
        schema.apply_computed(&mut without);
        assert!(!without.contains_key("durationWeeks"));
    }

    #[test]
    fn test_rollup_summary() {
        let rollup = Rollup::new("tour", "rating", "tours")
            .into_fields("ratingsQuantity", "ratingsAverage")
            .empty_average(4.5);
        assert_eq!(
            Value::Object(rollup.summary(&[4.0, 5.0])),
            json!({"ratingsQuantity": 2, "ratingsAverage": 4.5})
        );
        assert_eq!(
            Value::Object(rollup.summary(&[])),
            json!({"ratingsQuantity": 0, "ratingsAverage": 4.5})
        );
    }

    #[test]
    fn test_email_rule() {
        assert!(looks_like_email("ana@example.com"));
        assert!(!looks_like_email("ana@example"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ana smith@example.com"));
    }
}
