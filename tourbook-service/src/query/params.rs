//! Request parameters for list endpoints
//!
//! Query strings arrive as flat `key=value` pairs. Bracketed keys such as
//! `duration[gte]=5` nest into sub-maps, and repeated keys collect into
//! lists. [`ParameterMap`] holds that raw shape; [`ListParams`] splits off
//! the reserved paging keys and defaults them at the boundary so the query
//! builder never has to validate anything.
//!
//! # Example
//!
//! ```rust
//! use tourbook_service::query::{ListParams, ParameterMap};
//!
//! let params = ListParams::from_query_str("difficulty=easy&page=2&limit=10");
//! assert_eq!(params.page_number(), 2);
//! assert_eq!(params.items_per_page(), 10);
//! assert_eq!(params.offset(), 10);
//! assert!(params.filter.get("difficulty").is_some());
//!
//! let raw = ParameterMap::parse("duration[gte]=5");
//! assert!(raw.get("duration").is_some());
//! ```

use std::collections::btree_map::{self, BTreeMap, Entry};

/// Default page number when none (or garbage) is supplied
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size when none (or garbage) is supplied
pub const DEFAULT_LIMIT: u64 = 100;

/// Keys that shape the result window and never reach the filter predicate
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// A single query-string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `key=value`
    Single(String),
    /// `key=a&key=b`
    List(Vec<String>),
    /// `key[sub]=value`
    Nested(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// The scalar form of this value.
    ///
    /// Lists resolve to their last element, so a polluted `sort=a&sort=b`
    /// behaves like `sort=b`. Nested maps have no scalar form.
    pub fn last_value(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(values) => values.last().map(String::as_str),
            Self::Nested(_) => None,
        }
    }

    /// Reduce every list in this value to its last element
    #[must_use]
    pub fn collapse(self) -> Self {
        match self {
            Self::List(mut values) => Self::Single(values.pop().unwrap_or_default()),
            Self::Nested(inner) => Self::Nested(
                inner
                    .into_iter()
                    .map(|(key, value)| (key, value.collapse()))
                    .collect(),
            ),
            single => single,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(previous) => {
                let previous = std::mem::take(previous);
                *self = Self::List(vec![previous, value]);
            }
            Self::List(values) => values.push(value),
            Self::Nested(_) => *self = Self::Single(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

/// Raw parameters parsed from a query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap(BTreeMap<String, ParamValue>);

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw (still percent-encoded) query string.
    ///
    /// Malformed input yields whatever pairs could be decoded; parsing never
    /// fails. Keys that start with `$` or contain `.` are dropped so callers
    /// cannot smuggle store operators into a predicate.
    pub fn parse(raw: &str) -> Self {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "discarding undecodable query string");
            Vec::new()
        });

        let mut map = Self::new();
        for (key, value) in pairs {
            let segments = split_key(&key);
            if segments.iter().any(|segment| is_unsafe_key(segment)) {
                tracing::debug!(key = %key, "dropping unsafe query key");
                continue;
            }
            insert_path(&mut map.0, &segments, value);
        }
        map
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    /// Keep repeated values only for keys in `repeatable`; any other key
    /// repeated in the query string resolves to its last value.
    #[must_use]
    pub fn collapse_repeated<S: AsRef<str>>(self, repeatable: &[S]) -> Self {
        self.0
            .into_iter()
            .map(|(key, value)| {
                if repeatable.iter().any(|allowed| allowed.as_ref() == key) {
                    (key, value)
                } else {
                    (key, value.collapse())
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, ParamValue)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ParameterMap {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Keys a client may not use: store operators and dotted paths
pub(crate) fn is_unsafe_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Split `a[b][c]` into `["a", "b", "c"]`.
///
/// Anything that is not well-formed bracket syntax is kept as a literal key.
/// Empty brackets (`a[]`) append to a list.
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key];
    }

    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            return vec![key];
        };
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        if close > 0 {
            segments.push(&inner[..close]);
        }
        rest = &inner[close + 1..];
    }
    segments
}

fn insert_path(map: &mut BTreeMap<String, ParamValue>, segments: &[&str], value: String) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };

    if tail.is_empty() {
        match map.entry((*head).to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(ParamValue::Single(value));
            }
            Entry::Occupied(mut slot) => slot.get_mut().push(value),
        }
        return;
    }

    let slot = map
        .entry((*head).to_string())
        .or_insert_with(|| ParamValue::Nested(BTreeMap::new()));
    if !matches!(slot, ParamValue::Nested(_)) {
        *slot = ParamValue::Nested(BTreeMap::new());
    }
    if let ParamValue::Nested(inner) = slot {
        insert_path(inner, tail, value);
    }
}

/// Typed list parameters, defaulted at the request boundary
///
/// The four reserved keys become explicit optional fields and everything
/// else stays in the open `filter` map. Values that fail to parse are
/// stored as `None`, so [`page_number`](Self::page_number) and
/// [`items_per_page`](Self::items_per_page) fall back to their defaults
/// instead of rejecting the request.
///
/// # Example
///
/// ```rust
/// use tourbook_service::query::ListParams;
///
/// let params = ListParams::from_query_str("page=abc&limit=0");
/// assert_eq!(params.page_number(), 1);
/// assert_eq!(params.items_per_page(), 100);
///
/// let params = ListParams::default()
///     .with_sort("-price,name")
///     .with_limit(5);
/// assert_eq!(params.sort.as_deref(), Some("-price,name"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: Option<u64>,

    /// Items per page
    pub limit: Option<u64>,

    /// Comma-separated sort fields, `-` prefix for descending
    pub sort: Option<String>,

    /// Comma-separated projection fields
    pub fields: Option<String>,

    /// Every non-reserved parameter
    pub filter: ParameterMap,
}

impl ListParams {
    /// Split a parsed parameter map into reserved fields and filter.
    pub fn from_params(mut params: ParameterMap) -> Self {
        let page = params.remove("page").and_then(|v| positive_number(&v));
        let limit = params.remove("limit").and_then(|v| positive_number(&v));
        let sort = params.remove("sort").and_then(|v| non_empty(&v));
        let fields = params.remove("fields").and_then(|v| non_empty(&v));

        Self {
            page,
            limit,
            sort,
            fields,
            filter: params,
        }
    }

    /// Parse directly from a raw query string.
    pub fn from_query_str(raw: &str) -> Self {
        Self::from_params(ParameterMap::parse(raw))
    }

    /// Get the page number (defaults to 1)
    pub fn page_number(&self) -> u64 {
        self.page.unwrap_or(DEFAULT_PAGE).max(1)
    }

    /// Get the items per page (defaults to 100)
    pub fn items_per_page(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).max(1)
    }

    /// Number of records skipped before the current page
    pub fn offset(&self) -> u64 {
        (self.page_number() - 1).saturating_mul(self.items_per_page())
    }

    #[must_use]
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    /// See [`ParameterMap::collapse_repeated`]
    #[must_use]
    pub fn collapse_repeated<S: AsRef<str>>(mut self, repeatable: &[S]) -> Self {
        self.filter = self.filter.collapse_repeated(repeatable);
        self
    }

    /// Add a filter parameter
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.filter.insert(key, value);
        self
    }
}

fn positive_number(value: &ParamValue) -> Option<u64> {
    value
        .last_value()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
}

fn non_empty(value: &ParamValue) -> Option<String> {
    value
        .last_value()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(str::to_string)
}

/// A canned set of reserved parameters mounted as its own route
///
/// Preset values replace whatever the caller sent for the same keys; filter
/// parameters pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPreset {
    pub limit: Option<u64>,
    pub sort: Option<&'static str>,
    pub fields: Option<&'static str>,
}

impl ListPreset {
    /// The five cheapest best-rated tours
    pub const TOP_FIVE_CHEAP: Self = Self {
        limit: Some(5),
        sort: Some("-ratingsAverage,price"),
        fields: Some("name,price,ratingsAverage,summary,difficulty"),
    };

    pub fn apply(&self, mut params: ListParams) -> ListParams {
        if let Some(limit) = self.limit {
            params.limit = Some(limit);
        }
        if let Some(sort) = self.sort {
            params.sort = Some(sort.to_string());
        }
        if let Some(fields) = self.fields {
            params.fields = Some(fields.to_string());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let params = ListParams::from_query_str("");
        assert_eq!(params.page_number(), 1);
        assert_eq!(params.items_per_page(), 100);
        assert_eq!(params.offset(), 0);
        assert!(params.filter.is_empty());
    }

    #[test]
    fn test_non_numeric_page_and_limit_fall_back() {
        for raw in ["page=abc&limit=xyz", "page=-3&limit=-1", "page=0&limit=0", "page=&limit="] {
            let params = ListParams::from_query_str(raw);
            assert_eq!(params.page, None, "{raw}");
            assert_eq!(params.limit, None, "{raw}");
            assert_eq!(params.page_number(), 1);
            assert_eq!(params.items_per_page(), 100);
        }
    }

    #[test]
    fn test_page_two_limit_ten() {
        let params = ListParams::from_query_str("page=2&limit=10");
        assert_eq!(params.offset(), 10);
        assert_eq!(params.items_per_page(), 10);
    }

    #[test]
    fn test_offset_saturates() {
        let params = ListParams::default().with_page(u64::MAX).with_limit(u64::MAX);
        assert_eq!(params.offset(), u64::MAX);
    }

    #[test]
    fn test_only_whitelisted_keys_stay_repeated() {
        let params = ListParams::from_query_str(
            "duration=5&duration=9&difficulty=easy&difficulty=medium&price[lt]=500&price[lt]=900&sort=price",
        )
        .collapse_repeated(&["duration"]);
        assert_eq!(
            params.filter.get("duration"),
            Some(&ParamValue::List(vec!["5".into(), "9".into()]))
        );
        assert_eq!(params.filter.get("difficulty"), Some(&ParamValue::from("medium")));
        let ParamValue::Nested(price) = params.filter.get("price").unwrap() else {
            panic!("price should stay nested");
        };
        assert_eq!(price.get("lt"), Some(&ParamValue::from("900")));
        assert_eq!(params.sort.as_deref(), Some("price"));
    }

    #[test]
    fn test_reserved_keys_leave_filter() {
        let params =
            ListParams::from_query_str("page=1&sort=price&limit=3&fields=name&difficulty=easy");
        assert_eq!(params.filter.len(), 1);
        for key in RESERVED_KEYS {
            assert!(params.filter.get(key).is_none());
        }
        assert_eq!(params.sort.as_deref(), Some("price"));
        assert_eq!(params.fields.as_deref(), Some("name"));
    }

    #[test]
    fn test_repeated_reserved_key_uses_last() {
        let params = ListParams::from_query_str("sort=duration&sort=price");
        assert_eq!(params.sort.as_deref(), Some("price"));
    }

    #[test]
    fn test_empty_sort_and_fields_are_absent() {
        let params = ListParams::from_query_str("sort=&fields=%20");
        assert_eq!(params.sort, None);
        assert_eq!(params.fields, None);
    }

    #[test]
    fn test_bracket_nesting() {
        let map = ParameterMap::parse("duration[gte]=5&duration[lt]=9&price[a][b]=1");
        let Some(ParamValue::Nested(duration)) = map.get("duration") else {
            panic!("expected nested duration");
        };
        assert_eq!(duration.get("gte"), Some(&ParamValue::from("5")));
        assert_eq!(duration.get("lt"), Some(&ParamValue::from("9")));

        let Some(ParamValue::Nested(price)) = map.get("price") else {
            panic!("expected nested price");
        };
        assert!(matches!(price.get("a"), Some(ParamValue::Nested(_))));
    }

    #[test]
    fn test_repeated_keys_collect() {
        let map = ParameterMap::parse("difficulty=easy&difficulty=medium&tag[]=a&tag[]=b");
        assert_eq!(
            map.get("difficulty"),
            Some(&ParamValue::List(vec!["easy".into(), "medium".into()]))
        );
        assert_eq!(
            map.get("tag"),
            Some(&ParamValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_percent_decoding() {
        let map = ParameterMap::parse("name=The%20Forest+Hiker&duration%5Bgte%5D=5");
        assert_eq!(map.get("name"), Some(&ParamValue::from("The Forest Hiker")));
        assert!(matches!(map.get("duration"), Some(ParamValue::Nested(_))));
    }

    #[test]
    fn test_malformed_brackets_kept_literal() {
        let map = ParameterMap::parse("a[b=1&[c]=2");
        assert_eq!(map.get("a[b"), Some(&ParamValue::from("1")));
        assert_eq!(map.get("[c]"), Some(&ParamValue::from("2")));
    }

    #[test]
    fn test_unsafe_keys_dropped() {
        let map = ParameterMap::parse("$where=1&price[$ne]=0&location.city=x&name=ok");
        assert_eq!(map.len(), 1);
        assert!(map.get("name").is_some());
    }

    #[test]
    fn test_preset_overrides_reserved_keys() {
        let caller = ListParams::from_query_str("limit=50&sort=name&difficulty=easy");
        let params = ListPreset::TOP_FIVE_CHEAP.apply(caller);
        assert_eq!(params.limit, Some(5));
        assert_eq!(params.sort.as_deref(), Some("-ratingsAverage,price"));
        assert_eq!(
            params.fields.as_deref(),
            Some("name,price,ratingsAverage,summary,difficulty")
        );
        assert!(params.filter.get("difficulty").is_some());
    }
}
