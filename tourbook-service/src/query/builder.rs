//! Immutable query values and the four-stage list pipeline

use super::params::ListParams;
use super::predicate::Predicate;
use super::shape::{Populate, Projection, SortKey, DEFAULT_SORT_FIELD};

/// A not-yet-executed query against one collection
///
/// Every narrowing method consumes the query and returns a new value, so a
/// query can be cloned and extended along different branches without the
/// branches seeing each other's constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    predicate: Predicate,
    sort: Vec<SortKey>,
    projection: Projection,
    skip: u64,
    limit: Option<u64>,
    populate: Vec<Populate>,
}

impl Query {
    /// Match every document in `collection`
    pub fn find(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicate: Predicate::new(),
            sort: Vec::new(),
            projection: Projection::all(),
            skip: 0,
            limit: None,
            populate: Vec::new(),
        }
    }

    /// Narrow by `predicate`. Constraints already on the query win.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = self.predicate.merge(predicate);
        self
    }

    /// Replace the ordering
    #[must_use]
    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    #[must_use]
    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn populate(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn skip_count(&self) -> u64 {
        self.skip
    }

    pub fn limit_count(&self) -> Option<u64> {
        self.limit
    }

    pub fn populates(&self) -> &[Populate] {
        &self.populate
    }
}

/// Shapes a base [`Query`] from list parameters
///
/// The stages are `filter`, `sort`, `project_fields` and `paginate`. Each
/// consumes the builder and returns a new one; [`apply_all`](Self::apply_all)
/// runs them in that order. No stage performs I/O or can fail.
///
/// # Example
///
/// ```rust
/// use tourbook_service::query::{ListParams, Query, QueryBuilder, SortKey};
///
/// let params = ListParams::from_query_str("sort=-price,name&page=2&limit=10");
/// let query = QueryBuilder::new(Query::find("tours"), &params).apply_all();
///
/// assert_eq!(
///     query.sort_keys(),
///     &[SortKey::descending("price"), SortKey::ascending("name")]
/// );
/// assert_eq!(query.skip_count(), 10);
/// assert_eq!(query.limit_count(), Some(10));
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder<'p> {
    query: Query,
    params: &'p ListParams,
    max_limit: Option<u64>,
}

impl<'p> QueryBuilder<'p> {
    pub fn new(query: Query, params: &'p ListParams) -> Self {
        Self {
            query,
            params,
            max_limit: None,
        }
    }

    /// Clamp page sizes to `max_limit` when set
    #[must_use]
    pub fn with_max_limit(mut self, max_limit: Option<u64>) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Merge the filter parameters into the predicate
    #[must_use]
    pub fn filter(self) -> Self {
        let predicate = Predicate::from_filter(&self.params.filter);
        Self {
            query: self.query.filter(predicate),
            ..self
        }
    }

    /// Order by `sort`, or newest first
    #[must_use]
    pub fn sort(self) -> Self {
        let keys = self
            .params
            .sort
            .as_deref()
            .map(SortKey::parse_list)
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| vec![SortKey::descending(DEFAULT_SORT_FIELD)]);
        Self {
            query: self.query.sort(keys),
            ..self
        }
    }

    /// Select `fields`, or everything but the revision counter
    #[must_use]
    pub fn project_fields(self) -> Self {
        let projection = self
            .params
            .fields
            .as_deref()
            .and_then(Projection::parse)
            .unwrap_or_else(Projection::without_version);
        Self {
            query: self.query.select(projection),
            ..self
        }
    }

    /// Window the results by `page` and `limit`
    #[must_use]
    pub fn paginate(self) -> Self {
        let mut limit = self.params.items_per_page();
        if let Some(max) = self.max_limit {
            limit = limit.min(max.max(1));
        }
        let skip = (self.params.page_number() - 1).saturating_mul(limit);
        Self {
            query: self.query.skip(skip).limit(limit),
            ..self
        }
    }

    /// Run filter, sort, project_fields and paginate, in that order
    pub fn apply_all(self) -> Query {
        self.filter().sort().project_fields().paginate().build()
    }

    pub fn build(self) -> Query {
        self.query
    }
}
