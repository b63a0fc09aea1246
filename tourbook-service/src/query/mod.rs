//! Query shaping for list endpoints
//!
//! A list request goes through four stages, always in the same order:
//!
//! 1. **filter** turns the non-reserved parameters into a predicate,
//!    renaming `gte`/`gt`/`lte`/`lt` sub-keys to store operators
//! 2. **sort** applies the `sort` parameter or newest-first
//! 3. **project_fields** applies `fields` or hides the revision counter
//! 4. **paginate** windows the results with `page` and `limit`
//!
//! ```rust
//! use serde_json::json;
//! use tourbook_service::query::{ListParams, Projection, Query, QueryBuilder};
//!
//! let params = ListParams::from_query_str(
//!     "difficulty=easy&duration[gte]=5&fields=name,price&page=2&limit=10",
//! );
//! let query = QueryBuilder::new(Query::find("tours"), &params).apply_all();
//!
//! assert_eq!(
//!     query.predicate().clone().into_value(),
//!     json!({"difficulty": "easy", "duration": {"$gte": "5"}})
//! );
//! assert_eq!(query.projection(), &Projection::include(["name", "price"]));
//! assert_eq!((query.skip_count(), query.limit_count()), (10, Some(10)));
//! ```

mod builder;
mod params;
mod predicate;
mod shape;

pub use builder::{Query, QueryBuilder};
pub use params::{
    ListParams, ListPreset, ParamValue, ParameterMap, DEFAULT_LIMIT, DEFAULT_PAGE, RESERVED_KEYS,
};
pub(crate) use params::is_unsafe_key;
pub use predicate::{is_operator_map, CompareOp, Predicate};
pub use shape::{
    Populate, Projection, Relation, SortDirection, SortKey, DEFAULT_SORT_FIELD, ID_FIELD,
    VERSION_FIELD,
};
