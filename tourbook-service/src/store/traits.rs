//! Document store trait
//!
//! The trait uses RPITIT (return-position `impl Trait` in traits) so store
//! implementations are plain `async fn`s without boxing.
//!
//! # Example
//!
//! ```rust,ignore
//! use tourbook_service::query::Query;
//! use tourbook_service::store::{Document, DocumentStore, StoreResult};
//!
//! struct RemoteStore { client: Client }
//!
//! impl DocumentStore for RemoteStore {
//!     async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
//!         self.client.find(query.collection(), query.predicate()).await
//!     }
//!     // ... other methods
//! }
//! ```

use std::future::Future;

use serde_json::{Map, Value};

use super::error::StoreResult;
use crate::query::{Populate, Query};

/// A stored record: a JSON object with `_id` and `__v`
pub type Document = Map<String, Value>;

/// Options for [`DocumentStore::find_by_id_and_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Return the document as it is after the update
    pub return_new: bool,
    /// Validate the updated fields with the collection's schema
    pub run_validators: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            return_new: true,
            run_validators: true,
        }
    }
}

/// Collection-oriented document store
///
/// Every method is a single round trip. `Ok(None)` means no document
/// matched; `Err` means the store could not answer.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Execute a shaped query
    fn find(&self, query: &Query) -> impl Future<Output = StoreResult<Vec<Document>>> + Send;

    /// Look up one document, expanding `populate` inline
    fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        populate: &[Populate],
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Insert a new document and return it as stored
    fn create(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = StoreResult<Document>> + Send;

    /// Apply `patch` to the top-level fields of one document
    fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        options: UpdateOptions,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;

    /// Remove one document and return it
    fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = StoreResult<Option<Document>>> + Send;
}
