//! Document store seam
//!
//! [`DocumentStore`] is the narrow interface the handlers talk to: find a
//! shaped [`Query`](crate::query::Query), look up, create, update and
//! delete by id. [`MemoryStore`] implements it in process, with
//! [`CollectionSchema`] supplying casting, validation, unique indexes,
//! default scopes, default population, computed fields and rollups per
//! collection.

mod error;
#[cfg(feature = "memory-store")]
mod eval;
#[cfg(feature = "memory-store")]
mod memory;
mod schema;
mod traits;

pub use error::{StoreError, StoreErrorKind, StoreOperation, StoreResult};
#[cfg(feature = "memory-store")]
pub use memory::MemoryStore;
pub use schema::{
    CastFailure, CollectionSchema, Computed, FieldDefault, FieldKind, FieldSpec, Rollup, Rule,
};
pub use traits::{Document, DocumentStore, UpdateOptions};
