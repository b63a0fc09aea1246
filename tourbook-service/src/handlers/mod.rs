//! Generic REST handlers for document collections
//!
//! [`ResourceHandlers`] implements list, get, create, update and delete for
//! any collection described by a [`ResourceDescriptor`]; [`ResourceRoutes`]
//! mounts them on an axum router. Responses use the [`ResponseEnvelope`]
//! shape and failures are [`ApiError`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use axum::Router;
//! use tourbook_service::handlers::{ResourceDescriptor, ResourceHandlers, ResourceRoutes};
//! use tourbook_service::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let tours = ResourceHandlers::new(store.clone(), ResourceDescriptor::new("tours", "tour"));
//! let reviews = ResourceHandlers::new(
//!     store,
//!     ResourceDescriptor::new("reviews", "review").nested_under("tourId", "tour"),
//! );
//!
//! let app: Router = Router::new()
//!     .nest("/api/v1/tours", ResourceRoutes::new(tours).into_router())
//!     .nest("/api/v1/tours/{tourId}/reviews", ResourceRoutes::new(reviews).into_router());
//! ```

mod descriptor;
mod envelope;
mod error;
mod factory;
mod routes;

pub use descriptor::{ParentScope, ResourceDescriptor};
pub use envelope::{ApiResponse, EnvelopeStatus, ErrorDetails, ResponseEnvelope};
pub use error::{ApiError, ApiErrorKind, ApiOperation, Surface, GENERIC_ERROR_MESSAGE};
pub use factory::ResourceHandlers;
pub use routes::{route_not_found, ResourceRoutes, DEFAULT_ID_PARAM};
