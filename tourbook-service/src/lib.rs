//! # tourbook-service
//!
//! Query shaping and generic resource handlers for JSON document APIs.
//!
//! ## Features
//!
//! - **Query shaping**: filter, sort, field selection and pagination from
//!   query-string parameters (`duration[gte]=5&sort=-price&page=2`)
//! - **Resource handlers**: list, get, create, update and delete for any
//!   collection with one envelope and one error shape
//! - **Document store seam**: the [`DocumentStore`](store::DocumentStore)
//!   trait plus an in-memory implementation with schemas, unique indexes,
//!   default scopes and population of related documents
//! - **Error funnel**: every error response rendered for the deployment
//!   posture, JSON for the API and HTML for pages
//! - **Middleware stack**: per-IP rate limiting, security headers, request
//!   ids, panic recovery, body limits, timeouts
//! - **Graceful shutdown**: Proper signal handling (SIGTERM, SIGINT)
//!
//! ## Example
//!
//! ```rust,no_run
//! use tourbook_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let store = MemoryStore::new();
//!     let tours = ResourceHandlers::new(store, ResourceDescriptor::new("tours", "tour"))
//!         .with_max_limit(config.query.max_limit);
//!
//!     let app = Router::new().nest("/api/v1/tours", ResourceRoutes::new(tours).into_router());
//!
//!     Server::new(config).serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod middleware;
pub mod observability;
pub mod query;
pub mod server;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        Config, CorsMode, Environment, MiddlewareConfig, QueryConfig, RateLimitConfig,
        SecurityHeadersConfig, ServiceConfig, StoreConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        route_not_found, ApiError, ApiErrorKind, ApiOperation, ApiResponse, EnvelopeStatus,
        ResourceDescriptor, ResourceHandlers, ResourceRoutes, ResponseEnvelope, Surface,
    };
    pub use crate::ids::{DocumentId, MakeTypedRequestId, RequestId};
    pub use crate::observability::init_tracing;
    pub use crate::query::{
        CompareOp, ListParams, ListPreset, Populate, Predicate, Projection, Query, QueryBuilder,
        SortKey,
    };
    pub use crate::server::Server;
    pub use crate::store::{
        CollectionSchema, Computed, Document, DocumentStore, FieldSpec, Rollup, Rule, StoreError,
        StoreResult, UpdateOptions,
    };

    #[cfg(feature = "memory-store")]
    pub use crate::store::MemoryStore;

    pub use axum::{
        extract::{Path, Query as QueryParams, State},
        response::{IntoResponse, Json, Response},
        routing::{delete, get, patch, post},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use tokio;
    pub use tracing::{debug, error, info, instrument, trace, warn};
}
