//! Route composition for the `/api/v1` surface

use axum::Router;
use tourbook_service::config::Config;
use tourbook_service::store::MemoryStore;

use crate::resources::{bookings, reviews, tours, users};

pub const API_PREFIX: &str = "/api/v1";

/// Every resource router, mounted under [`API_PREFIX`]
pub fn router(store: MemoryStore, config: &Config) -> Router {
    let query = &config.query;
    Router::new()
        .nest(
            &format!("{API_PREFIX}/tours"),
            tours::routes(store.clone(), query),
        )
        .nest(
            &format!("{API_PREFIX}/users"),
            users::routes(store.clone(), query),
        )
        .nest(
            &format!("{API_PREFIX}/reviews"),
            reviews::routes(store.clone(), query),
        )
        .nest(
            &format!("{API_PREFIX}/bookings"),
            bookings::routes(store, query),
        )
}
