//! Reviews, mounted flat and below their tour

use axum::Router;
use tourbook_service::prelude::*;

use super::{tours, users};

pub const COLLECTION: &str = "reviews";

/// Nested under a tour, lists only that tour's reviews and fills `tour` on
/// create
pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(COLLECTION, "review").nested_under(tours::ID_PARAM, "tour")
}

pub fn schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION)
        .field(FieldSpec::text("review").required("Review can not be empty"))
        .field(
            FieldSpec::number("rating")
                .min(1.0, "Review Rating must be above 1.0")
                .max(5.0, "Review Rating must be below 5.0"),
        )
        .field(FieldSpec::timestamp("createdAt").default_now())
        .field(FieldSpec::text("tour").required("Review must belong to a tour!"))
        .field(FieldSpec::text("user").required("Review must be written by a user!"))
        .unique(["tour", "user"])
        .rollup(
            Rollup::new("tour", "rating", tours::COLLECTION)
                .into_fields("ratingsQuantity", "ratingsAverage")
                .empty_average(4.5),
        )
        .populate(
            Populate::reference("user", users::COLLECTION)
                .with_select(Projection::include(["name", "photo"])),
        )
}

/// `/api/v1/reviews` and `/api/v1/tours/{tourId}/reviews`
pub fn routes(store: MemoryStore, query: &QueryConfig) -> Router {
    let handlers = ResourceHandlers::new(store, descriptor()).with_query_config(query);
    ResourceRoutes::new(handlers).into_router()
}
