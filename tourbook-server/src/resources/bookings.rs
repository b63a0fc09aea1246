//! Bookings, shown with their user and the tour name

use axum::Router;
use tourbook_service::prelude::*;

use super::{tours, users};

pub const COLLECTION: &str = "bookings";

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(COLLECTION, "booking")
}

pub fn schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION)
        .field(FieldSpec::text("tour").required("Booking must belong to a Tour!"))
        .field(FieldSpec::text("user").required("Booking must belong to a User!"))
        .field(FieldSpec::number("price").required("Booking must have a price."))
        .field(FieldSpec::timestamp("createdAt").default_now())
        .field(FieldSpec::boolean("paid").default_value(true))
        .populate(Populate::reference("user", users::COLLECTION))
        .populate(
            Populate::reference("tour", tours::COLLECTION)
                .with_select(Projection::include(["name"])),
        )
}

/// `/api/v1/bookings`
pub fn routes(store: MemoryStore, query: &QueryConfig) -> Router {
    let handlers = ResourceHandlers::new(store, descriptor()).with_query_config(query);
    ResourceRoutes::new(handlers).into_router()
}
