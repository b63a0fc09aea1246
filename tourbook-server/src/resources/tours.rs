//! Tours: the catalogue, its alias route and the reviews nested below it

use axum::{
    extract::{RawQuery, State},
    routing::get,
    Router,
};
use tourbook_service::prelude::*;

use super::{reviews, users};

pub const COLLECTION: &str = "tours";

/// Path parameter naming a tour, shared with the nested review routes
pub const ID_PARAM: &str = "tourId";

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(COLLECTION, "tour")
}

pub fn schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION)
        .field(
            FieldSpec::text("name")
                .required("A tour must have a name")
                .trim()
                .min_length(10, "A tour name must have at least 10 characters")
                .max_length(40, "A tour name must have less or equal then 40 characters"),
        )
        .field(FieldSpec::text("slug").slug_of("name"))
        .field(FieldSpec::number("duration").required("A tour must have a duration"))
        .field(FieldSpec::number("maxGroupSize").required("A tour must have a group size"))
        .field(
            FieldSpec::text("difficulty")
                .required("A tour must have a difficulty")
                .one_of(
                    ["easy", "medium", "difficult"],
                    "Difficulty is either: easy, medium, difficult",
                ),
        )
        .field(
            FieldSpec::number("ratingsAverage")
                .default_value(4.5)
                .min(1.0, "Rating must be above 1.0")
                .max(5.0, "Rating must be below 5.0")
                .round_to(1),
        )
        .field(FieldSpec::number("ratingsQuantity").default_value(0))
        .field(FieldSpec::number("price").required("Price must have a value"))
        .field(
            FieldSpec::number("discount")
                .below_field("price", "Discount price ({VALUE}) should be below regular price"),
        )
        .field(
            FieldSpec::text("summary")
                .required("A tour must have a summary")
                .trim(),
        )
        .field(FieldSpec::text("description").trim())
        .field(FieldSpec::text("imageCover").required("A tour must have a cover image"))
        .field(FieldSpec::any("images"))
        .field(FieldSpec::any("startDates"))
        .field(FieldSpec::any("startLocation"))
        .field(FieldSpec::any("locations"))
        .field(FieldSpec::any("guides"))
        .field(FieldSpec::boolean("secretTour").default_value(false))
        .field(FieldSpec::timestamp("createdAt").default_now().hidden())
        .unique(["name"])
        .computed(Computed::quotient("durationWeeks", "duration", 7.0))
        .scope(Predicate::new().compare("secretTour", CompareOp::Ne, true))
        .populate(
            Populate::reference("guides", users::COLLECTION)
                .with_select(Projection::exclude(["__v", "passwordChangedAt"])),
        )
}

/// `/api/v1/tours`, including `/top-5-cheap` and `/{tourId}/reviews`
pub fn routes(store: MemoryStore, query: &QueryConfig) -> Router {
    let handlers = ResourceHandlers::new(store.clone(), descriptor())
        .with_populate(Populate::virtual_field("reviews", reviews::COLLECTION, "tour"))
        .with_query_config(query);

    Router::new()
        .route("/top-5-cheap", get(top_five_cheap))
        .with_state(handlers.clone())
        .merge(
            ResourceRoutes::new(handlers)
                .with_id_param(ID_PARAM)
                .into_router(),
        )
        .nest(
            &format!("/{{{ID_PARAM}}}/reviews"),
            reviews::routes(store, query),
        )
}

async fn top_five_cheap(
    State(handlers): State<ResourceHandlers<MemoryStore>>,
    RawQuery(raw): RawQuery,
) -> std::result::Result<ApiResponse, ApiError> {
    let params = ListParams::from_query_str(raw.as_deref().unwrap_or_default());
    handlers
        .list(&ListPreset::TOP_FIVE_CHEAP.apply(params), None)
        .await
}
