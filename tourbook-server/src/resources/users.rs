//! Users. Accounts are created through sign-up, so `POST /` only explains
//! where to go.

use axum::{routing::post, Router};
use tourbook_service::prelude::*;

pub const COLLECTION: &str = "users";

const CREATE_NOT_SUPPORTED: &str = "This route is not defined! Please use /signup instead.";

pub fn descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new(COLLECTION, "user")
}

pub fn schema() -> CollectionSchema {
    CollectionSchema::new(COLLECTION)
        .field(
            FieldSpec::text("name")
                .required("A user must have a name")
                .trim(),
        )
        .field(
            FieldSpec::text("email")
                .required("A user must have an email")
                .trim()
                .email("Please provide a valid email"),
        )
        .field(FieldSpec::text("photo").default_value("default.jpg"))
        .field(
            FieldSpec::text("role")
                .default_value("user")
                .one_of(
                    ["user", "guide", "lead-guide", "admin"],
                    "Role is either: user, guide, lead-guide, admin",
                ),
        )
        .field(
            FieldSpec::text("password")
                .required("A user must have a password of at least 8 characters")
                .min_length(8, "A user must have a password of at least 8 characters")
                .hidden(),
        )
        .field(FieldSpec::timestamp("passwordChangedAt"))
        .field(FieldSpec::boolean("active").default_value(true).hidden())
        .unique(["email"])
        .scope(Predicate::new().compare("active", CompareOp::Ne, false))
}

/// `/api/v1/users`
pub fn routes(store: MemoryStore, query: &QueryConfig) -> Router {
    let handlers = ResourceHandlers::new(store, descriptor()).with_query_config(query);
    ResourceRoutes::new(handlers)
        .exclude(ApiOperation::CreateOne)
        .into_router()
        .route("/", post(create_user))
}

async fn create_user() -> ApiError {
    ApiError::new(
        ApiOperation::CreateOne,
        ApiErrorKind::NotImplemented,
        CREATE_NOT_SUPPORTED,
    )
}
