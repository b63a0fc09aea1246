//! Mounting [`ResourceHandlers`] on an axum router

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, RawQuery, State},
    routing::MethodRouter,
    Json, Router,
};
use serde_json::Value;

use super::envelope::ApiResponse;
use super::error::{ApiError, ApiOperation};
use super::factory::ResourceHandlers;
use crate::query::ListParams;
use crate::store::DocumentStore;

type PathParams = Option<Path<HashMap<String, String>>>;
type JsonBody = Result<Json<Value>, JsonRejection>;

/// Path parameter holding the document id unless renamed
pub const DEFAULT_ID_PARAM: &str = "id";

/// Router state: the handlers plus the name of the id path parameter
struct RouteState<S> {
    handlers: ResourceHandlers<S>,
    id_param: Arc<str>,
}

impl<S: Clone> Clone for RouteState<S> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
            id_param: Arc::clone(&self.id_param),
        }
    }
}

/// The five CRUD routes for one resource
///
/// ```rust,ignore
/// let router = ResourceRoutes::new(users)
///     .exclude(ApiOperation::CreateOne)
///     .into_router()
///     .route("/", post(create_user_not_supported));
/// ```
///
/// A router that has children nested below its items must name the id
/// parameter the way the children name their parent, so both route sets
/// agree on the segment: tours mounted with `with_id_param("tourId")` can
/// carry reviews under `/{tourId}/reviews`.
pub struct ResourceRoutes<S> {
    handlers: ResourceHandlers<S>,
    excluded: Vec<ApiOperation>,
    id_param: String,
}

impl<S: DocumentStore> ResourceRoutes<S> {
    pub fn new(handlers: ResourceHandlers<S>) -> Self {
        Self {
            handlers,
            excluded: Vec::new(),
            id_param: DEFAULT_ID_PARAM.to_string(),
        }
    }

    /// Name of the path parameter carrying the document id
    #[must_use]
    pub fn with_id_param(mut self, name: impl Into<String>) -> Self {
        self.id_param = name.into();
        self
    }

    /// Leave `operation` unmounted so the caller can provide its own
    #[must_use]
    pub fn exclude(mut self, operation: ApiOperation) -> Self {
        self.excluded.push(operation);
        self
    }

    /// `GET /`, `POST /`, `GET /{id}`, `PATCH /{id}`, `DELETE /{id}`
    pub fn into_router(self) -> Router {
        let mounted = |op| !self.excluded.contains(&op);

        let mut collection: MethodRouter<RouteState<S>> = MethodRouter::new();
        if mounted(ApiOperation::List) {
            collection = collection.get(list::<S>);
        }
        if mounted(ApiOperation::CreateOne) {
            collection = collection.post(create_one::<S>);
        }

        let mut item: MethodRouter<RouteState<S>> = MethodRouter::new();
        if mounted(ApiOperation::GetOne) {
            item = item.get(get_one::<S>);
        }
        if mounted(ApiOperation::UpdateOne) {
            item = item.patch(update_one::<S>);
        }
        if mounted(ApiOperation::DeleteOne) {
            item = item.delete(delete_one::<S>);
        }

        let item_path = format!("/{{{}}}", self.id_param);
        let state = RouteState {
            handlers: self.handlers,
            id_param: Arc::from(self.id_param),
        };
        Router::new()
            .route("/", collection)
            .route(&item_path, item)
            .with_state(state)
    }
}

/// Fallback for unmatched routes
pub async fn route_not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::route_not_found(uri)
}

fn parent<'a, S: DocumentStore>(
    handlers: &ResourceHandlers<S>,
    params: &'a HashMap<String, String>,
) -> Option<&'a str> {
    let scope = handlers.descriptor().parent.as_ref()?;
    params.get(&scope.param).map(String::as_str)
}

fn path_params(path: PathParams) -> HashMap<String, String> {
    path.map(|Path(params)| params).unwrap_or_default()
}

fn document_id<'a>(state: &RouteState<impl DocumentStore>, params: &'a HashMap<String, String>) -> &'a str {
    params
        .get(&*state.id_param)
        .map(String::as_str)
        .unwrap_or_default()
}

async fn list<S: DocumentStore>(
    State(state): State<RouteState<S>>,
    path: PathParams,
    RawQuery(raw): RawQuery,
) -> Result<ApiResponse, ApiError> {
    let params = path_params(path);
    let list_params = ListParams::from_query_str(raw.as_deref().unwrap_or_default());
    state
        .handlers
        .list(&list_params, parent(&state.handlers, &params))
        .await
}

async fn get_one<S: DocumentStore>(
    State(state): State<RouteState<S>>,
    path: PathParams,
) -> Result<ApiResponse, ApiError> {
    let params = path_params(path);
    state.handlers.get_one(document_id(&state, &params)).await
}

async fn create_one<S: DocumentStore>(
    State(state): State<RouteState<S>>,
    path: PathParams,
    body: JsonBody,
) -> Result<ApiResponse, ApiError> {
    let Json(body) = body.map_err(|r| ApiError::from_rejection(ApiOperation::CreateOne, &r))?;
    let params = path_params(path);
    state
        .handlers
        .create_one(body, parent(&state.handlers, &params))
        .await
}

async fn update_one<S: DocumentStore>(
    State(state): State<RouteState<S>>,
    path: PathParams,
    body: JsonBody,
) -> Result<ApiResponse, ApiError> {
    let Json(body) = body.map_err(|r| ApiError::from_rejection(ApiOperation::UpdateOne, &r))?;
    let params = path_params(path);
    state
        .handlers
        .update_one(document_id(&state, &params), body)
        .await
}

async fn delete_one<S: DocumentStore>(
    State(state): State<RouteState<S>>,
    path: PathParams,
) -> Result<ApiResponse, ApiError> {
    let params = path_params(path);
    state.handlers.delete_one(document_id(&state, &params)).await
}
