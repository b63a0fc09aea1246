//! Generic CRUD handlers for one document collection
//!
//! Every resource gets the same five operations with the same envelope and
//! error shapes. The only per-resource inputs are a [`ResourceDescriptor`]
//! and, for `get_one`, an optional populate spec.

use std::sync::Arc;

use serde_json::Value;

use super::descriptor::{ParentScope, ResourceDescriptor};
use super::envelope::{ApiResponse, ResponseEnvelope};
use super::error::{ApiError, ApiErrorKind, ApiOperation};
use crate::ids::DocumentId;
use crate::config::QueryConfig;
use crate::query::{is_unsafe_key, ListParams, Populate, Predicate, Query, QueryBuilder};
use crate::store::{Document, DocumentStore, UpdateOptions};

/// Handlers bound to one store and one resource
///
/// Cloning is cheap; the descriptor and populate spec are shared.
#[derive(Debug, Clone)]
pub struct ResourceHandlers<S> {
    store: S,
    descriptor: Arc<ResourceDescriptor>,
    populate: Arc<[Populate]>,
    max_limit: Option<u64>,
    /// Filter keys allowed to repeat; `None` leaves every repeated key a list
    repeatable: Option<Arc<[String]>>,
}

impl<S: DocumentStore> ResourceHandlers<S> {
    pub fn new(store: S, descriptor: ResourceDescriptor) -> Self {
        Self {
            store,
            descriptor: Arc::new(descriptor),
            populate: Arc::from(Vec::new()),
            max_limit: None,
            repeatable: None,
        }
    }

    /// Expand `populate` when reading a single document
    #[must_use]
    pub fn with_populate(mut self, populate: Populate) -> Self {
        let mut all = self.populate.to_vec();
        all.push(populate);
        self.populate = Arc::from(all);
        self
    }

    #[must_use]
    pub fn with_max_limit(mut self, max_limit: Option<u64>) -> Self {
        self.max_limit = max_limit;
        self
    }

    /// Collapse repeated filter keys outside `keys` to their last value
    #[must_use]
    pub fn with_repeatable<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.repeatable = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Page size bound and repeatable keys from configuration
    #[must_use]
    pub fn with_query_config(self, config: &QueryConfig) -> Self {
        self.with_max_limit(config.max_limit)
            .with_repeatable(config.repeatable_params.iter().cloned())
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `GET /`: filtered, sorted, projected and paginated documents
    pub async fn list(
        &self,
        params: &ListParams,
        parent: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut base = Query::find(&self.descriptor.collection);
        if let Some((scope, id)) = self.parent_id(ApiOperation::List, parent)? {
            base = base.filter(Predicate::new().field(&scope.field, id.to_string()));
        }

        let collapsed;
        let params = match &self.repeatable {
            Some(keys) => {
                collapsed = params.clone().collapse_repeated(&**keys);
                &collapsed
            }
            None => params,
        };

        let query = QueryBuilder::new(base, params)
            .with_max_limit(self.max_limit)
            .apply_all();
        tracing::debug!(
            collection = %self.descriptor.collection,
            skip = query.skip_count(),
            limit = ?query.limit_count(),
            "Listing documents"
        );

        let documents = self
            .store
            .find(&query)
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::List))?;

        Ok(ApiResponse::ok(ResponseEnvelope::list(
            self.descriptor.plural_label(),
            documents,
        )))
    }

    /// `GET /{id}`
    pub async fn get_one(&self, id: &str) -> Result<ApiResponse, ApiError> {
        let document = self
            .store
            .find_by_id(&self.descriptor.collection, id, &self.populate)
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::GetOne))?
            .ok_or_else(|| self.not_found(ApiOperation::GetOne, id))?;

        Ok(ApiResponse::ok(self.item(document)))
    }

    /// `POST /`: fills the parent field from the route when the body omits it
    pub async fn create_one(
        &self,
        body: Value,
        parent: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut document = into_document(ApiOperation::CreateOne, body)?;
        if let Some((scope, id)) = self.parent_id(ApiOperation::CreateOne, parent)? {
            document
                .entry(scope.field.clone())
                .or_insert_with(|| Value::String(id.into()));
        }

        let created = self
            .store
            .create(&self.descriptor.collection, document)
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::CreateOne))?;

        tracing::debug!(collection = %self.descriptor.collection, "Created document");
        Ok(ApiResponse::created(self.item(created)))
    }

    /// `PATCH /{id}`: validated partial update, answers with the new document
    pub async fn update_one(&self, id: &str, body: Value) -> Result<ApiResponse, ApiError> {
        let patch = into_document(ApiOperation::UpdateOne, body)?;

        let updated = self
            .store
            .find_by_id_and_update(
                &self.descriptor.collection,
                id,
                patch,
                UpdateOptions::default(),
            )
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::UpdateOne))?
            .ok_or_else(|| self.not_found(ApiOperation::UpdateOne, id))?;

        Ok(ApiResponse::ok(self.item(updated)))
    }

    /// `DELETE /{id}`: 204 with no body
    pub async fn delete_one(&self, id: &str) -> Result<ApiResponse, ApiError> {
        self.store
            .find_by_id_and_delete(&self.descriptor.collection, id)
            .await
            .map_err(|e| ApiError::from(e).with_operation(ApiOperation::DeleteOne))?
            .ok_or_else(|| self.not_found(ApiOperation::DeleteOne, id))?;

        tracing::debug!(collection = %self.descriptor.collection, id, "Deleted document");
        Ok(ApiResponse::no_content())
    }

    fn item(&self, document: Document) -> ResponseEnvelope {
        ResponseEnvelope::item(&self.descriptor.label, document)
    }

    fn not_found(&self, operation: ApiOperation, id: &str) -> ApiError {
        ApiError::not_found(operation, &self.descriptor.label, id)
    }

    /// The validated parent id when mounted nested and the route carried one
    fn parent_id(
        &self,
        operation: ApiOperation,
        parent: Option<&str>,
    ) -> Result<Option<(&ParentScope, DocumentId)>, ApiError> {
        let (Some(scope), Some(raw)) = (self.descriptor.parent.as_ref(), parent) else {
            return Ok(None);
        };
        let id = DocumentId::parse(raw).ok_or_else(|| {
            ApiError::new(
                operation,
                ApiErrorKind::InvalidValue,
                format!("Invalid {}: {raw}", scope.field),
            )
        })?;
        Ok(Some((scope, id)))
    }
}

/// Strip keys that could smuggle store operators or paths into a write
fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !is_unsafe_key(key))
                .map(|(key, value)| (key, sanitize(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

fn into_document(operation: ApiOperation, body: Value) -> Result<Document, ApiError> {
    match sanitize(body) {
        Value::Object(document) => Ok(document),
        _ => Err(ApiError::bad_request(
            operation,
            "Request body must be a JSON object",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionSchema, FieldSpec, MemoryStore};
    use axum::http::StatusCode;
    use serde_json::json;

    fn tours() -> ResourceHandlers<MemoryStore> {
        let schema = CollectionSchema::new("tours")
            .field(FieldSpec::text("name").required("A tour must have a name"))
            .field(FieldSpec::number("price"))
            .unique(["name"]);
        ResourceHandlers::new(
            MemoryStore::with_schemas([schema]),
            ResourceDescriptor::new("tours", "tour"),
        )
    }

    fn reviews(store: MemoryStore) -> ResourceHandlers<MemoryStore> {
        ResourceHandlers::new(
            store,
            ResourceDescriptor::new("reviews", "review").nested_under("tourId", "tour"),
        )
    }

    fn envelope(response: ApiResponse) -> Value {
        serde_json::to_value(response.envelope.unwrap()).unwrap()
    }

    const TOUR_ID: &str = "5c88fa8cf4afda39709c2951";

    #[tokio::test]
    async fn test_create_then_get() {
        let handlers = tours();
        let created = handlers
            .create_one(json!({"name": "The Forest Hiker", "price": 397}), None)
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        let body = envelope(created);
        assert_eq!(body["status"], "success");
        let id = body["data"]["tour"]["_id"].as_str().unwrap().to_string();

        let fetched = envelope(handlers.get_one(&id).await.unwrap());
        assert_eq!(fetched["data"]["tour"]["name"], "The Forest Hiker");
        assert!(fetched.get("results").is_none());
    }

    #[tokio::test]
    async fn test_empty_list_is_success() {
        let body = envelope(tours().list(&ListParams::default(), None).await.unwrap());
        assert_eq!(body, json!({"status": "success", "results": 0, "data": {"tours": []}}));
    }

    #[tokio::test]
    async fn test_list_applies_query_shaping() {
        let handlers = tours();
        for (name, price) in [("a", 100), ("b", 300), ("c", 200)] {
            handlers
                .create_one(json!({"name": name, "price": price}), None)
                .await
                .unwrap();
        }
        let params = ListParams::from_query_str("price[gte]=150&sort=price&fields=name");
        let body = envelope(handlers.list(&params, None).await.unwrap());
        assert_eq!(body["results"], 2);
        let names: Vec<_> = body["data"]["tours"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["c", "b"]);
        assert!(body["data"]["tours"][0].get("price").is_none());
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let handlers = tours();
        for err in [
            handlers.get_one(TOUR_ID).await.unwrap_err(),
            handlers.update_one(TOUR_ID, json!({"price": 1})).await.unwrap_err(),
            handlers.delete_one(TOUR_ID).await.unwrap_err(),
        ] {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
            assert_eq!(err.status_text(), "fail");
            assert_eq!(err.message, "No tour document found with that ID");
        }
    }

    #[tokio::test]
    async fn test_malformed_id_is_bad_request() {
        let err = tours().get_one("wwwwwwwwwwww").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid _id: wwwwwwwwwwww");
        assert_eq!(err.operation, ApiOperation::GetOne);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let handlers = tours();
        let body = envelope(
            handlers
                .create_one(json!({"name": "The Sea Explorer", "price": 497}), None)
                .await
                .unwrap(),
        );
        let id = body["data"]["tour"]["_id"].as_str().unwrap().to_string();

        let updated = envelope(handlers.update_one(&id, json!({"price": 500})).await.unwrap());
        assert_eq!(updated["data"]["tour"]["price"], 500);

        let deleted = handlers.delete_one(&id).await.unwrap();
        assert_eq!(deleted.status, StatusCode::NO_CONTENT);
        assert!(deleted.envelope.is_none());
        assert!(handlers.get_one(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_validation_error_message() {
        let err = tours().create_one(json!({"price": 1}), None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid input data. A tour must have a name");
    }

    #[tokio::test]
    async fn test_body_is_sanitized() {
        let handlers = tours();
        let body = envelope(
            handlers
                .create_one(
                    json!({"name": "x", "$where": "1", "a.b": 1, "nested": {"$gt": 1, "ok": 2}}),
                    None,
                )
                .await
                .unwrap(),
        );
        let tour = &body["data"]["tour"];
        assert!(tour.get("$where").is_none());
        assert!(tour.get("a.b").is_none());
        assert_eq!(tour["nested"], json!({"ok": 2}));
    }

    #[tokio::test]
    async fn test_non_object_body_rejected() {
        let err = tours().create_one(json!([1, 2]), None).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_nested_create_fills_parent_and_list_is_scoped() {
        let handlers = reviews(MemoryStore::new());
        let other = "5c88fa8cf4afda39709c2955";
        handlers
            .create_one(json!({"review": "great"}), Some(TOUR_ID))
            .await
            .unwrap();
        handlers
            .create_one(json!({"review": "fine", "tour": other}), Some(TOUR_ID))
            .await
            .unwrap();

        let body = envelope(
            handlers
                .list(&ListParams::default(), Some(TOUR_ID))
                .await
                .unwrap(),
        );
        assert_eq!(body["results"], 1);
        assert_eq!(body["data"]["reviews"][0]["tour"], TOUR_ID);

        let all = envelope(handlers.list(&ListParams::default(), None).await.unwrap());
        assert_eq!(all["results"], 2);

        // the route parent wins over a filter parameter
        let params = ListParams::default().with_filter("tour", other);
        let scoped = envelope(handlers.list(&params, Some(TOUR_ID)).await.unwrap());
        assert_eq!(scoped["results"], 1);
    }

    #[tokio::test]
    async fn test_invalid_parent_id() {
        let err = reviews(MemoryStore::new())
            .list(&ListParams::default(), Some("nope"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid tour: nope");
    }

    #[tokio::test]
    async fn test_max_limit_clamps_page_size() {
        let handlers = tours().with_max_limit(Some(2));
        for name in ["a", "b", "c"] {
            handlers.create_one(json!({"name": name}), None).await.unwrap();
        }
        let params = ListParams::default().with_limit(50);
        let body = envelope(handlers.list(&params, None).await.unwrap());
        assert_eq!(body["results"], 2);
    }

    #[tokio::test]
    async fn test_repeated_filter_keys_follow_whitelist() {
        let handlers = tours();
        for (name, price) in [("a", 100), ("b", 200), ("c", 300)] {
            handlers
                .create_one(json!({"name": name, "price": price}), None)
                .await
                .unwrap();
        }
        let params = ListParams::from_query_str("name=a&name=b&price=100&price=300");

        let body = envelope(handlers.list(&params, None).await.unwrap());
        assert_eq!(body["results"], 1);

        // `name` collapses to its last value, `price` matches either value.
        let whitelisted = handlers.clone().with_query_config(&QueryConfig {
            max_limit: None,
            repeatable_params: vec!["price".into()],
        });
        let body = envelope(whitelisted.list(&params, None).await.unwrap());
        assert_eq!(body["results"], 0);

        let params = ListParams::from_query_str("name=c&name=a&price=100&price=300");
        let body = envelope(whitelisted.list(&params, None).await.unwrap());
        assert_eq!(body["results"], 1);
        assert_eq!(body["data"]["tours"][0]["name"], "a");
    }
}
