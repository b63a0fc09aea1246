//! Request-level errors and how they are rendered
//!
//! Handlers return `Result<ApiResponse, ApiError>`. An `ApiError` turns into
//! a production-safe JSON response and rides along in the response
//! extensions, so the [error funnel](crate::middleware::error_funnel) can
//! re-render it for the configured [`Environment`] and the request's
//! [`Surface`].

use std::fmt;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use super::envelope::{EnvelopeStatus, ErrorDetails, ResponseEnvelope};
use crate::config::Environment;
use crate::store::{StoreError, StoreErrorKind, StoreOperation};

/// Message shown in production for infrastructure failures
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong...";

const PAGE_TITLE: &str = "Something went wrong!";
const PAGE_GENERIC_MESSAGE: &str = "Please try again later.";
const API_PREFIX: &str = "/api";

/// Handler operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    List,
    GetOne,
    CreateOne,
    UpdateOne,
    DeleteOne,
    /// Routing, middleware and anything outside a resource handler
    Route,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::GetOne => write!(f, "get_one"),
            Self::CreateOne => write!(f, "create_one"),
            Self::UpdateOne => write!(f, "update_one"),
            Self::DeleteOne => write!(f, "delete_one"),
            Self::Route => write!(f, "route"),
        }
    }
}

impl From<StoreOperation> for ApiOperation {
    fn from(op: StoreOperation) -> Self {
        match op {
            StoreOperation::Find => Self::List,
            StoreOperation::FindById => Self::GetOne,
            StoreOperation::Create | StoreOperation::Import => Self::CreateOne,
            StoreOperation::FindByIdAndUpdate => Self::UpdateOne,
            StoreOperation::FindByIdAndDelete => Self::DeleteOne,
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    NotFound,
    BadRequest,
    /// A value could not be cast, e.g. a malformed id
    InvalidValue,
    DuplicateValue,
    ValidationFailed,
    MethodNotAllowed,
    RequestTimeout,
    PayloadTooLarge,
    UnsupportedMediaType,
    TooManyRequests,
    /// The route exists but deliberately does nothing
    NotImplemented,
    InternalError,
    ServiceUnavailable,
}

impl ApiErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest
            | Self::InvalidValue
            | Self::DuplicateValue
            | Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::NotImplemented | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Operational errors are expected outcomes whose message is safe to show
    pub fn is_operational(self) -> bool {
        !matches!(self, Self::InternalError | Self::ServiceUnavailable)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::InvalidValue => "invalid_value",
            Self::DuplicateValue => "duplicate_value",
            Self::ValidationFailed => "validation_failed",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RequestTimeout => "request_timeout",
            Self::PayloadTooLarge => "payload_too_large",
            Self::UnsupportedMediaType => "unsupported_media_type",
            Self::TooManyRequests => "too_many_requests",
            Self::NotImplemented => "not_implemented",
            Self::InternalError => "internal_error",
            Self::ServiceUnavailable => "service_unavailable",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking: a JSON client or a browser page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Api,
    Page,
}

impl Surface {
    /// Everything under `/api` is the JSON surface
    pub fn for_path(path: &str) -> Self {
        let under_api = path
            .strip_prefix(API_PREFIX)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if under_api {
            Self::Api
        } else {
            Self::Page
        }
    }
}

/// A failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub operation: ApiOperation,
    pub kind: ApiErrorKind,
    /// Client-facing message
    pub message: String,
    status: StatusCode,
    operational: bool,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Underlying cause, never shown in production
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            status: kind.status_code(),
            operational: kind.is_operational(),
            entity_type: None,
            entity_id: None,
            detail: None,
        }
    }

    /// `No {label} document found with that ID`
    pub fn not_found(operation: ApiOperation, label: &str, id: impl Into<String>) -> Self {
        Self::new(
            operation,
            ApiErrorKind::NotFound,
            format!("No {label} document found with that ID"),
        )
        .with_entity(label, id)
    }

    pub fn bad_request(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::new(operation, ApiErrorKind::BadRequest, message)
    }

    /// Non-operational failure; `detail` is logged and shown only in development
    pub fn internal(operation: ApiOperation, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            detail: Some(detail.clone()),
            ..Self::new(operation, ApiErrorKind::InternalError, detail)
        }
    }

    /// Catch-all for unmatched routes
    pub fn route_not_found(uri: impl fmt::Display) -> Self {
        Self::new(
            ApiOperation::Route,
            ApiErrorKind::NotFound,
            format!("Route {uri} not found!"),
        )
    }

    /// Wrap an error response produced without an `ApiError`, keeping its
    /// status code
    pub fn from_status(status: StatusCode) -> Self {
        let kind = match status {
            StatusCode::NOT_FOUND => ApiErrorKind::NotFound,
            StatusCode::METHOD_NOT_ALLOWED => ApiErrorKind::MethodNotAllowed,
            StatusCode::REQUEST_TIMEOUT => ApiErrorKind::RequestTimeout,
            StatusCode::PAYLOAD_TOO_LARGE => ApiErrorKind::PayloadTooLarge,
            StatusCode::UNSUPPORTED_MEDIA_TYPE => ApiErrorKind::UnsupportedMediaType,
            StatusCode::TOO_MANY_REQUESTS => ApiErrorKind::TooManyRequests,
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                ApiErrorKind::ServiceUnavailable
            }
            s if s.is_client_error() => ApiErrorKind::BadRequest,
            _ => ApiErrorKind::InternalError,
        };
        let message = status
            .canonical_reason()
            .unwrap_or("Unexpected error")
            .to_string();
        Self {
            status,
            ..Self::new(ApiOperation::Route, kind, message)
        }
    }

    /// A request body that could not be read as JSON
    pub fn from_rejection(operation: ApiOperation, rejection: &JsonRejection) -> Self {
        let kind = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiErrorKind::PayloadTooLarge
        } else {
            ApiErrorKind::BadRequest
        };
        Self::new(operation, kind, rejection.body_text())
    }

    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// `fail` for 4xx, `error` otherwise
    pub fn status_text(&self) -> &'static str {
        self.envelope_status().as_str()
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    fn envelope_status(&self) -> EnvelopeStatus {
        if self.status.is_client_error() {
            EnvelopeStatus::Fail
        } else {
            EnvelopeStatus::Error
        }
    }

    /// The envelope for a JSON client
    pub fn envelope(&self, environment: Environment) -> ResponseEnvelope {
        match environment {
            Environment::Development => ResponseEnvelope {
                error: Some(self.details()),
                stack: Some(self.trace()),
                ..ResponseEnvelope::failure(self.envelope_status(), &self.message)
            },
            Environment::Production if self.operational => {
                ResponseEnvelope::failure(self.envelope_status(), &self.message)
            }
            Environment::Production => {
                ResponseEnvelope::failure(EnvelopeStatus::Error, GENERIC_ERROR_MESSAGE)
            }
        }
    }

    /// Status sent to the client; production collapses every
    /// infrastructure failure to 500
    pub fn response_status(&self, environment: Environment) -> StatusCode {
        if environment.is_production() && !self.operational {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            self.status
        }
    }

    /// Render for the given posture and surface
    pub fn render(&self, environment: Environment, surface: Surface) -> Response {
        let status = self.response_status(environment);
        match surface {
            Surface::Api => (status, Json(self.envelope(environment))).into_response(),
            Surface::Page => (status, Html(self.page(environment))).into_response(),
        }
    }

    fn page(&self, environment: Environment) -> String {
        let message = if self.operational || !environment.is_production() {
            self.message.as_str()
        } else {
            PAGE_GENERIC_MESSAGE
        };
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n\
             <h1>{title}</h1>\n<p>{message}</p>\n</body>\n</html>\n",
            title = PAGE_TITLE,
            message = escape_html(message),
        )
    }

    fn details(&self) -> ErrorDetails {
        ErrorDetails {
            status_code: self.status.as_u16(),
            kind: self.kind.to_string(),
            operation: self.operation.to_string(),
            is_operational: self.operational,
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
        }
    }

    fn trace(&self) -> String {
        let mut trace = format!("ApiError({}): {}\n    during {}", self.kind, self.message, self.operation);
        if let Some(detail) = &self.detail {
            trace.push_str("\n    caused by: ");
            trace.push_str(detail);
        }
        trace
    }

    fn log(&self) {
        if self.operational {
            tracing::debug!(
                operation = %self.operation,
                kind = %self.kind,
                status = self.status.as_u16(),
                "Request failed: {}", self.message
            );
        } else {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                detail = ?self.detail,
                "Request failed: {}", self.message
            );
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error during {}: {}", self.kind, self.operation, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let operation = ApiOperation::from(err.operation);
        let (kind, message) = match &err.kind {
            StoreErrorKind::InvalidId { path, value } => {
                (ApiErrorKind::InvalidValue, format!("Invalid {path}: {value}"))
            }
            StoreErrorKind::Duplicate { value, .. } => (
                ApiErrorKind::DuplicateValue,
                format!("Duplicate field value: {value}. Please use another value!"),
            ),
            StoreErrorKind::ValidationFailed(messages) => (
                ApiErrorKind::ValidationFailed,
                format!("Invalid input data. {}", messages.join(". ")),
            ),
            StoreErrorKind::ConnectionFailed | StoreErrorKind::Timeout => {
                (ApiErrorKind::ServiceUnavailable, err.message.clone())
            }
            StoreErrorKind::Serialization | StoreErrorKind::Other => {
                (ApiErrorKind::InternalError, err.message.clone())
            }
        };
        Self {
            entity_type: err.collection.clone(),
            entity_id: err.document_id.clone(),
            detail: Some(err.to_string()),
            ..Self::new(operation, kind, message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let mut response = self.render(Environment::Production, Surface::Api);
        response.extensions_mut().insert(self);
        response
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn envelope_json(err: &ApiError, environment: Environment) -> Value {
        serde_json::to_value(err.envelope(environment)).unwrap()
    }

    #[test]
    fn test_invalid_id_message() {
        let err: ApiError = StoreError::invalid_id(StoreOperation::FindById, "tours", "abc").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid _id: abc");
        assert_eq!(err.operation, ApiOperation::GetOne);
        assert!(err.is_operational());
        assert_eq!(err.entity_type.as_deref(), Some("tours"));
    }

    #[test]
    fn test_duplicate_message_quotes_value() {
        let err: ApiError = StoreError::duplicate(
            StoreOperation::Create,
            "tours",
            vec!["name".to_string()],
            "\"The Forest Hiker\"",
        )
        .into();
        assert_eq!(
            err.message,
            "Duplicate field value: \"The Forest Hiker\". Please use another value!"
        );
        assert_eq!(err.status_text(), "fail");
    }

    #[test]
    fn test_validation_messages_joined() {
        let err: ApiError = StoreError::validation_failed(
            StoreOperation::Create,
            "tours",
            vec![
                "A tour must have a name".to_string(),
                "A tour must have a price".to_string(),
            ],
        )
        .into();
        assert_eq!(
            err.message,
            "Invalid input data. A tour must have a name. A tour must have a price"
        );
    }

    #[test]
    fn test_infrastructure_errors_are_hidden_in_production() {
        let err: ApiError =
            StoreError::connection_failed(StoreOperation::Find, "connection refused").into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.is_operational());
        assert_eq!(
            envelope_json(&err, Environment::Production),
            json!({"status": "error", "message": GENERIC_ERROR_MESSAGE})
        );
    }

    #[test]
    fn test_infrastructure_status_is_500_in_production() {
        let err: ApiError = StoreError::timeout(StoreOperation::Find, "deadline exceeded").into();
        assert_eq!(err.response_status(Environment::Development), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.response_status(Environment::Production), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.render(Environment::Production, Surface::Page).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let not_found = ApiError::not_found(ApiOperation::GetOne, "tour", "x");
        assert_eq!(not_found.response_status(Environment::Production), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_operational_errors_keep_message_in_production() {
        let err = ApiError::not_found(ApiOperation::GetOne, "tour", "5c88fa8cf4afda39709c2951");
        assert_eq!(
            envelope_json(&err, Environment::Production),
            json!({"status": "fail", "message": "No tour document found with that ID"})
        );
    }

    #[test]
    fn test_development_includes_details() {
        let err = ApiError::internal(ApiOperation::List, "store exploded");
        let value = envelope_json(&err, Environment::Development);
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "store exploded");
        assert_eq!(value["error"]["statusCode"], 500);
        assert_eq!(value["error"]["isOperational"], false);
        assert_eq!(value["error"]["operation"], "list");
        assert!(value["stack"].as_str().unwrap().contains("caused by: store exploded"));
    }

    #[test]
    fn test_route_not_found() {
        let err = ApiError::route_not_found("/api/v1/nothing");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Route /api/v1/nothing not found!");
    }

    #[test]
    fn test_from_status_keeps_code() {
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.kind, ApiErrorKind::BadRequest);
        assert_eq!(err.status_text(), "fail");

        let timeout = ApiError::from_status(StatusCode::REQUEST_TIMEOUT);
        assert_eq!(timeout.kind, ApiErrorKind::RequestTimeout);
        assert!(timeout.is_operational());

        let gateway = ApiError::from_status(StatusCode::BAD_GATEWAY);
        assert!(!gateway.is_operational());
    }

    #[test]
    fn test_not_implemented_is_operational_500() {
        let err = ApiError::new(
            ApiOperation::CreateOne,
            ApiErrorKind::NotImplemented,
            "This route is not defined! Please use /signup instead.",
        );
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            envelope_json(&err, Environment::Production),
            json!({"status": "error", "message": "This route is not defined! Please use /signup instead."})
        );
    }

    #[test]
    fn test_surface_for_path() {
        assert_eq!(Surface::for_path("/api/v1/tours"), Surface::Api);
        assert_eq!(Surface::for_path("/api"), Surface::Api);
        assert_eq!(Surface::for_path("/apiary"), Surface::Page);
        assert_eq!(Surface::for_path("/tour/the-forest-hiker"), Surface::Page);
    }

    #[test]
    fn test_page_hides_infrastructure_message_in_production() {
        let err = ApiError::internal(ApiOperation::Route, "<db> down");
        assert!(err.page(Environment::Production).contains(PAGE_GENERIC_MESSAGE));
        let dev = err.page(Environment::Development);
        assert!(dev.contains("&lt;db&gt; down"));
        assert!(dev.contains(PAGE_TITLE));
    }

    #[tokio::test]
    async fn test_into_response_stores_error() {
        let err = ApiError::not_found(ApiOperation::DeleteOne, "review", "x");
        let response = err.clone().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.extensions().get::<ApiError>(), Some(&err));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"status": "fail", "message": "No review document found with that ID"}));
    }
}
