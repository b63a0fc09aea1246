//! The uniform JSON envelope every API response uses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Document;

/// Outcome class carried in every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    /// The request was at fault (4xx)
    Fail,
    /// The server was at fault (5xx)
    Error,
}

impl EnvelopeStatus {
    pub fn for_status_code(code: StatusCode) -> Self {
        if code.is_success() {
            Self::Success
        } else if code.is_client_error() {
            Self::Fail
        } else {
            Self::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

/// Error internals, only present in development responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    pub status_code: u16,
    pub kind: String,
    pub operation: String,
    pub is_operational: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// `{ status, results?, data?, message? }`
///
/// `data` is present only on successful responses with a payload and
/// `results` only on lists, where it counts the returned items.
///
/// ```rust
/// use serde_json::json;
/// use tourbook_service::handlers::ResponseEnvelope;
///
/// let envelope = ResponseEnvelope::list("tours", Vec::new());
/// assert_eq!(
///     serde_json::to_value(&envelope).unwrap(),
///     json!({"status": "success", "results": 0, "data": {"tours": []}})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: EnvelopeStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ResponseEnvelope {
    /// A list under its plural label
    pub fn list(plural_label: impl Into<String>, items: Vec<Document>) -> Self {
        let results = items.len();
        let items = Value::Array(items.into_iter().map(Value::Object).collect());
        Self {
            results: Some(results),
            ..Self::with_data(plural_label, items)
        }
    }

    /// A single document under its singular label
    pub fn item(label: impl Into<String>, document: Document) -> Self {
        Self::with_data(label, Value::Object(document))
    }

    fn with_data(key: impl Into<String>, value: Value) -> Self {
        let mut data = Map::new();
        data.insert(key.into(), value);
        Self {
            data: Some(data),
            ..Self::bare(EnvelopeStatus::Success)
        }
    }

    pub fn failure(status: EnvelopeStatus, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(status)
        }
    }

    fn bare(status: EnvelopeStatus) -> Self {
        Self {
            status,
            results: None,
            data: None,
            message: None,
            error: None,
            stack: None,
        }
    }
}

/// A handler's successful outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// `None` for bodiless responses
    pub envelope: Option<ResponseEnvelope>,
}

impl ApiResponse {
    /// 200 OK
    pub fn ok(envelope: ResponseEnvelope) -> Self {
        Self {
            status: StatusCode::OK,
            envelope: Some(envelope),
        }
    }

    /// 201 Created
    pub fn created(envelope: ResponseEnvelope) -> Self {
        Self {
            status: StatusCode::CREATED,
            envelope: Some(envelope),
        }
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            envelope: None,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.envelope {
            Some(envelope) => (self.status, Json(envelope)).into_response(),
            None => self.status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_list_counts_returned_items() {
        let envelope = ResponseEnvelope::list(
            "reviews",
            vec![doc(json!({"_id": "a"})), doc(json!({"_id": "b"}))],
        );
        assert_eq!(envelope.results, Some(2));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "status": "success",
                "results": 2,
                "data": {"reviews": [{"_id": "a"}, {"_id": "b"}]}
            })
        );
    }

    #[test]
    fn test_item_has_no_results() {
        let envelope = ResponseEnvelope::item("tour", doc(json!({"_id": "a"})));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "success", "data": {"tour": {"_id": "a"}}})
        );
    }

    #[test]
    fn test_failure_has_no_data() {
        let envelope = ResponseEnvelope::failure(EnvelopeStatus::Fail, "nope");
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "fail", "message": "nope"})
        );
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(EnvelopeStatus::for_status_code(StatusCode::OK), EnvelopeStatus::Success);
        assert_eq!(EnvelopeStatus::for_status_code(StatusCode::NOT_FOUND), EnvelopeStatus::Fail);
        assert_eq!(
            EnvelopeStatus::for_status_code(StatusCode::SERVICE_UNAVAILABLE),
            EnvelopeStatus::Error
        );
    }

    #[test]
    fn test_no_content_has_empty_body() {
        let response = ApiResponse::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(http::header::CONTENT_TYPE).is_none());
    }
}
