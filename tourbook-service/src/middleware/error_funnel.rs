//! Centralized error rendering
//!
//! Every error response passes through [`error_funnel`] on its way out.
//! Responses carrying an [`ApiError`] extension are re-rendered for the
//! configured [`Environment`]; bare error responses from axum or tower
//! layers (405, 408, 413, ...) are wrapped into the same envelope. Panics
//! caught by [`panic_response`] arrive here as infrastructure errors.

use std::any::Any;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::Environment;
use crate::handlers::{ApiError, ApiOperation, Surface};

/// Reshape error responses for `environment`
pub async fn error_funnel(
    State(environment): State<Environment>,
    request: Request,
    next: Next,
) -> Response {
    let surface = Surface::for_path(request.uri().path());
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let error = match response.extensions().get::<ApiError>() {
        Some(error) => error.clone(),
        None => {
            tracing::debug!(status = status.as_u16(), "Wrapping bare error response");
            ApiError::from_status(status)
        }
    };
    reshape(response, error.render(environment, surface))
}

/// Keep the original headers, take status, body and content type from the
/// rendered error
fn reshape(original: Response, rendered: Response) -> Response {
    let (mut parts, _) = original.into_parts();
    let (rendered_parts, body) = rendered.into_parts();

    parts.status = rendered_parts.status;

    parts.headers.remove(header::CONTENT_LENGTH);
    match rendered_parts.headers.get(header::CONTENT_TYPE) {
        Some(content_type) => {
            parts.headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
        None => {
            parts.headers.remove(header::CONTENT_TYPE);
        }
    }
    Response::from_parts(parts, body)
}

/// `CatchPanicLayer::custom` handler
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::internal(ApiOperation::Route, format!("handler panicked: {message}")).into_response()
}
