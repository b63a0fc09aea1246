//! Middleware: error funnel, rate limiting, security headers, request tracking

pub mod error_funnel;
#[cfg(feature = "governor")]
pub mod governor;
pub mod request_tracking;
pub mod security_headers;

pub use error_funnel::{error_funnel, panic_response};
#[cfg(feature = "governor")]
pub use governor::GovernorRateLimit;
pub use request_tracking::{
    request_id_layer, request_id_propagation_layer, sensitive_headers_layer, SENSITIVE_HEADERS,
};
pub use security_headers::apply_security_headers;
