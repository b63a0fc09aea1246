//! Security headers middleware
//!
//! Applies the usual hardening headers (X-Content-Type-Options,
//! X-Frame-Options, Referrer-Policy, ...) using
//! `tower_http::set_header::SetResponseHeaderLayer`. Handlers that set one
//! of these headers themselves keep their value.

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityHeadersConfig;

/// Apply security headers to the router based on configuration.
pub fn apply_security_headers(mut app: Router, config: &SecurityHeadersConfig) -> Router {
    if !config.enabled {
        return app;
    }

    if config.hsts {
        let mut value = format!("max-age={}", config.hsts_max_age_secs);
        if config.hsts_include_subdomains {
            value.push_str("; includeSubDomains");
        }
        app = set_if_absent(app, http::header::STRICT_TRANSPORT_SECURITY, &value);
    }

    if config.x_content_type_options {
        app = set_if_absent(app, http::header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    }

    if !config.x_frame_options.is_empty() {
        app = set_if_absent(app, http::header::X_FRAME_OPTIONS, &config.x_frame_options);
    }

    // 0 disables the legacy browser filter
    if config.x_xss_protection {
        app = set_if_absent(app, http::header::X_XSS_PROTECTION, "0");
    }

    if !config.referrer_policy.is_empty() {
        app = set_if_absent(app, http::header::REFERRER_POLICY, &config.referrer_policy);
    }

    if config.x_dns_prefetch_control {
        app = set_if_absent(app, http::header::X_DNS_PREFETCH_CONTROL, "off");
    }

    if let Some(ref policy) = config.permissions_policy {
        app = set_if_absent(app, HeaderName::from_static("permissions-policy"), policy);
    }

    app
}

fn set_if_absent(app: Router, name: HeaderName, value: &str) -> Router {
    match HeaderValue::from_str(value) {
        Ok(value) => app.layer(SetResponseHeaderLayer::if_not_present(name, value)),
        Err(_) => {
            tracing::warn!(header = %name, value, "Skipping invalid security header value");
            app
        }
    }
}
