//! Governor-based per-IP rate limiting
//!
//! Each client IP gets `max_requests` per `window_secs`, replenished
//! continuously. Rejected requests receive 429 with `Retry-After`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{clock::Clock, DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::RateLimitConfig;
use crate::handlers::{ApiError, ApiErrorKind, ApiOperation};

/// Tracked keys above which idle entries are purged
const RETAIN_THRESHOLD: usize = 10_000;

/// Keyed rate limiter shared by all requests
#[derive(Clone)]
pub struct GovernorRateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    path_prefix: Arc<str>,
    message: Arc<str>,
}

impl GovernorRateLimit {
    /// `None` when disabled or when the budget is zero
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let Some(quota) = quota(config.max_requests, config.window()) else {
            tracing::warn!(
                max_requests = config.max_requests,
                window_secs = config.window_secs,
                "Rate limit disabled: empty budget"
            );
            return None;
        };
        Some(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            path_prefix: Arc::from(config.path_prefix.as_str()),
            message: Arc::from(config.message.as_str()),
        })
    }

    /// Middleware function enforcing the per-IP budget
    pub async fn middleware(
        State(rate_limit): State<Self>,
        request: Request,
        next: Next,
    ) -> Response {
        if !request.uri().path().starts_with(&*rate_limit.path_prefix) {
            return next.run(request).await;
        }

        let ip = client_ip(&request);
        match rate_limit.check(ip) {
            Ok(()) => next.run(request).await,
            Err(retry_after) => {
                tracing::debug!(%ip, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
                rate_limit.rejection(retry_after)
            }
        }
    }

    fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > RETAIN_THRESHOLD {
            self.limiter.retain_recent();
        }
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.limiter.clock().now()))
    }

    fn rejection(&self, retry_after: Duration) -> Response {
        let mut response = ApiError::new(
            ApiOperation::Route,
            ApiErrorKind::TooManyRequests,
            &*self.message,
        )
        .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        response
    }
}

/// `max_requests` per `window`, all of it available as a burst
fn quota(max_requests: u32, window: Duration) -> Option<Quota> {
    let burst = NonZeroU32::new(max_requests)?;
    Quota::with_period(window / burst.get()).map(|quota| quota.allow_burst(burst))
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Whole seconds, rounded up, at least one
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn config(max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            ..RateLimitConfig::default()
        }
    }

    fn app(limit: GovernorRateLimit) -> Router {
        Router::new()
            .route("/api/v1/tours", get(|| async { "tours" }))
            .route("/", get(|| async { "home" }))
            .layer(from_fn_with_state(limit, GovernorRateLimit::middleware))
    }

    fn request(uri: &str, ip: [u8; 4]) -> HttpRequest<Body> {
        let mut request = HttpRequest::builder().uri(uri).body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 4000))));
        request
    }

    #[test]
    fn test_disabled_or_empty_budget() {
        let disabled = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        assert!(GovernorRateLimit::from_config(&disabled).is_none());
        assert!(GovernorRateLimit::from_config(&config(0)).is_none());
        assert!(GovernorRateLimit::from_config(&config(100)).is_some());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(35_500)), 36);
        assert_eq!(retry_after_secs(Duration::from_secs(36)), 36);
    }

    #[tokio::test]
    async fn test_budget_per_ip() {
        let app = app(GovernorRateLimit::from_config(&config(2)).unwrap());

        for _ in 0..2 {
            let response = app.clone().oneshot(request("/api/v1/tours", [10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request("/api/v1/tours", [10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!(retry_after >= 1);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({"status": "fail", "message": "Too many requests from this IP, please try again in an hour!"})
        );

        let other = app.clone().oneshot(request("/api/v1/tours", [10, 0, 0, 2])).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_paths_outside_prefix_are_not_limited() {
        let app = app(GovernorRateLimit::from_config(&config(1)).unwrap());
        for _ in 0..3 {
            let response = app.clone().oneshot(request("/", [10, 0, 0, 3])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
