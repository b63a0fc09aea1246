//! HTTP server with graceful shutdown

use axum::{middleware::from_fn_with_state, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{
    config::{Config, CorsMode},
    error::{Error, Result},
    handlers::route_not_found,
    middleware::{
        apply_security_headers, error_funnel, panic_response, request_id_layer,
        request_id_propagation_layer, sensitive_headers_layer,
    },
};

/// Server instance
pub struct Server {
    config: Config,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Wrap `app` in the full middleware stack. Unmatched routes answer
    /// `Route {uri} not found!`.
    ///
    /// Layers added later run first, so from the outside in a request meets:
    /// request id, sensitive header masking, trace, CORS, compression,
    /// security headers, error funnel, panic recovery, timeout, body limit,
    /// rate limit, then the router.
    pub fn router(&self, app: Router) -> Router {
        let config = &self.config;
        let mut app = rate_limited(app.fallback(route_not_found), config)
            .layer(RequestBodyLimitLayer::new(config.body_limit_bytes()))
            .layer(TimeoutLayer::with_status_code(
                http::StatusCode::REQUEST_TIMEOUT,
                config.timeout(),
            ));

        if config.middleware.catch_panic {
            app = app.layer(CatchPanicLayer::custom(panic_response));
        }

        app = app.layer(from_fn_with_state(config.environment(), error_funnel));
        app = apply_security_headers(app, &config.security_headers);

        if config.middleware.compression {
            app = app.layer(CompressionLayer::new());
        }

        if let Some(cors) = cors_layer(config.middleware.cors_mode) {
            app = app.layer(cors);
        }

        app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(sensitive_headers_layer())
        .layer(request_id_propagation_layer())
        .layer(request_id_layer())
    }

    /// Run the server with the given router
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        tracing::info!("Starting {} on {}", self.config.service.name, addr);
        self.log_middleware_config();

        let app = self.router(app);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Server(format!("Failed to bind {addr}: {e}")))?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }

    fn log_middleware_config(&self) {
        let config = &self.config;
        tracing::info!("Middleware configuration:");
        tracing::info!("  - Environment: {}", config.environment());
        tracing::info!(
            "  - Panic recovery: {}",
            if config.middleware.catch_panic { "enabled" } else { "disabled" }
        );
        tracing::info!("  - Request body limit: {} KB", config.middleware.body_limit_kb);
        tracing::info!(
            "  - Compression: {}",
            if config.middleware.compression { "enabled" } else { "disabled" }
        );
        tracing::info!("  - CORS mode: {:?}", config.middleware.cors_mode);
        tracing::info!("  - Request timeout: {} seconds", config.service.timeout_secs);
        if config.rate_limit.enabled {
            tracing::info!(
                "  - Rate limiting: {} req / {} sec per IP under {}",
                config.rate_limit.max_requests,
                config.rate_limit.window_secs,
                config.rate_limit.path_prefix
            );
        } else {
            tracing::info!("  - Rate limiting: disabled");
        }
        match config.query.max_limit {
            Some(max) => tracing::info!("  - Max page size: {}", max),
            None => tracing::info!("  - Max page size: unbounded"),
        }
    }
}

#[cfg(feature = "governor")]
fn rate_limited(app: Router, config: &Config) -> Router {
    use crate::middleware::GovernorRateLimit;

    match GovernorRateLimit::from_config(&config.rate_limit) {
        Some(rate_limit) => app.layer(from_fn_with_state(rate_limit, GovernorRateLimit::middleware)),
        None => app,
    }
}

#[cfg(not(feature = "governor"))]
fn rate_limited(app: Router, _config: &Config) -> Router {
    app
}

fn cors_layer(mode: CorsMode) -> Option<CorsLayer> {
    match mode {
        CorsMode::Permissive => {
            tracing::debug!("Enabling permissive CORS");
            Some(CorsLayer::permissive())
        }
        CorsMode::Restrictive => {
            tracing::debug!("Enabling restrictive CORS (default deny)");
            Some(CorsLayer::new())
        }
        CorsMode::Disabled => None,
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    tracing::info!("Shutdown signal received, draining requests...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        routing::{get, post},
        Json,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/v1/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
            .route("/api/v1/panic", get(explode))
    }

    async fn explode() -> &'static str {
        panic!("kaboom")
    }

    fn config(environment: Environment) -> Config {
        let mut config = Config::default();
        config.service.environment = environment;
        config
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_server_creation() {
        let config = Config::default();
        let server = Server::new(config.clone());
        assert_eq!(server.config().service.port, config.service.port);
    }

    #[tokio::test]
    async fn test_unknown_route_through_full_stack() {
        let router = Server::new(config(Environment::Production)).router(app());
        let (status, headers, body) = call(router, get_request("/api/v1/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"status": "fail", "message": "Route /api/v1/nope not found!"}));
        assert!(headers["x-request-id"].to_str().unwrap().starts_with("req_"));
        assert_eq!(headers["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_panic_is_an_infrastructure_error() {
        let router = Server::new(config(Environment::Production)).router(app());
        let (status, _, body) = call(router, get_request("/api/v1/panic")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"status": "error", "message": "Something went very wrong..."}));

        let router = Server::new(config(Environment::Development)).router(app());
        let (_, _, body) = call(router, get_request("/api/v1/panic")).await;
        assert!(body["message"].as_str().unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let router = Server::new(config(Environment::Production)).router(app());
        let big = json!({"review": "x".repeat(20 * 1024)}).to_string();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(big))
            .unwrap();
        let (status, _, body) = call(router, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["status"], "fail");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_under_api() {
        let mut config = config(Environment::Production);
        config.rate_limit.max_requests = 1;
        let router = Server::new(config).router(app());

        let (first, _, _) = call(router.clone(), get_request("/api/v1/nope")).await;
        assert_eq!(first, StatusCode::NOT_FOUND);
        let (second, headers, body) = call(router, get_request("/api/v1/nope")).await;
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
        assert!(headers.contains_key(header::RETRY_AFTER));
        assert_eq!(
            body["message"],
            "Too many requests from this IP, please try again in an hour!"
        );
    }
}
