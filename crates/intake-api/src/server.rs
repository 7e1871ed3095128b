//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Panic recovery (generic 500 with a mailto fallback)
//! 4. CORS against the configured origin allow-list
//! 5. Timeout enforcement
//! 6. Body size limit
//! 7. Client identity resolution
//! 8. Handler execution
//!
//! # Graceful Shutdown
//!
//! The server handles SIGTERM and CTRL+C by refusing new connections and
//! draining in-flight requests.

use std::{any::Any, net::SocketAddr, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use intake_core::{mailto_link, IntakeError};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    handlers::{self, create_fallback_response},
    middleware::client_identity_middleware,
    AppState,
};

/// Headroom over the attachment cap for the other form fields.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use intake_api::{create_router, AppState, Config};
/// use intake_core::RealClock;
///
/// # fn example() -> anyhow::Result<()> {
/// let state = AppState::new(Config::default(), Arc::new(RealClock::new()))?;
/// let app = create_router(state);
/// // Serve the app...
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness_check));

    let api_routes = Router::new()
        .route(
            "/api/report",
            post(handlers::submit_report).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/signup",
            post(handlers::submit_signup).fallback(handlers::method_not_allowed),
        )
        .layer(middleware::from_fn(client_identity_middleware))
        .layer(DefaultBodyLimit::max(
            config.max_attachment_bytes.saturating_add(BODY_OVERHEAD_BYTES),
        ));

    let support_email = config.support_email.clone();

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout)))
        .layer(cors_layer(&config.origin_allow_list()))
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
            panic_response(&support_email, &*panic)
        }))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

fn panic_response(support_email: &str, panic: &(dyn Any + Send)) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");

    let error = IntakeError::Internal(detail.to_string());
    create_fallback_response(&error, None, || mailto_link(support_email, None, None))
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Binds to `addr` and serves requests until a shutdown signal arrives.
/// Peer addresses are recorded for client identity resolution.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or the server
/// fails while running.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::StatusCode};
    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn panic_response_offers_mailto() {
        let panic: Box<dyn Any + Send> = Box::new("boom");

        let response = panic_response("help@example.com", &*panic);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "E9999");
        assert!(body["mailto"].as_str().unwrap().starts_with("mailto:help@example.com?"));
        assert!(body.get("ticketId").is_none());
    }

    #[test]
    fn invalid_origins_are_skipped() {
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
