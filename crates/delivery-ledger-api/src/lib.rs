//! # Delivery-Ledger HTTP Service
//!
//! HTTP server for receiving delivery-status webhooks from messaging
//! vendors and processing them through the delivery-ledger core.
//!
//! This service provides:
//! - Per-route webhook endpoint with HMAC signature validation
//! - Health and readiness endpoints
//! - Per-source rate limiting

// Public modules
pub mod errors;
pub mod rate_limit;

pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use rate_limit::{RateDecision, RateLimiter};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use delivery_ledger_core::{
    signature_header, CorrelationId, IngestReceipt, IngestionCoordinator, Timestamp, WebhookRoute,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Ingestion coordinator for handling vendor deliveries
    pub coordinator: Arc<IngestionCoordinator>,

    /// Per-source rate limiter
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, coordinator: Arc<IngestionCoordinator>) -> Self {
        let limiter = Arc::new(RateLimiter::per_minute(config.security.ip_rate_limit));
        Self {
            config,
            coordinator,
            limiter,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Security settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate cross-field constraints before startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be non-zero".to_string(),
            });
        }
        if self.security.enable_ip_rate_limiting && self.security.ip_rate_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "security.ip_rate_limit must be non-zero when limiting is enabled"
                    .to_string(),
            });
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Invalid {
                message: format!("logging.level '{other}' is not a valid level"),
            }),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1MB; vendor callbacks are small
            enable_cors: false,
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable IP-based rate limiting
    pub enable_ip_rate_limiting: bool,

    /// Rate limit (requests per minute per source IP)
    pub ip_rate_limit: u32,

    /// Enable request logging
    pub log_requests: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_ip_rate_limiting: true,
            ip_rate_limit: 600,
            log_requests: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_routes = Router::new().route(
        "/api/webhook/{project}/{vendor}/{channel}",
        post(handle_webhook),
    );

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let mut router = Router::new().merge(webhook_routes).merge(health_routes);

    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    coordinator: Arc<IngestionCoordinator>,
) -> Result<(), ServiceError> {
    config.validate()?;

    let state = AppState::new(config.clone(), coordinator);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("invalid bind address: {e}"),
            })
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", addr);

    let shutdown_timeout = std::time::Duration::from_secs(config.server.shutdown_timeout_seconds);

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    // In-flight requests complete before shutdown; new connections are
    // refused as soon as the signal arrives.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Handle a vendor delivery-status webhook.
///
/// Any 2xx response tells the vendor not to redeliver, so the handler
/// returns 200 even when some sub-events in a batch were skipped; the
/// receipt carries the per-event counts. Non-2xx responses are reserved
/// for whole-request failures where redelivery could succeed or the
/// request must not be trusted.
#[instrument(skip(state, headers, body), fields(project = %project, vendor = %vendor, channel = %channel))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path((project, vendor, channel)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    if state.config.security.enable_ip_rate_limiting {
        let source = client_source(&headers);
        if let RateDecision::Limited {
            retry_after_seconds,
        } = state.limiter.check(&source)
        {
            return Err(WebhookHandlerError::RateLimitExceeded {
                retry_after_seconds,
            });
        }
    }

    if body.len() > state.config.server.max_body_size {
        return Err(WebhookHandlerError::PayloadTooLarge {
            size: body.len(),
            max_size: state.config.server.max_body_size,
        });
    }

    let route = WebhookRoute::from_segments(&project, &vendor, &channel)?;

    // The raw bytes are what was signed; extraction must not re-serialize.
    let signature = headers
        .get(signature_header(route.vendor))
        .and_then(|v| v.to_str().ok());

    let receipt = state.coordinator.ingest(&route, signature, &body).await?;

    Ok(Json(WebhookResponse::from_receipt(receipt)))
}

/// Identify the request source for rate limiting.
///
/// Behind a proxy the first `x-forwarded-for` hop is the caller; without
/// one, all direct traffic shares a single bucket.
fn client_source(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "direct".to_string())
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic health check endpoint
#[instrument(skip_all)]
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check for orchestrators
#[instrument(skip_all)]
async fn handle_readiness_check(State(_state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    (
        StatusCode::OK,
        Json(ReadinessResponse {
            ready: true,
            timestamp: Timestamp::now(),
        }),
    )
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging with correlation IDs.
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| CorrelationId::new().to_string());

    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Acknowledgement body for a processed webhook delivery
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub events_processed: usize,
    pub errors: usize,
    pub unreferenced: usize,
}

impl WebhookResponse {
    fn from_receipt(receipt: IngestReceipt) -> Self {
        let message = if receipt.errors == 0 {
            "Webhook processed successfully".to_string()
        } else {
            format!(
                "Webhook processed with {} skipped sub-event(s)",
                receipt.errors
            )
        };
        Self {
            success: true,
            message,
            events_processed: receipt.events_processed,
            errors: receipt.errors,
            unreferenced: receipt.unreferenced,
        }
    }
}

/// Health check response body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
