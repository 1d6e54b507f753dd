//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use delivery_ledger_core::IngestError;
use tracing::{error, warn};

/// Webhook handler errors with HTTP status code mapping
///
/// Vendors retry on non-2xx responses, so the mapping decides retry
/// behavior as much as it reports outcomes:
///
/// - `400 Bad Request`: malformed payloads, permanent — do not retry
/// - `401 Unauthorized`: signature missing or invalid
/// - `404 Not Found`: unknown route or no active configuration
/// - `429 Too Many Requests`: rate limited, retry after the given delay
/// - `503 Service Unavailable`: transient storage failure, retry
/// - `500 Internal Server Error`: unexpected failure
///
/// Error messages returned to vendors are sanitized; detail is logged
/// server-side with the request's correlation ID.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Ingestion pipeline failure
    ///
    /// The underlying [`IngestError`] variant determines the status code.
    #[error("Ingestion failed: {0}")]
    IngestFailed(#[from] IngestError),

    /// Request body exceeds the configured maximum
    ///
    /// Maps to: `413 Payload Too Large` (permanent, do not retry)
    #[error("Payload too large: {size} bytes (max: {max_size} bytes)")]
    PayloadTooLarge { size: usize, max_size: usize },

    /// Rate limit exceeded
    ///
    /// Maps to: `429 Too Many Requests` with a Retry-After header.
    #[error("Rate limit exceeded. Retry after {retry_after_seconds}s")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// Unexpected internal server error
    ///
    /// Maps to: `500 Internal Server Error`. Details are logged but a
    /// generic message is returned to the caller.
    #[error("Internal server error: {message}")]
    InternalError { message: String },
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            Self::IngestFailed(ref e) => match e {
                IngestError::UnknownVendor { .. }
                | IngestError::UnknownChannel { .. }
                | IngestError::InvalidProject(_)
                | IngestError::ConfigurationNotFound { .. } => {
                    warn!(error = %e, "Webhook route did not resolve");
                    (StatusCode::NOT_FOUND, self.to_string(), None)
                }
                IngestError::MissingSignature { .. } | IngestError::InvalidSignature(_) => {
                    warn!(error = %e, "Webhook signature rejected");
                    (StatusCode::UNAUTHORIZED, self.to_string(), None)
                }
                IngestError::InvalidPayload(_) => {
                    (StatusCode::BAD_REQUEST, self.to_string(), None)
                }
                IngestError::Store(_) if e.is_transient() => {
                    (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), Some(60))
                }
                _ => {
                    error!(error = %e, "Webhook ingestion failed unexpectedly");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error occurred. Please try again later.".to_string(),
                        None,
                    )
                }
            },
            Self::PayloadTooLarge { size, max_size } => {
                warn!(payload_size = size, max_size, "Payload too large");
                (StatusCode::PAYLOAD_TOO_LARGE, self.to_string(), None)
            }
            Self::RateLimitExceeded {
                retry_after_seconds,
            } => {
                warn!(retry_after = retry_after_seconds, "Rate limit exceeded");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    self.to_string(),
                    Some(retry_after_seconds),
                )
            }
            Self::InternalError { ref message } => {
                error!(error = %message, "Internal server error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error occurred. Please try again later.".to_string(),
                    None,
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parsing failed: {0}")]
    Parsing(#[from] toml::de::Error),
}
