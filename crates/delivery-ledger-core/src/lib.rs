//! # Delivery-Ledger Core
//!
//! Core business logic for the delivery-ledger webhook ingestion and
//! status-normalization service.
//!
//! This crate contains the domain logic for receiving delivery-status
//! callbacks from messaging vendors, verifying their authenticity,
//! normalizing vendor vocabularies into canonical statuses, persisting an
//! append-only event log, and maintaining derived per-day analytics
//! counters.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Storage implementations are injected at runtime
//! - Vendor-specific knowledge lives behind the adapter registry
//!
//! ## Usage
//!
//! ```rust
//! use delivery_ledger_core::{EventId, MessageId, Vendor, ChannelType};
//!
//! let event_id = EventId::new();
//! let vendor: Vendor = "msg91".parse().unwrap();
//! assert_eq!(vendor, Vendor::Msg91);
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

/// Standard result type for delivery-ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for delivery-status events.
///
/// Uses ULID for lexicographic sorting and global uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Ulid);

impl EventId {
    /// Generate a new unique event ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of event ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Unique identifier for a tracked outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Ulid);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of message ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Identifier for a webhook configuration row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigId(Uuid);

impl ConfigId {
    /// Generate new configuration ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConfigId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for tracing requests across system boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier of the account that owns a configuration.
///
/// Account management itself is an external collaborator; the ledger only
/// carries the ID through for scoping and analytics keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    /// Create new user ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>().map_err(|_| ParseError::InvalidFormat {
            expected: "positive integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// URL-safe project identifier.
///
/// Project slugs appear verbatim as URL path segments:
/// `POST /api/webhook/{project}/{vendor}/{channel}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectSlug(String);

impl ProjectSlug {
    /// Create a new project slug with validation.
    ///
    /// # Validation Rules
    /// - Must be 1-64 characters
    /// - Must contain only lowercase alphanumeric characters, hyphens,
    ///   and underscores
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "project".to_string(),
            });
        }

        if value.len() > 64 {
            return Err(ValidationError::TooLong {
                field: "project".to_string(),
                max_length: 64,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "project".to_string(),
                invalid_chars: "use lowercase alphanumeric, hyphens, or underscores".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectSlug {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Vendor and Channel Types
// ============================================================================

/// Supported messaging vendors.
///
/// Adding a vendor means registering a new adapter implementation in
/// [`adapters::AdapterRegistry`] and extending the mapping tables; the
/// enum is the closed set of slugs the router will resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Msg91,
    Gupshup,
    Twilio,
    Sendgrid,
}

impl Vendor {
    /// URL slug for this vendor
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Msg91 => "msg91",
            Self::Gupshup => "gupshup",
            Self::Twilio => "twilio",
            Self::Sendgrid => "sendgrid",
        }
    }

    /// All supported vendors
    pub fn all() -> [Vendor; 4] {
        [Self::Msg91, Self::Gupshup, Self::Twilio, Self::Sendgrid]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msg91" => Ok(Self::Msg91),
            "gupshup" => Ok(Self::Gupshup),
            "twilio" => Ok(Self::Twilio),
            "sendgrid" => Ok(Self::Sendgrid),
            _ => Err(ParseError::InvalidFormat {
                expected: "one of msg91, gupshup, twilio, sendgrid".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

/// Delivery channel through which a message was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Sms,
    Whatsapp,
    Email,
}

impl ChannelType {
    /// URL slug for this channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sms" => Ok(Self::Sms),
            "whatsapp" => Ok(Self::Whatsapp),
            "email" => Ok(Self::Email),
            _ => Err(ParseError::InvalidFormat {
                expected: "one of sms, whatsapp, email".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing UTC datetime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 datetime".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Build a timestamp from a unix epoch value, accepting either seconds
    /// or milliseconds (vendors disagree on which they send).
    pub fn from_epoch(value: i64) -> Option<Self> {
        // Values beyond this magnitude are taken as milliseconds. Compared
        // without negation so i64::MIN cannot overflow.
        const MILLIS_CUTOVER: i64 = 100_000_000_000;
        let dt = if value >= MILLIS_CUTOVER || value <= -MILLIS_CUTOVER {
            DateTime::<Utc>::from_timestamp_millis(value)?
        } else {
            DateTime::<Utc>::from_timestamp(value, 0)?
        };
        Some(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// UTC calendar day this timestamp falls on.
    ///
    /// Analytics rows are bucketed by this value.
    pub fn day(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

/// Top-level error type for delivery-ledger operations
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] ingest::IngestError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl LedgerError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Ingest(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            Self::Internal { .. } => true,
            Self::Validation(_) => false,
            Self::Parse(_) => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Ingest(e) => e.error_category(),
            Self::Store(e) => {
                if e.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Parse(_) => ErrorCategory::Permanent,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Vendor payload adapters and the adapter registry
pub mod adapters;

/// Aggregation updater for per-day analytics counters
pub mod aggregate;

/// Offline backfill and repair engine
pub mod backfill;

/// Ingestion coordinator: the webhook processing pipeline
pub mod ingest;

/// Reference extractor for vendor message identifiers
pub mod reference;

/// HMAC signature verification
pub mod signature;

/// Canonical status vocabulary and the status mapper
pub mod status;

/// Storage traits and in-memory implementations
pub mod store;

// Re-export key types for convenience
pub use adapters::{AdapterError, AdapterOutput, AdapterRegistry, RawEvent, VendorAdapter};
pub use aggregate::AggregationUpdater;
pub use backfill::{BackfillEngine, BackfillReport};
pub use ingest::{IngestError, IngestReceipt, IngestionCoordinator, WebhookRoute};
pub use reference::ReferenceExtractor;
pub use signature::{signature_header, SignatureError, SignatureVerifier};
pub use status::{DeliveryStatus, StatusMapper};
pub use store::{
    AnalyticsKey, AnalyticsRow, AnalyticsStore, ConfigurationStore, DedupKey, EventLedger,
    Message, MessageEvent, StoreError, WebhookConfiguration,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
