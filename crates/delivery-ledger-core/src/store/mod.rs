//! Storage traits and persisted record types.
//!
//! Four conceptual tables: configuration, message, message_event and
//! analytics_cache. Business logic depends only on the traits here;
//! concrete backends are injected at runtime. The in-memory
//! implementations in [`memory`] double as test doubles and as the
//! reference semantics for real backends:
//!
//! - message lookup-or-create by vendor reference is insert-or-fetch
//!   under one lock, never check-then-insert;
//! - the analytics increment is a single atomic upsert, never a
//!   read-modify-write pair.

use crate::status::DeliveryStatus;
use crate::{
    ChannelType, ConfigId, EventId, MessageId, ProjectSlug, Timestamp, UserId, Vendor,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod memory;
pub use memory::{MemoryAnalyticsStore, MemoryConfigStore, MemoryEventLedger};

// ============================================================================
// Records
// ============================================================================

/// A webhook endpoint issued to a tenant: the (user, project, vendor,
/// channel) tuple a delivery URL resolves to.
///
/// Immutable once issued except for secret rotation and the `is_active`
/// flag. Deactivation causes future deliveries to be rejected, never
/// silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfiguration {
    pub id: ConfigId,
    pub user_id: UserId,
    pub project: ProjectSlug,
    pub vendor: Vendor,
    pub channel: ChannelType,
    /// Shared secret for HMAC verification. `None` means verification is
    /// not required for this configuration (pre-signature vendors).
    pub secret: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl WebhookConfiguration {
    /// Create a new active configuration.
    pub fn new(
        user_id: UserId,
        project: ProjectSlug,
        vendor: Vendor,
        channel: ChannelType,
        secret: Option<String>,
    ) -> Self {
        Self {
            id: ConfigId::new(),
            user_id,
            project,
            vendor,
            channel,
            secret,
            is_active: true,
            created_at: Timestamp::now(),
        }
    }

    /// Whether deliveries to this configuration must carry a valid signature.
    pub fn requires_signature(&self) -> bool {
        self.secret.is_some()
    }
}

/// One distinct outbound communication, as first observed through its
/// delivery events.
///
/// Never mutated after creation except by association of later events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub config_id: ConfigId,
    pub user_id: UserId,
    pub project: ProjectSlug,
    pub vendor: Vendor,
    pub channel: ChannelType,
    pub recipient: Option<String>,
    /// Vendor-assigned outbound identifier; `None` when the first event
    /// carried no extractable reference.
    pub vendor_message_ref: Option<String>,
    pub created_at: Timestamp,
}

/// One delivery-status observation. Append-only: events are never updated
/// or deleted, except that the offline backfill tool may fill a
/// previously-null `vendor_ref`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: EventId,
    pub message_id: MessageId,
    pub status: DeliveryStatus,
    pub reason: Option<String>,
    /// Vendor's own event/message identifier, used for idempotency and
    /// debugging.
    pub vendor_ref: Option<String>,
    /// Vendor-reported event time; authoritative for temporal ordering
    /// downstream, regardless of arrival order.
    pub occurred_at: Timestamp,
    pub recorded_at: Timestamp,
    /// Raw payload stored verbatim for forensic replay.
    pub raw_payload: Value,
}

impl MessageEvent {
    /// Create a new event observed now.
    pub fn new(
        message_id: MessageId,
        status: DeliveryStatus,
        reason: Option<String>,
        vendor_ref: Option<String>,
        occurred_at: Timestamp,
        raw_payload: Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            message_id,
            status,
            reason,
            vendor_ref,
            occurred_at,
            recorded_at: Timestamp::now(),
            raw_payload,
        }
    }
}

/// Key of one analytics_cache row: per user, vendor, channel, project and
/// UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticsKey {
    pub user_id: UserId,
    pub vendor: Vendor,
    pub channel: ChannelType,
    pub project: ProjectSlug,
    pub day: NaiveDate,
}

/// One analytics_cache row: running counters plus a derived success rate.
///
/// A materialized, eventually-consistent view — fully reconstructable
/// from the MessageEvent log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub key: AnalyticsKey,
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
    pub success_rate: f64,
}

impl AnalyticsRow {
    /// Empty row for a key.
    pub fn empty(key: AnalyticsKey) -> Self {
        Self {
            key,
            sent: 0,
            delivered: 0,
            read: 0,
            failed: 0,
            success_rate: 0.0,
        }
    }

    /// Increment the counter bucket for a status and recompute the rate.
    pub fn apply(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Sent => self.sent += 1,
            DeliveryStatus::Delivered => self.delivered += 1,
            DeliveryStatus::Read => self.read += 1,
            DeliveryStatus::Failed => self.failed += 1,
        }
        self.success_rate = self.delivered as f64 / std::cmp::max(self.sent, 1) as f64;
    }
}

/// Aggregation-level deduplication key.
///
/// Reprocessing the same webhook delivery must not double-count, so the
/// counter increment is keyed by (message, vendor reference, status).
/// Events without a vendor reference cannot be deduplicated and always
/// count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub message_id: MessageId,
    pub vendor_ref: String,
    pub status: DeliveryStatus,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Store not available: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Check if the error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::OperationFailed { .. } => false,
            Self::Unavailable { .. } => true,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Collaborator seam to the project/access layer: resolves an inbound
/// route to its webhook configuration.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Resolve a (project, vendor, channel) route to its configuration,
    /// active or not. The caller decides how to reject inactive ones.
    async fn resolve(
        &self,
        project: &ProjectSlug,
        vendor: Vendor,
        channel: ChannelType,
    ) -> Result<Option<WebhookConfiguration>, StoreError>;

    /// Insert a configuration.
    async fn insert(&self, config: WebhookConfiguration) -> Result<(), StoreError>;

    /// Flip a configuration's active flag.
    async fn set_active(&self, id: ConfigId, active: bool) -> Result<bool, StoreError>;

    /// Rotate (or clear) a configuration's shared secret.
    async fn rotate_secret(&self, id: ConfigId, secret: Option<String>)
        -> Result<bool, StoreError>;
}

/// The message and message_event tables.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Look up or create the message owning a vendor reference, scoped to
    /// a configuration. A `None` reference always creates a fresh,
    /// uncorrelatable message. Insert-or-fetch, safe under concurrent
    /// deliveries for the same reference.
    async fn upsert_message(
        &self,
        config: &WebhookConfiguration,
        vendor_ref: Option<&str>,
        recipient: Option<&str>,
    ) -> Result<Message, StoreError>;

    /// Fetch a message by ID.
    async fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError>;

    /// Append one event to the log.
    async fn append_event(&self, event: MessageEvent) -> Result<(), StoreError>;

    /// Events for one message, ordered by occurred_at.
    async fn events_for_message(&self, id: MessageId) -> Result<Vec<MessageEvent>, StoreError>;

    /// Full scan of the event log joined to owning messages, in recorded
    /// order. Drives aggregate rebuilds and backfill.
    async fn all_events(&self) -> Result<Vec<(Message, MessageEvent)>, StoreError>;

    /// Fill a previously-null vendor reference on an event.
    ///
    /// The only permitted event mutation. Returns `false` when the event
    /// does not exist or already has a reference.
    async fn fill_vendor_ref(&self, event_id: EventId, vendor_ref: &str)
        -> Result<bool, StoreError>;
}

/// The analytics_cache table.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Atomically upsert the row for `key` and increment the counter
    /// bucket for `status`, unless `dedup` has been seen before.
    ///
    /// Returns whether the increment was applied.
    async fn record(
        &self,
        key: AnalyticsKey,
        status: DeliveryStatus,
        dedup: Option<DedupKey>,
    ) -> Result<bool, StoreError>;

    /// Fetch one row.
    async fn row(&self, key: &AnalyticsKey) -> Result<Option<AnalyticsRow>, StoreError>;

    /// All rows, unordered.
    async fn rows(&self) -> Result<Vec<AnalyticsRow>, StoreError>;

    /// Drop every row and all dedup state. Used by rebuilds; the event
    /// log remains the source of truth.
    async fn clear(&self) -> Result<(), StoreError>;
}
