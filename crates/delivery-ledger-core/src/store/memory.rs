//! In-memory store implementations for testing and development.
//!
//! These provide the reference semantics for real backends:
//! - thread-safe concurrent access behind `RwLock`s;
//! - message insert-or-fetch by vendor reference under a single write
//!   lock acquisition (the moral equivalent of a uniqueness constraint);
//! - the analytics increment as one atomic upsert, with dedup state held
//!   alongside the rows so a rebuild starts from a clean slate.

use super::{
    AnalyticsKey, AnalyticsRow, AnalyticsStore, ConfigurationStore, DedupKey, EventLedger,
    Message, MessageEvent, StoreError, WebhookConfiguration,
};
use crate::status::DeliveryStatus;
use crate::{ChannelType, ConfigId, EventId, MessageId, ProjectSlug, Timestamp, Vendor};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

fn poisoned(which: &str) -> StoreError {
    StoreError::OperationFailed {
        message: format!("{which} lock poisoned"),
    }
}

// ============================================================================
// MemoryConfigStore
// ============================================================================

/// In-memory configuration table.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: RwLock<Vec<WebhookConfiguration>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with configurations.
    pub fn with_configs(configs: Vec<WebhookConfiguration>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }
}

#[async_trait]
impl ConfigurationStore for MemoryConfigStore {
    async fn resolve(
        &self,
        project: &ProjectSlug,
        vendor: Vendor,
        channel: ChannelType,
    ) -> Result<Option<WebhookConfiguration>, StoreError> {
        let configs = self.configs.read().map_err(|_| poisoned("config"))?;
        Ok(configs
            .iter()
            .rev()
            .find(|c| c.project == *project && c.vendor == vendor && c.channel == channel)
            .cloned())
    }

    async fn insert(&self, config: WebhookConfiguration) -> Result<(), StoreError> {
        let mut configs = self.configs.write().map_err(|_| poisoned("config"))?;
        configs.push(config);
        Ok(())
    }

    async fn set_active(&self, id: ConfigId, active: bool) -> Result<bool, StoreError> {
        let mut configs = self.configs.write().map_err(|_| poisoned("config"))?;
        match configs.iter_mut().find(|c| c.id == id) {
            Some(config) => {
                config.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_secret(
        &self,
        id: ConfigId,
        secret: Option<String>,
    ) -> Result<bool, StoreError> {
        let mut configs = self.configs.write().map_err(|_| poisoned("config"))?;
        match configs.iter_mut().find(|c| c.id == id) {
            Some(config) => {
                config.secret = secret;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// MemoryEventLedger
// ============================================================================

struct LedgerInner {
    messages: HashMap<MessageId, Message>,
    // Uniqueness index: (configuration, vendor reference) -> message.
    by_ref: HashMap<(ConfigId, String), MessageId>,
    // Append-only, in recorded order.
    events: Vec<MessageEvent>,
}

/// In-memory message and message_event tables.
pub struct MemoryEventLedger {
    inner: RwLock<LedgerInner>,
}

impl MemoryEventLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerInner {
                messages: HashMap::new(),
                by_ref: HashMap::new(),
                events: Vec::new(),
            }),
        }
    }

    /// Total number of events in the log.
    pub fn event_count(&self) -> usize {
        self.inner.read().map(|i| i.events.len()).unwrap_or(0)
    }
}

impl Default for MemoryEventLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventLedger for MemoryEventLedger {
    async fn upsert_message(
        &self,
        config: &WebhookConfiguration,
        vendor_ref: Option<&str>,
        recipient: Option<&str>,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("ledger"))?;

        if let Some(vendor_ref) = vendor_ref {
            let key = (config.id, vendor_ref.to_string());
            if let Some(id) = inner.by_ref.get(&key) {
                let message = inner.messages.get(id).cloned().ok_or_else(|| {
                    StoreError::OperationFailed {
                        message: format!("dangling message index for ref '{vendor_ref}'"),
                    }
                })?;
                return Ok(message);
            }
        }

        let message = Message {
            id: MessageId::new(),
            config_id: config.id,
            user_id: config.user_id,
            project: config.project.clone(),
            vendor: config.vendor,
            channel: config.channel,
            recipient: recipient.map(String::from),
            vendor_message_ref: vendor_ref.map(String::from),
            created_at: Timestamp::now(),
        };

        if let Some(vendor_ref) = vendor_ref {
            inner
                .by_ref
                .insert((config.id, vendor_ref.to_string()), message.id);
        }
        inner.messages.insert(message.id, message.clone());

        Ok(message)
    }

    async fn message(&self, id: MessageId) -> Result<Option<Message>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("ledger"))?;
        Ok(inner.messages.get(&id).cloned())
    }

    async fn append_event(&self, event: MessageEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("ledger"))?;
        if !inner.messages.contains_key(&event.message_id) {
            return Err(StoreError::OperationFailed {
                message: format!("event references unknown message {}", event.message_id),
            });
        }
        inner.events.push(event);
        Ok(())
    }

    async fn events_for_message(&self, id: MessageId) -> Result<Vec<MessageEvent>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("ledger"))?;
        let mut events: Vec<MessageEvent> = inner
            .events
            .iter()
            .filter(|e| e.message_id == id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        Ok(events)
    }

    async fn all_events(&self) -> Result<Vec<(Message, MessageEvent)>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("ledger"))?;
        inner
            .events
            .iter()
            .map(|event| {
                inner
                    .messages
                    .get(&event.message_id)
                    .cloned()
                    .map(|message| (message, event.clone()))
                    .ok_or_else(|| StoreError::OperationFailed {
                        message: format!("event {} has no owning message", event.id),
                    })
            })
            .collect()
    }

    async fn fill_vendor_ref(
        &self,
        event_id: EventId,
        vendor_ref: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("ledger"))?;
        match inner.events.iter_mut().find(|e| e.id == event_id) {
            Some(event) if event.vendor_ref.is_none() => {
                event.vendor_ref = Some(vendor_ref.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// MemoryAnalyticsStore
// ============================================================================

struct AnalyticsInner {
    rows: HashMap<AnalyticsKey, AnalyticsRow>,
    seen: HashSet<DedupKey>,
}

/// In-memory analytics_cache table.
pub struct MemoryAnalyticsStore {
    inner: RwLock<AnalyticsInner>,
}

impl MemoryAnalyticsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AnalyticsInner {
                rows: HashMap::new(),
                seen: HashSet::new(),
            }),
        }
    }
}

impl Default for MemoryAnalyticsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalyticsStore {
    async fn record(
        &self,
        key: AnalyticsKey,
        status: DeliveryStatus,
        dedup: Option<DedupKey>,
    ) -> Result<bool, StoreError> {
        // Dedup check, upsert and increment all happen under one write
        // lock acquisition: no lost updates under concurrent deliveries.
        let mut inner = self.inner.write().map_err(|_| poisoned("analytics"))?;

        if let Some(dedup) = dedup {
            if !inner.seen.insert(dedup) {
                return Ok(false);
            }
        }

        inner
            .rows
            .entry(key.clone())
            .or_insert_with(|| AnalyticsRow::empty(key))
            .apply(status);

        Ok(true)
    }

    async fn row(&self, key: &AnalyticsKey) -> Result<Option<AnalyticsRow>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("analytics"))?;
        Ok(inner.rows.get(key).cloned())
    }

    async fn rows(&self) -> Result<Vec<AnalyticsRow>, StoreError> {
        let inner = self.inner.read().map_err(|_| poisoned("analytics"))?;
        Ok(inner.rows.values().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| poisoned("analytics"))?;
        inner.rows.clear();
        inner.seen.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
