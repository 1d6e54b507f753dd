//! Tests for the in-memory store implementations.

use super::*;
use crate::{ChannelType, ProjectSlug, UserId, Vendor};
use chrono::NaiveDate;
use serde_json::json;

fn config() -> WebhookConfiguration {
    WebhookConfiguration::new(
        UserId::new(7),
        ProjectSlug::new("orders").unwrap(),
        Vendor::Gupshup,
        ChannelType::Whatsapp,
        Some("secret".to_string()),
    )
}

fn key(day: &str) -> AnalyticsKey {
    AnalyticsKey {
        user_id: UserId::new(7),
        vendor: Vendor::Gupshup,
        channel: ChannelType::Whatsapp,
        project: ProjectSlug::new("orders").unwrap(),
        day: day.parse::<NaiveDate>().unwrap(),
    }
}

// ============================================================================
// MemoryConfigStore Tests
// ============================================================================

#[tokio::test]
async fn test_resolve_finds_matching_configuration() {
    let config = config();
    let store = MemoryConfigStore::with_configs(vec![config.clone()]);

    let found = store
        .resolve(&config.project, config.vendor, config.channel)
        .await
        .unwrap();
    assert_eq!(found.unwrap().id, config.id);
}

#[tokio::test]
async fn test_resolve_misses_on_any_differing_component() {
    let config = config();
    let store = MemoryConfigStore::with_configs(vec![config.clone()]);

    let other_project = ProjectSlug::new("billing").unwrap();
    assert!(store
        .resolve(&other_project, config.vendor, config.channel)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .resolve(&config.project, Vendor::Twilio, config.channel)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .resolve(&config.project, config.vendor, ChannelType::Sms)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_resolve_returns_inactive_configurations() {
    let mut config = config();
    config.is_active = false;
    let store = MemoryConfigStore::with_configs(vec![config.clone()]);

    // Inactive configurations still resolve; rejection is the caller's.
    let found = store
        .resolve(&config.project, config.vendor, config.channel)
        .await
        .unwrap()
        .unwrap();
    assert!(!found.is_active);
}

#[tokio::test]
async fn test_set_active_and_rotate_secret() {
    let config = config();
    let id = config.id;
    let store = MemoryConfigStore::with_configs(vec![config.clone()]);

    assert!(store.set_active(id, false).await.unwrap());
    assert!(store
        .rotate_secret(id, Some("new-secret".to_string()))
        .await
        .unwrap());

    let found = store
        .resolve(&config.project, config.vendor, config.channel)
        .await
        .unwrap()
        .unwrap();
    assert!(!found.is_active);
    assert_eq!(found.secret.as_deref(), Some("new-secret"));

    assert!(!store.set_active(ConfigId::new(), true).await.unwrap());
}

// ============================================================================
// MemoryEventLedger Tests
// ============================================================================

#[tokio::test]
async fn test_upsert_same_reference_returns_same_message() {
    let config = config();
    let ledger = MemoryEventLedger::new();

    let first = ledger
        .upsert_message(&config, Some("gs-1"), Some("919812345678"))
        .await
        .unwrap();
    let second = ledger
        .upsert_message(&config, Some("gs-1"), None)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.recipient.as_deref(), Some("919812345678"));
}

#[tokio::test]
async fn test_upsert_scoped_per_configuration() {
    let config_a = config();
    let mut config_b = config();
    config_b.id = ConfigId::new();
    let ledger = MemoryEventLedger::new();

    let a = ledger
        .upsert_message(&config_a, Some("gs-1"), None)
        .await
        .unwrap();
    let b = ledger
        .upsert_message(&config_b, Some("gs-1"), None)
        .await
        .unwrap();
    assert_ne!(a.id, b.id);
}

#[tokio::test]
async fn test_null_reference_always_creates_fresh_message() {
    let config = config();
    let ledger = MemoryEventLedger::new();

    let a = ledger.upsert_message(&config, None, None).await.unwrap();
    let b = ledger.upsert_message(&config, None, None).await.unwrap();
    assert_ne!(a.id, b.id);
    assert!(a.vendor_message_ref.is_none());
}

#[tokio::test]
async fn test_append_event_requires_known_message() {
    let ledger = MemoryEventLedger::new();
    let event = MessageEvent::new(
        MessageId::new(),
        DeliveryStatus::Sent,
        None,
        None,
        Timestamp::now(),
        json!({}),
    );
    assert!(ledger.append_event(event).await.is_err());
}

#[tokio::test]
async fn test_events_for_message_ordered_by_occurred_at() {
    let config = config();
    let ledger = MemoryEventLedger::new();
    let message = ledger
        .upsert_message(&config, Some("gs-1"), None)
        .await
        .unwrap();

    let late = Timestamp::from_rfc3339("2024-03-01T12:00:00Z").unwrap();
    let early = Timestamp::from_rfc3339("2024-03-01T10:00:00Z").unwrap();

    // Delivered arrives before sent; occurred_at wins over arrival order.
    ledger
        .append_event(MessageEvent::new(
            message.id,
            DeliveryStatus::Delivered,
            None,
            Some("gs-1".to_string()),
            late,
            json!({}),
        ))
        .await
        .unwrap();
    ledger
        .append_event(MessageEvent::new(
            message.id,
            DeliveryStatus::Sent,
            None,
            Some("gs-1".to_string()),
            early,
            json!({}),
        ))
        .await
        .unwrap();

    let events = ledger.events_for_message(message.id).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].status, DeliveryStatus::Sent);
    assert_eq!(events[1].status, DeliveryStatus::Delivered);
}

#[tokio::test]
async fn test_all_events_joins_owning_messages() {
    let config = config();
    let ledger = MemoryEventLedger::new();
    let message = ledger
        .upsert_message(&config, Some("gs-1"), None)
        .await
        .unwrap();
    ledger
        .append_event(MessageEvent::new(
            message.id,
            DeliveryStatus::Sent,
            None,
            None,
            Timestamp::now(),
            json!({}),
        ))
        .await
        .unwrap();

    let all = ledger.all_events().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].0.id, message.id);
}

#[tokio::test]
async fn test_fill_vendor_ref_only_when_null() {
    let config = config();
    let ledger = MemoryEventLedger::new();
    let message = ledger.upsert_message(&config, None, None).await.unwrap();

    let unreferenced = MessageEvent::new(
        message.id,
        DeliveryStatus::Sent,
        None,
        None,
        Timestamp::now(),
        json!({}),
    );
    let referenced = MessageEvent::new(
        message.id,
        DeliveryStatus::Sent,
        None,
        Some("gs-1".to_string()),
        Timestamp::now(),
        json!({}),
    );
    let unreferenced_id = unreferenced.id;
    let referenced_id = referenced.id;
    ledger.append_event(unreferenced).await.unwrap();
    ledger.append_event(referenced).await.unwrap();

    assert!(ledger.fill_vendor_ref(unreferenced_id, "gs-2").await.unwrap());
    // Second fill is a no-op; existing references are never overwritten.
    assert!(!ledger.fill_vendor_ref(unreferenced_id, "gs-3").await.unwrap());
    assert!(!ledger.fill_vendor_ref(referenced_id, "gs-4").await.unwrap());
    assert!(!ledger.fill_vendor_ref(EventId::new(), "gs-5").await.unwrap());

    let events = ledger.events_for_message(message.id).await.unwrap();
    let filled = events.iter().find(|e| e.id == unreferenced_id).unwrap();
    assert_eq!(filled.vendor_ref.as_deref(), Some("gs-2"));
}

// ============================================================================
// MemoryAnalyticsStore Tests
// ============================================================================

#[tokio::test]
async fn test_record_increments_row() {
    let store = MemoryAnalyticsStore::new();
    let key = key("2024-03-01");

    assert!(store
        .record(key.clone(), DeliveryStatus::Sent, None)
        .await
        .unwrap());
    assert!(store
        .record(key.clone(), DeliveryStatus::Delivered, None)
        .await
        .unwrap());

    let row = store.row(&key).await.unwrap().unwrap();
    assert_eq!(row.sent, 1);
    assert_eq!(row.delivered, 1);
    assert!((row.success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_record_suppresses_duplicate_dedup_key() {
    let store = MemoryAnalyticsStore::new();
    let key = key("2024-03-01");
    let dedup = DedupKey {
        message_id: MessageId::new(),
        vendor_ref: "gs-1".to_string(),
        status: DeliveryStatus::Delivered,
    };

    assert!(store
        .record(key.clone(), DeliveryStatus::Delivered, Some(dedup.clone()))
        .await
        .unwrap());
    assert!(!store
        .record(key.clone(), DeliveryStatus::Delivered, Some(dedup))
        .await
        .unwrap());

    let row = store.row(&key).await.unwrap().unwrap();
    assert_eq!(row.delivered, 1);
}

#[tokio::test]
async fn test_record_without_dedup_always_counts() {
    let store = MemoryAnalyticsStore::new();
    let key = key("2024-03-01");

    store
        .record(key.clone(), DeliveryStatus::Sent, None)
        .await
        .unwrap();
    store
        .record(key.clone(), DeliveryStatus::Sent, None)
        .await
        .unwrap();

    let row = store.row(&key).await.unwrap().unwrap();
    assert_eq!(row.sent, 2);
}

#[tokio::test]
async fn test_days_bucket_independently() {
    let store = MemoryAnalyticsStore::new();
    store
        .record(key("2024-03-01"), DeliveryStatus::Sent, None)
        .await
        .unwrap();
    store
        .record(key("2024-03-02"), DeliveryStatus::Sent, None)
        .await
        .unwrap();

    assert_eq!(store.rows().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_clear_resets_rows_and_dedup_state() {
    let store = MemoryAnalyticsStore::new();
    let key = key("2024-03-01");
    let dedup = DedupKey {
        message_id: MessageId::new(),
        vendor_ref: "gs-1".to_string(),
        status: DeliveryStatus::Sent,
    };

    store
        .record(key.clone(), DeliveryStatus::Sent, Some(dedup.clone()))
        .await
        .unwrap();
    store.clear().await.unwrap();

    assert!(store.rows().await.unwrap().is_empty());
    // Dedup state cleared with the rows: the same key counts again.
    assert!(store
        .record(key, DeliveryStatus::Sent, Some(dedup))
        .await
        .unwrap());
}

// ============================================================================
// AnalyticsRow Tests
// ============================================================================

#[test]
fn test_success_rate_denominator_floor() {
    let mut row = AnalyticsRow::empty(key("2024-03-01"));
    // Delivered without a preceding sent: denominator floors at 1.
    row.apply(DeliveryStatus::Delivered);
    assert!((row.success_rate - 1.0).abs() < f64::EPSILON);

    row.apply(DeliveryStatus::Sent);
    row.apply(DeliveryStatus::Sent);
    assert!((row.success_rate - 0.5).abs() < f64::EPSILON);
}
