//! Tests for the offline backfill engine.

use super::*;
use crate::aggregate::AggregationUpdater;
use crate::store::{
    AnalyticsStore, MemoryAnalyticsStore, MemoryEventLedger, MessageEvent, WebhookConfiguration,
};
use crate::{ChannelType, ProjectSlug, Timestamp, UserId, Vendor};
use serde_json::{json, Value};

struct Fixture {
    ledger: Arc<MemoryEventLedger>,
    analytics: Arc<MemoryAnalyticsStore>,
    engine: BackfillEngine,
    config: WebhookConfiguration,
}

fn fixture() -> Fixture {
    let ledger = Arc::new(MemoryEventLedger::new());
    let analytics = Arc::new(MemoryAnalyticsStore::new());
    let engine = BackfillEngine::new(
        ledger.clone(),
        crate::adapters::AdapterRegistry::with_builtin_vendors(),
        Arc::new(StatusMapper::new()),
        Arc::new(ReferenceExtractor::new()),
        AggregationUpdater::new(analytics.clone()),
    );
    let config = WebhookConfiguration::new(
        UserId::new(7),
        ProjectSlug::new("orders").unwrap(),
        Vendor::Gupshup,
        ChannelType::Whatsapp,
        None,
    );
    Fixture {
        ledger,
        analytics,
        engine,
        config,
    }
}

async fn persist_raw(
    fx: &Fixture,
    vendor_ref: Option<&str>,
    status: DeliveryStatus,
    payload: Value,
) -> EventId {
    let message = fx
        .ledger
        .upsert_message(&fx.config, vendor_ref, None)
        .await
        .unwrap();
    let event = MessageEvent::new(
        message.id,
        status,
        None,
        vendor_ref.map(String::from),
        Timestamp::from_rfc3339("2024-03-01T10:00:00Z").unwrap(),
        payload,
    );
    let id = event.id;
    fx.ledger.append_event(event).await.unwrap();
    id
}

// ============================================================================
// Reference Repair Tests
// ============================================================================

#[tokio::test]
async fn test_repair_fills_recoverable_references() {
    let fx = fixture();
    // Stored without a reference, but the payload carries one.
    let fixable = persist_raw(
        &fx,
        None,
        DeliveryStatus::Sent,
        json!({ "eventType": "sent", "messageId": "gs-1" }),
    )
    .await;
    // Nothing extractable: stays null.
    persist_raw(&fx, None, DeliveryStatus::Sent, json!({ "eventType": "sent" })).await;
    // Already referenced: untouched.
    persist_raw(
        &fx,
        Some("gs-2"),
        DeliveryStatus::Delivered,
        json!({ "eventType": "delivered", "messageId": "gs-2" }),
    )
    .await;

    let report = fx.engine.repair_references(false).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.repaired, 1);
    assert_eq!(report.skipped, 1);

    let all = fx.ledger.all_events().await.unwrap();
    let filled = all.iter().find(|(_, e)| e.id == fixable).unwrap();
    assert_eq!(filled.1.vendor_ref.as_deref(), Some("gs-1"));
}

#[tokio::test]
async fn test_repair_dry_run_writes_nothing() {
    let fx = fixture();
    let fixable = persist_raw(
        &fx,
        None,
        DeliveryStatus::Sent,
        json!({ "eventType": "sent", "messageId": "gs-1" }),
    )
    .await;

    let report = fx.engine.repair_references(true).await.unwrap();
    assert_eq!(report.repaired, 1);

    let all = fx.ledger.all_events().await.unwrap();
    let untouched = all.iter().find(|(_, e)| e.id == fixable).unwrap();
    assert!(untouched.1.vendor_ref.is_none());
}

#[tokio::test]
async fn test_repair_is_idempotent() {
    let fx = fixture();
    persist_raw(
        &fx,
        None,
        DeliveryStatus::Sent,
        json!({ "eventType": "sent", "messageId": "gs-1" }),
    )
    .await;

    let first = fx.engine.repair_references(false).await.unwrap();
    assert_eq!(first.repaired, 1);

    let second = fx.engine.repair_references(false).await.unwrap();
    assert_eq!(second.repaired, 0);
    assert_eq!(second.skipped, 0);
}

// ============================================================================
// Status Drift Tests
// ============================================================================

#[tokio::test]
async fn test_drift_reported_without_rewriting_log() {
    let fx = fixture();
    // Stored under an older mapping as sent; the table now says delivered.
    let drifted = persist_raw(
        &fx,
        Some("gs-1"),
        DeliveryStatus::Sent,
        json!({ "eventType": "delivered", "messageId": "gs-1" }),
    )
    .await;
    // Stored status still agrees with the mapping.
    persist_raw(
        &fx,
        Some("gs-2"),
        DeliveryStatus::Read,
        json!({ "eventType": "message_read", "messageId": "gs-2" }),
    )
    .await;

    let (report, drifts) = fx.engine.report_status_drift().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.drifted, 1);
    assert_eq!(drifts.len(), 1);
    assert_eq!(drifts[0].event_id, drifted);
    assert_eq!(drifts[0].stored, DeliveryStatus::Sent);
    assert_eq!(drifts[0].remapped, DeliveryStatus::Delivered);

    // The log itself is never rewritten.
    let all = fx.ledger.all_events().await.unwrap();
    let stored = all.iter().find(|(_, e)| e.id == drifted).unwrap();
    assert_eq!(stored.1.status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn test_drift_skips_payloads_without_raw_status() {
    let fx = fixture();
    persist_raw(&fx, Some("gs-1"), DeliveryStatus::Sent, json!({})).await;

    let (report, drifts) = fx.engine.report_status_drift().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(drifts.is_empty());
}

// ============================================================================
// Rebuild Tests
// ============================================================================

#[tokio::test]
async fn test_rebuild_recomputes_from_log() {
    let fx = fixture();
    persist_raw(
        &fx,
        Some("gs-1"),
        DeliveryStatus::Delivered,
        json!({ "eventType": "delivered", "messageId": "gs-1" }),
    )
    .await;
    persist_raw(
        &fx,
        Some("gs-2"),
        DeliveryStatus::Failed,
        json!({ "eventType": "failed", "messageId": "gs-2" }),
    )
    .await;

    let applied = fx.engine.rebuild_aggregates().await.unwrap();
    assert_eq!(applied, 2);

    let rows = fx.analytics.rows().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].delivered, 1);
    assert_eq!(rows[0].failed, 1);
}
