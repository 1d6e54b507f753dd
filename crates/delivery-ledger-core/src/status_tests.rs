//! Tests for the canonical status vocabulary and the status mapper.

use super::*;

fn mapper() -> StatusMapper {
    StatusMapper::new()
}

// ============================================================================
// DeliveryStatus Tests
// ============================================================================

#[test]
fn test_status_slug_roundtrip() {
    for status in [
        DeliveryStatus::Sent,
        DeliveryStatus::Delivered,
        DeliveryStatus::Read,
        DeliveryStatus::Failed,
    ] {
        let parsed: DeliveryStatus = status.as_str().parse().unwrap();
        assert_eq!(status, parsed);
    }
}

#[test]
fn test_status_serializes_lowercase() {
    let json = serde_json::to_string(&DeliveryStatus::Delivered).unwrap();
    assert_eq!(json, "\"delivered\"");
}

// ============================================================================
// StatusMapper Tests
// ============================================================================

#[test]
fn test_mapping_is_case_insensitive_and_trimmed() {
    let m = mapper();
    assert_eq!(
        m.map(Vendor::Gupshup, "DELIVERED"),
        DeliveryStatus::Delivered
    );
    assert_eq!(
        m.map(Vendor::Twilio, "  undelivered  "),
        DeliveryStatus::Failed
    );
}

#[test]
fn test_unknown_status_defaults_to_sent() {
    let m = mapper();
    assert_eq!(
        m.map(Vendor::Gupshup, "some_future_event"),
        DeliveryStatus::Sent
    );
}

#[test]
fn test_absent_status_defaults_to_sent() {
    let m = mapper();
    assert_eq!(m.map(Vendor::Msg91, ""), DeliveryStatus::Sent);
    assert_eq!(m.map(Vendor::Msg91, "   "), DeliveryStatus::Sent);
}

#[test]
fn test_msg91_numeric_codes() {
    let m = mapper();
    assert_eq!(m.map(Vendor::Msg91, "1"), DeliveryStatus::Delivered);
    assert_eq!(m.map(Vendor::Msg91, "16"), DeliveryStatus::Failed);
    assert_eq!(m.map(Vendor::Msg91, "25"), DeliveryStatus::Sent);
}

#[test]
fn test_gupshup_event_type_variants() {
    let m = mapper();
    assert_eq!(m.map(Vendor::Gupshup, "message_read"), DeliveryStatus::Read);
    assert_eq!(m.map(Vendor::Gupshup, "read"), DeliveryStatus::Read);
    assert_eq!(m.map(Vendor::Gupshup, "enqueued"), DeliveryStatus::Sent);
}

#[test]
fn test_twilio_terminal_failures() {
    let m = mapper();
    assert_eq!(m.map(Vendor::Twilio, "undelivered"), DeliveryStatus::Failed);
    assert_eq!(m.map(Vendor::Twilio, "canceled"), DeliveryStatus::Failed);
    assert_eq!(m.map(Vendor::Twilio, "queued"), DeliveryStatus::Sent);
}

#[test]
fn test_sendgrid_engagement_maps_to_read() {
    let m = mapper();
    assert_eq!(m.map(Vendor::Sendgrid, "open"), DeliveryStatus::Read);
    assert_eq!(m.map(Vendor::Sendgrid, "click"), DeliveryStatus::Read);
    assert_eq!(m.map(Vendor::Sendgrid, "bounce"), DeliveryStatus::Failed);
}

#[test]
fn test_mapping_scoped_per_vendor() {
    let m = mapper();
    // "open" only means something for sendgrid; elsewhere it defaults.
    assert_eq!(m.map(Vendor::Twilio, "open"), DeliveryStatus::Sent);
}

#[test]
fn test_mapping_is_pure() {
    let m = mapper();
    let first = m.map(Vendor::Msg91, "1");
    let second = m.map(Vendor::Msg91, "1");
    assert_eq!(first, second);
}

#[test]
fn test_knows_distinguishes_mapped_from_defaulted() {
    let m = mapper();
    assert!(m.knows(Vendor::Msg91, "1"));
    assert!(m.knows(Vendor::Gupshup, "MESSAGE_READ"));
    assert!(!m.knows(Vendor::Gupshup, "some_future_event"));
}
