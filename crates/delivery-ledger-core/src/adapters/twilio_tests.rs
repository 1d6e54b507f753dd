//! Tests for the Twilio status-callback adapter.

use super::*;
use crate::adapters::VendorAdapter;
use serde_json::json;

fn parse(body: serde_json::Value) -> AdapterOutput {
    TwilioAdapter
        .parse(body.to_string().as_bytes(), ChannelType::Sms)
        .unwrap()
}

#[test]
fn test_single_callback() {
    let output = parse(json!({
        "MessageSid": "SM1234",
        "MessageStatus": "delivered",
        "To": "+15551234567"
    }));
    assert_eq!(output.events.len(), 1);

    let event = &output.events[0];
    assert_eq!(event.vendor_ref.as_deref(), Some("SM1234"));
    assert_eq!(event.raw_status, "delivered");
    assert_eq!(event.recipient.as_deref(), Some("+15551234567"));
    assert!(event.occurred_at.is_none());
}

#[test]
fn test_legacy_sms_fields() {
    let output = parse(json!({ "SmsSid": "SM9", "SmsStatus": "sent" }));
    assert_eq!(output.events[0].vendor_ref.as_deref(), Some("SM9"));
    assert_eq!(output.events[0].raw_status, "sent");
}

#[test]
fn test_error_code_becomes_reason() {
    let output = parse(json!({
        "MessageSid": "SM1",
        "MessageStatus": "undelivered",
        "ErrorCode": 30006
    }));
    assert_eq!(
        output.events[0].raw_reason.as_deref(),
        Some("error code 30006")
    );
}

#[test]
fn test_error_message_preferred_over_code() {
    let output = parse(json!({
        "MessageSid": "SM1",
        "MessageStatus": "failed",
        "ErrorMessage": "landline unreachable",
        "ErrorCode": 30006
    }));
    assert_eq!(
        output.events[0].raw_reason.as_deref(),
        Some("landline unreachable")
    );
}

#[test]
fn test_whatsapp_prefixed_address() {
    let output = parse(json!({
        "MessageSid": "SM2",
        "MessageStatus": "read",
        "To": "whatsapp:+15551234567"
    }));
    assert_eq!(
        output.events[0].recipient.as_deref(),
        Some("whatsapp:+15551234567")
    );
}

#[test]
fn test_relay_batched_array() {
    let output = parse(json!([
        { "MessageSid": "SM1", "MessageStatus": "sent" },
        { "MessageSid": "SM2", "MessageStatus": "delivered" },
        17
    ]));
    assert_eq!(output.events.len(), 2);
    assert_eq!(output.skipped, 1);
}

#[test]
fn test_raw_status_of() {
    let payload = json!({ "SmsStatus": "delivered" });
    assert_eq!(
        TwilioAdapter.raw_status_of(&payload),
        Some("delivered".to_string())
    );
}
