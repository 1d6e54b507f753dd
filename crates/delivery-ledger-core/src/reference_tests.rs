//! Tests for the vendor reference extractor.

use super::*;
use serde_json::json;

fn extractor() -> ReferenceExtractor {
    ReferenceExtractor::new()
}

#[test]
fn test_first_candidate_wins() {
    let payload = json!({ "requestId": "r1", "messageId": "m1" });
    let result = extractor().extract(Vendor::Msg91, ChannelType::Sms, &payload);
    assert_eq!(result, Some("r1".to_string()));
}

#[test]
fn test_later_candidate_used_when_earlier_absent() {
    let payload = json!({ "messageId": "m1" });
    let result = extractor().extract(Vendor::Msg91, ChannelType::Sms, &payload);
    assert_eq!(result, Some("m1".to_string()));
}

#[test]
fn test_dotted_path_resolves_nested_fields() {
    let payload = json!({ "payload": { "id": "gs-123" } });
    let result = extractor().extract(Vendor::Gupshup, ChannelType::Whatsapp, &payload);
    assert_eq!(result, Some("gs-123".to_string()));
}

#[test]
fn test_numeric_reference_stringified() {
    let payload = json!({ "payload": { "id": 98765 } });
    let result = extractor().extract(Vendor::Gupshup, ChannelType::Whatsapp, &payload);
    assert_eq!(result, Some("98765".to_string()));
}

#[test]
fn test_empty_and_null_values_skipped() {
    let payload = json!({ "requestId": "", "request_id": null, "messageId": "m1" });
    let result = extractor().extract(Vendor::Msg91, ChannelType::Sms, &payload);
    assert_eq!(result, Some("m1".to_string()));
}

#[test]
fn test_no_candidate_present_yields_none() {
    let payload = json!({ "something": "else" });
    let result = extractor().extract(Vendor::Msg91, ChannelType::Sms, &payload);
    assert_eq!(result, None);
}

#[test]
fn test_channel_without_entry_falls_back_to_first() {
    // Twilio only lists sms; whatsapp resolves through the same fields.
    let payload = json!({ "MessageSid": "SM123" });
    let result = extractor().extract(Vendor::Twilio, ChannelType::Whatsapp, &payload);
    assert_eq!(result, Some("SM123".to_string()));
}

#[test]
fn test_channel_specific_lists_differ() {
    let payload = json!({ "externalId": "e1", "messageId": "m1" });
    let sms = extractor().extract(Vendor::Gupshup, ChannelType::Sms, &payload);
    let whatsapp = extractor().extract(Vendor::Gupshup, ChannelType::Whatsapp, &payload);
    assert_eq!(sms, Some("e1".to_string()));
    assert_eq!(whatsapp, Some("m1".to_string()));
}

#[test]
fn test_sendgrid_hyphenated_field() {
    let payload = json!({ "smtp-id": "<abc@mail>" });
    let result = extractor().extract(Vendor::Sendgrid, ChannelType::Email, &payload);
    assert_eq!(result, Some("<abc@mail>".to_string()));
}
