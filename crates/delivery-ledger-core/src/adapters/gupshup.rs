//! gupshup event adapter (WhatsApp and SMS).
//!
//! gupshup delivers two generations of callback shape, sometimes batched
//! in a top-level array:
//!
//! ```text
//! { "eventType": "message_read", "messageId": "m1", "destination": "..." }
//! { "type": "message-event", "payload": { "type": "delivered", "id": "...", ... } }
//! ```
//!
//! The event name maps through the shared status table either way.

use super::{string_field, stringy_field, AdapterError, AdapterOutput, RawEvent, VendorAdapter};
use crate::{ChannelType, Timestamp, Vendor};
use serde_json::Value;

/// Adapter for gupshup message-event callbacks.
pub struct GupshupAdapter;

impl VendorAdapter for GupshupAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Gupshup
    }

    fn parse(&self, body: &[u8], _channel: ChannelType) -> Result<AdapterOutput, AdapterError> {
        let root: Value = serde_json::from_slice(body)?;

        let items: Vec<&Value> = match &root {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&root],
            _ => {
                return Err(AdapterError::UnrecognizedShape {
                    vendor: Vendor::Gupshup,
                })
            }
        };

        let mut output = AdapterOutput::default();
        for item in items {
            match flatten_item(item) {
                Some(event) => output.events.push(event),
                None => output.skipped += 1,
            }
        }

        Ok(output)
    }

    fn raw_status_of(&self, payload: &Value) -> Option<String> {
        string_field(payload, "eventType").or_else(|| {
            payload
                .get("payload")
                .and_then(|inner| string_field(inner, "type"))
        })
    }
}

fn flatten_item(item: &Value) -> Option<RawEvent> {
    if !item.is_object() {
        return None;
    }

    let inner = item.get("payload").filter(|p| p.is_object());

    // v2 shape nests the event under `payload.type`; v1 carries a
    // top-level `eventType`.
    let raw_status = string_field(item, "eventType")
        .or_else(|| inner.and_then(|p| string_field(p, "type")))
        .unwrap_or_default();

    let raw_reason = inner
        .and_then(|p| p.get("payload"))
        .and_then(|detail| string_field(detail, "reason"))
        .or_else(|| string_field(item, "reason"));

    let recipient = string_field(item, "destination")
        .or_else(|| inner.and_then(|p| string_field(p, "destination")))
        .or_else(|| string_field(item, "recipient"));

    let occurred_at = item
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(Timestamp::from_epoch);

    let vendor_ref = string_field(item, "messageId")
        .or_else(|| inner.and_then(|p| stringy_field(p, "id")));

    Some(RawEvent {
        vendor_ref,
        raw_status,
        raw_reason,
        recipient,
        occurred_at,
        payload: item.clone(),
    })
}

#[cfg(test)]
#[path = "gupshup_tests.rs"]
mod tests;
