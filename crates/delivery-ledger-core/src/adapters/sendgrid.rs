//! SendGrid event-webhook adapter (email).
//!
//! SendGrid always batches, posting an array of event objects:
//!
//! ```text
//! [ { "event": "open", "email": "a@b.c", "sg_message_id": "...",
//!     "timestamp": 1700000000 }, ... ]
//! ```
//!
//! A bare object is tolerated for manual replays.

use super::{string_field, AdapterError, AdapterOutput, RawEvent, VendorAdapter};
use crate::{ChannelType, Timestamp, Vendor};
use serde_json::Value;

/// Adapter for SendGrid event-webhook batches.
pub struct SendgridAdapter;

impl VendorAdapter for SendgridAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Sendgrid
    }

    fn parse(&self, body: &[u8], _channel: ChannelType) -> Result<AdapterOutput, AdapterError> {
        let root: Value = serde_json::from_slice(body)?;

        let items: Vec<&Value> = match &root {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&root],
            _ => {
                return Err(AdapterError::UnrecognizedShape {
                    vendor: Vendor::Sendgrid,
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
        string_field(payload, "event")
    }
}

fn flatten_item(item: &Value) -> Option<RawEvent> {
    if !item.is_object() {
        return None;
    }

    let occurred_at = item
        .get("timestamp")
        .and_then(Value::as_i64)
        .and_then(Timestamp::from_epoch);

    Some(RawEvent {
        vendor_ref: string_field(item, "sg_message_id")
            .or_else(|| string_field(item, "sg_event_id")),
        raw_status: string_field(item, "event").unwrap_or_default(),
        raw_reason: string_field(item, "reason").or_else(|| string_field(item, "response")),
        recipient: string_field(item, "email"),
        occurred_at,
        payload: item.clone(),
    })
}

#[cfg(test)]
#[path = "sendgrid_tests.rs"]
mod tests;
