//! Twilio status-callback adapter (SMS and WhatsApp).
//!
//! Twilio posts one status callback per event, with PascalCase fields:
//!
//! ```text
//! { "MessageSid": "SM...", "MessageStatus": "delivered", "To": "+1..." }
//! ```
//!
//! WhatsApp deliveries use the identical shape with a `whatsapp:` prefix
//! on addresses. An array body is tolerated for relays that batch.

use super::{string_field, stringy_field, AdapterError, AdapterOutput, RawEvent, VendorAdapter};
use crate::{ChannelType, Vendor};
use serde_json::Value;

/// Adapter for Twilio message status callbacks.
pub struct TwilioAdapter;

impl VendorAdapter for TwilioAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Twilio
    }

    fn parse(&self, body: &[u8], _channel: ChannelType) -> Result<AdapterOutput, AdapterError> {
        let root: Value = serde_json::from_slice(body)?;

        let items: Vec<&Value> = match &root {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&root],
            _ => {
                return Err(AdapterError::UnrecognizedShape {
                    vendor: Vendor::Twilio,
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
        string_field(payload, "MessageStatus").or_else(|| string_field(payload, "SmsStatus"))
    }
}

fn flatten_item(item: &Value) -> Option<RawEvent> {
    if !item.is_object() {
        return None;
    }

    let raw_status = string_field(item, "MessageStatus")
        .or_else(|| string_field(item, "SmsStatus"))
        .unwrap_or_default();

    let raw_reason = string_field(item, "ErrorMessage")
        .or_else(|| stringy_field(item, "ErrorCode").map(|code| format!("error code {code}")));

    Some(RawEvent {
        vendor_ref: string_field(item, "MessageSid").or_else(|| string_field(item, "SmsSid")),
        raw_status,
        raw_reason,
        recipient: string_field(item, "To"),
        occurred_at: None,
        payload: item.clone(),
    })
}

#[cfg(test)]
#[path = "twilio_tests.rs"]
mod tests;
