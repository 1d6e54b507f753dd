//! msg91 delivery-report adapter.
//!
//! msg91 posts SMS delivery reports in several shapes, all observed in
//! production traffic:
//!
//! ```text
//! { "requestId": "r1", "report": [ { "status": 1, ... }, ... ] }
//! { "data": [ { "requestId": "r1", "report": [ ... ] }, ... ] }
//! [ { "requestId": "r1", "report": [ ... ] }, ... ]
//! ```
//!
//! Statuses arrive as numeric codes (`1` delivered, `16` rejected, ...)
//! or occasionally as words. The batch-level `requestId` is the only
//! correlation identifier, so it is merged into each flattened item's
//! payload echo before storage.

use super::{string_field, stringy_field, AdapterError, AdapterOutput, RawEvent, VendorAdapter};
use crate::{ChannelType, Timestamp, Vendor};
use serde_json::Value;

/// Adapter for msg91 SMS delivery reports.
pub struct Msg91Adapter;

impl VendorAdapter for Msg91Adapter {
    fn vendor(&self) -> Vendor {
        Vendor::Msg91
    }

    fn parse(&self, body: &[u8], _channel: ChannelType) -> Result<AdapterOutput, AdapterError> {
        let root: Value = serde_json::from_slice(body)?;

        let batches: Vec<&Value> = match &root {
            Value::Array(items) => items.iter().collect(),
            Value::Object(obj) => match obj.get("data") {
                Some(Value::Array(items)) => items.iter().collect(),
                _ => vec![&root],
            },
            _ => {
                return Err(AdapterError::UnrecognizedShape {
                    vendor: Vendor::Msg91,
                })
            }
        };

        let mut output = AdapterOutput::default();
        for batch in batches {
            let Some(batch_obj) = batch.as_object() else {
                output.skipped += 1;
                continue;
            };

            let request_id =
                stringy_field(batch, "requestId").or_else(|| stringy_field(batch, "request_id"));

            let items: Vec<&Value> = match batch_obj.get("report") {
                Some(Value::Array(items)) => items.iter().collect(),
                // A batch without a report array is itself a single item.
                None => vec![batch],
                Some(_) => {
                    output.skipped += 1;
                    continue;
                }
            };

            for item in items {
                match flatten_item(item, request_id.as_deref()) {
                    Some(event) => output.events.push(event),
                    None => output.skipped += 1,
                }
            }
        }

        Ok(output)
    }

    fn raw_status_of(&self, payload: &Value) -> Option<String> {
        stringy_field(payload, "status")
    }
}

fn flatten_item(item: &Value, request_id: Option<&str>) -> Option<RawEvent> {
    let obj = item.as_object()?;

    let mut echo = obj.clone();
    if let Some(request_id) = request_id {
        // Batch-level correlation id, inherited by each report item.
        echo.entry("requestId".to_string())
            .or_insert_with(|| Value::String(request_id.to_string()));
    }
    let payload = Value::Object(echo);

    let raw_status = stringy_field(&payload, "status").unwrap_or_default();
    let raw_reason = string_field(&payload, "desc").or_else(|| string_field(&payload, "failure"));
    let recipient =
        stringy_field(&payload, "number").or_else(|| stringy_field(&payload, "telNum"));
    let occurred_at = string_field(&payload, "date")
        .or_else(|| string_field(&payload, "deliveryTime"))
        .and_then(|s| Timestamp::from_rfc3339(&s).ok());

    Some(RawEvent {
        vendor_ref: None,
        raw_status,
        raw_reason,
        recipient,
        occurred_at,
        payload,
    })
}

#[cfg(test)]
#[path = "msg91_tests.rs"]
mod tests;
