//! Reference extractor for vendor message identifiers.
//!
//! Vendors bury their message/event identifier in different fields, often
//! nested (`message.messageId`, `payload.id`). [`ReferenceExtractor`]
//! recovers it from a parsed payload by trying an ordered list of
//! candidate field paths per `(vendor, channel)`.
//!
//! A `None` result is not an error: the event is still stored, it just
//! cannot be correlated for idempotency or backfill purposes.

use crate::{ChannelType, Vendor};
use serde_json::Value;
use std::collections::HashMap;

/// Ordered candidate field paths per vendor and channel.
///
/// Built once at construction; read-only afterwards. Both the ingestion
/// pipeline and the backfill engine share one instance.
pub struct ReferenceExtractor {
    // Per vendor: ordered (channel, candidate paths). The first entry
    // doubles as the fallback for channels without their own entry.
    table: HashMap<Vendor, Vec<(ChannelType, Vec<&'static str>)>>,
}

impl ReferenceExtractor {
    /// Build the candidate-field table for all supported vendors.
    pub fn new() -> Self {
        let mut table: HashMap<Vendor, Vec<(ChannelType, Vec<&'static str>)>> = HashMap::new();

        table.insert(
            Vendor::Msg91,
            vec![(
                ChannelType::Sms,
                vec!["requestId", "request_id", "messageId"],
            )],
        );

        table.insert(
            Vendor::Gupshup,
            vec![
                (
                    ChannelType::Whatsapp,
                    vec!["messageId", "payload.id", "payload.gsId", "externalId"],
                ),
                (ChannelType::Sms, vec!["externalId", "messageId"]),
            ],
        );

        // Twilio reports WhatsApp deliveries with the same payload shape
        // as SMS; whatsapp resolves through the sms fallback.
        table.insert(
            Vendor::Twilio,
            vec![(ChannelType::Sms, vec!["MessageSid", "SmsSid"])],
        );

        table.insert(
            Vendor::Sendgrid,
            vec![(
                ChannelType::Email,
                vec!["sg_message_id", "smtp-id", "sg_event_id"],
            )],
        );

        Self { table }
    }

    /// Extract the vendor's message reference from a parsed payload.
    ///
    /// Candidate paths are tried in priority order; the first non-empty
    /// value wins. A `(vendor, channel)` pair without a table entry falls
    /// back to the vendor's first channel list before giving up.
    pub fn extract(&self, vendor: Vendor, channel: ChannelType, payload: &Value) -> Option<String> {
        let entries = self.table.get(&vendor)?;

        let paths = entries
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, paths)| paths)
            .or_else(|| entries.first().map(|(_, paths)| paths))?;

        paths
            .iter()
            .find_map(|path| lookup_path(payload, path).and_then(value_as_reference))
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a dotted field path (`payload.id`) inside a JSON value.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Convert a JSON leaf into a non-empty reference string.
fn value_as_reference(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "reference_tests.rs"]
mod tests;
