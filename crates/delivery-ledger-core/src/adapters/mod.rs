//! Vendor payload adapters.
//!
//! Each messaging vendor delivers status callbacks in its own shape: a
//! single event object, an array of events, or nested batch structures.
//! A [`VendorAdapter`] flattens whatever its vendor sends into a list of
//! [`RawEvent`]s, preserving the original per-item payload verbatim for
//! forensic storage.
//!
//! Adapters are pure: no I/O, no persistence. Dispatch happens through
//! [`AdapterRegistry`], built once at startup and read-only during
//! request handling — adding a vendor means registering a new adapter,
//! not editing a central conditional.

use crate::{ChannelType, Timestamp, Vendor};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

mod gupshup;
mod msg91;
mod sendgrid;
mod twilio;

pub use gupshup::GupshupAdapter;
pub use msg91::Msg91Adapter;
pub use sendgrid::SendgridAdapter;
pub use twilio::TwilioAdapter;

// ============================================================================
// Core Types
// ============================================================================

/// One vendor status observation, flattened out of a webhook body.
///
/// `payload` echoes the original per-item JSON (with batch-level
/// correlation fields merged in) and is stored verbatim on the resulting
/// event, regardless of how much typed parsing succeeded.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Vendor's own identifier for the message or event, when the adapter
    /// can see it directly. The reference extractor runs over `payload`
    /// either way.
    pub vendor_ref: Option<String>,
    /// Raw vendor status vocabulary; empty when the event name is absent
    /// (the status mapper defaults it).
    pub raw_status: String,
    /// Human-readable failure or status reason, when present.
    pub raw_reason: Option<String>,
    /// Recipient address, when present.
    pub recipient: Option<String>,
    /// Vendor-reported event time; arrival time is used when absent.
    pub occurred_at: Option<Timestamp>,
    /// Verbatim per-item payload for forensic replay.
    pub payload: Value,
}

/// Result of parsing one webhook body.
#[derive(Debug, Default)]
pub struct AdapterOutput {
    /// Successfully flattened events, in payload order.
    pub events: Vec<RawEvent>,
    /// Malformed sub-items skipped while processing the rest of the batch.
    pub skipped: usize,
}

/// Errors that fail the whole request body.
///
/// Per-sub-item problems never surface here; they are absorbed into
/// [`AdapterOutput::skipped`].
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Payload shape not recognized for vendor {vendor}")]
    UnrecognizedShape { vendor: Vendor },
}

// ============================================================================
// VendorAdapter
// ============================================================================

/// Pure mapping from a vendor-specific webhook body to canonical raw events.
pub trait VendorAdapter: Send + Sync {
    /// Vendor this adapter handles.
    fn vendor(&self) -> Vendor;

    /// Flatten a raw webhook body into zero or more [`RawEvent`]s.
    ///
    /// Must never fail on a single malformed sub-item: skip it, count it
    /// in [`AdapterOutput::skipped`], and process the rest of the batch.
    fn parse(&self, body: &[u8], channel: ChannelType) -> Result<AdapterOutput, AdapterError>;

    /// Re-extract the raw vendor status from a stored per-item payload.
    ///
    /// Used by the offline backfill engine to detect drift between stored
    /// canonical statuses and what the mapping table says today.
    fn raw_status_of(&self, payload: &Value) -> Option<String>;
}

// ============================================================================
// AdapterRegistry
// ============================================================================

/// Registry mapping vendors to their adapters.
///
/// Built once at startup and used read-only during request handling.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Vendor, Arc<dyn VendorAdapter>>,
}

impl AdapterRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in vendor adapter.
    pub fn with_builtin_vendors() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(Msg91Adapter))
            .register(Arc::new(GupshupAdapter))
            .register(Arc::new(TwilioAdapter))
            .register(Arc::new(SendgridAdapter));
        registry
    }

    /// Register an adapter under its vendor. Replaces any existing entry.
    pub fn register(&mut self, adapter: Arc<dyn VendorAdapter>) -> &mut Self {
        self.adapters.insert(adapter.vendor(), adapter);
        self
    }

    /// Look up the adapter for a vendor.
    pub fn get(&self, vendor: Vendor) -> Option<Arc<dyn VendorAdapter>> {
        self.adapters.get(&vendor).cloned()
    }

    /// Check whether a vendor has a registered adapter.
    pub fn contains(&self, vendor: Vendor) -> bool {
        self.adapters.contains_key(&vendor)
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Read a string field off a JSON object, trimmed, `None` when empty.
pub(crate) fn string_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Read a field as a string, stringifying numbers (msg91 status codes).
pub(crate) fn stringy_field(obj: &Value, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
