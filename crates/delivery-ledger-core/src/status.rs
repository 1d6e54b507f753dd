//! Canonical status vocabulary and the vendor status mapper.
//!
//! [`StatusMapper`] is the single authoritative translation from raw
//! vendor status vocabulary into the four canonical statuses. The table
//! is built once at construction and never mutated; both the ingestion
//! pipeline and the offline backfill engine share one instance so the
//! two code paths cannot drift apart.
//!
//! The mapper is deliberately permissive: an unrecognized raw status is
//! defaulted to [`DeliveryStatus::Sent`] rather than rejected, because
//! every delivered event must update some counter.

use crate::Vendor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// DeliveryStatus
// ============================================================================

/// Canonical delivery status.
///
/// The only status vocabulary stored and analyzed downstream of the
/// vendor boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = crate::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            "failed" => Ok(Self::Failed),
            _ => Err(crate::ParseError::InvalidFormat {
                expected: "one of sent, delivered, read, failed".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// StatusMapper
// ============================================================================

/// Immutable lookup table from `(vendor, raw status)` to canonical status.
///
/// Lookups are case-insensitive. Numeric vendor status codes (msg91) go
/// through the same table keyed by their string form. Mapping is a pure
/// function with no I/O.
pub struct StatusMapper {
    table: HashMap<Vendor, HashMap<&'static str, DeliveryStatus>>,
}

impl StatusMapper {
    /// Build the mapping table for all supported vendors.
    pub fn new() -> Self {
        use DeliveryStatus::*;

        let mut table: HashMap<Vendor, HashMap<&'static str, DeliveryStatus>> = HashMap::new();

        // msg91 delivery reports carry numeric status codes as strings.
        table.insert(
            Vendor::Msg91,
            HashMap::from([
                ("1", Delivered),
                ("2", Failed),
                ("3", Failed),
                ("5", Failed),
                ("6", Sent),
                ("8", Sent),
                ("9", Failed),
                ("16", Failed),
                ("17", Failed),
                ("25", Sent),
                ("26", Sent),
                ("delivered", Delivered),
                ("failed", Failed),
                ("sent", Sent),
                ("rejected", Failed),
            ]),
        );

        // gupshup emits both bare event names and `message_*` event types.
        table.insert(
            Vendor::Gupshup,
            HashMap::from([
                ("enqueued", Sent),
                ("submitted", Sent),
                ("sent", Sent),
                ("delivered", Delivered),
                ("read", Read),
                ("failed", Failed),
                ("message_sent", Sent),
                ("message_delivered", Delivered),
                ("message_read", Read),
                ("message_failed", Failed),
            ]),
        );

        table.insert(
            Vendor::Twilio,
            HashMap::from([
                ("queued", Sent),
                ("accepted", Sent),
                ("scheduled", Sent),
                ("sending", Sent),
                ("sent", Sent),
                ("delivered", Delivered),
                ("read", Read),
                ("undelivered", Failed),
                ("failed", Failed),
                ("canceled", Failed),
            ]),
        );

        table.insert(
            Vendor::Sendgrid,
            HashMap::from([
                ("processed", Sent),
                ("deferred", Sent),
                ("delivered", Delivered),
                ("open", Read),
                ("click", Read),
                ("bounce", Failed),
                ("dropped", Failed),
                ("blocked", Failed),
                ("spamreport", Failed),
                ("unsubscribe", Failed),
            ]),
        );

        Self { table }
    }

    /// Map a raw vendor status to its canonical status.
    ///
    /// An entirely absent event name (empty string) and any raw status
    /// not present in the table both default to [`DeliveryStatus::Sent`].
    pub fn map(&self, vendor: Vendor, raw_status: &str) -> DeliveryStatus {
        let key = raw_status.trim().to_ascii_lowercase();
        if key.is_empty() {
            return DeliveryStatus::Sent;
        }

        self.table
            .get(&vendor)
            .and_then(|statuses| statuses.get(key.as_str()))
            .copied()
            .unwrap_or(DeliveryStatus::Sent)
    }

    /// Whether the table has an explicit entry for this raw status.
    ///
    /// Used by the backfill drift report to distinguish "mapped" from
    /// "defaulted" statuses.
    pub fn knows(&self, vendor: Vendor, raw_status: &str) -> bool {
        let key = raw_status.trim().to_ascii_lowercase();
        self.table
            .get(&vendor)
            .is_some_and(|statuses| statuses.contains_key(key.as_str()))
    }
}

impl Default for StatusMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
