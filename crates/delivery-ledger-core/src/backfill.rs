//! Offline backfill and repair engine.
//!
//! Operates on stored raw payloads after the fact, using the same shared
//! extractor and mapper instances as live ingestion:
//!
//! - re-extract vendor references for events stored with a null
//!   `vendor_ref` (the one permitted event mutation);
//! - report drift between stored canonical statuses and what today's
//!   mapping tables produce, without rewriting the log;
//! - rebuild the analytics cache from the event log.
//!
//! All operations are idempotent; running them twice changes nothing the
//! second time.

use crate::adapters::AdapterRegistry;
use crate::aggregate::AggregationUpdater;
use crate::reference::ReferenceExtractor;
use crate::status::{DeliveryStatus, StatusMapper};
use crate::store::{EventLedger, StoreError};
use crate::{EventId, MessageId};
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Events examined.
    pub scanned: usize,
    /// Null references filled (or fillable, under `dry_run`).
    pub repaired: usize,
    /// Events whose stored status disagrees with today's mapping.
    pub drifted: usize,
    /// Events that could not be repaired (no extractable reference, or no
    /// adapter for the vendor).
    pub skipped: usize,
}

/// One stored event whose canonical status no longer matches the mapping
/// tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusDrift {
    pub event_id: EventId,
    pub message_id: MessageId,
    pub raw_status: String,
    pub stored: DeliveryStatus,
    pub remapped: DeliveryStatus,
}

/// Offline repair over the event log.
pub struct BackfillEngine {
    ledger: Arc<dyn EventLedger>,
    adapters: AdapterRegistry,
    mapper: Arc<StatusMapper>,
    extractor: Arc<ReferenceExtractor>,
    aggregator: AggregationUpdater,
}

impl BackfillEngine {
    /// Wire an engine over a ledger.
    ///
    /// The mapper and extractor must be the same instances live ingestion
    /// uses, so repair cannot apply different rules than intake did.
    pub fn new(
        ledger: Arc<dyn EventLedger>,
        adapters: AdapterRegistry,
        mapper: Arc<StatusMapper>,
        extractor: Arc<ReferenceExtractor>,
        aggregator: AggregationUpdater,
    ) -> Self {
        Self {
            ledger,
            adapters,
            mapper,
            extractor,
            aggregator,
        }
    }

    /// Re-run reference extraction over events stored without a vendor
    /// reference and fill the ones that now resolve.
    ///
    /// With `dry_run` set, counts what would be repaired without writing.
    pub async fn repair_references(&self, dry_run: bool) -> Result<BackfillReport, StoreError> {
        let mut report = BackfillReport::default();

        for (message, event) in self.ledger.all_events().await? {
            report.scanned += 1;
            if event.vendor_ref.is_some() {
                continue;
            }

            let vendor_ref =
                self.extractor
                    .extract(message.vendor, message.channel, &event.raw_payload);
            match vendor_ref {
                Some(vendor_ref) => {
                    if dry_run {
                        report.repaired += 1;
                    } else if self.ledger.fill_vendor_ref(event.id, &vendor_ref).await? {
                        report.repaired += 1;
                    }
                }
                None => report.skipped += 1,
            }
        }

        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            skipped = report.skipped,
            dry_run,
            "Reference repair pass complete"
        );
        Ok(report)
    }

    /// Compare every stored status against what today's mapping tables
    /// produce from the stored raw payload.
    ///
    /// The log is append-only, so drift is reported rather than rewritten;
    /// after a mapping-table change, [`Self::rebuild_aggregates`] brings
    /// the cache in line with the log as stored.
    pub async fn report_status_drift(
        &self,
    ) -> Result<(BackfillReport, Vec<StatusDrift>), StoreError> {
        let mut report = BackfillReport::default();
        let mut drifts = Vec::new();

        for (message, event) in self.ledger.all_events().await? {
            report.scanned += 1;

            let Some(adapter) = self.adapters.get(message.vendor) else {
                report.skipped += 1;
                continue;
            };
            let Some(raw_status) = adapter.raw_status_of(&event.raw_payload) else {
                report.skipped += 1;
                continue;
            };

            let remapped = self.mapper.map(message.vendor, &raw_status);
            if remapped != event.status {
                warn!(
                    event_id = %event.id,
                    message_id = %message.id,
                    raw_status = %raw_status,
                    stored = %event.status,
                    remapped = %remapped,
                    "Stored status drifts from current mapping"
                );
                report.drifted += 1;
                drifts.push(StatusDrift {
                    event_id: event.id,
                    message_id: message.id,
                    raw_status,
                    stored: event.status,
                    remapped,
                });
            }
        }

        info!(
            scanned = report.scanned,
            drifted = report.drifted,
            skipped = report.skipped,
            "Status drift report complete"
        );
        Ok((report, drifts))
    }

    /// Recompute the analytics cache from the event log. Returns the
    /// number of applied increments.
    pub async fn rebuild_aggregates(&self) -> Result<usize, StoreError> {
        self.aggregator.rebuild(self.ledger.as_ref()).await
    }
}

#[cfg(test)]
#[path = "backfill_tests.rs"]
mod tests;
