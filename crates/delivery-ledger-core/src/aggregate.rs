//! Aggregation updater for the analytics cache.
//!
//! On each persisted event, applies one counter delta to the
//! analytics_cache row keyed by (user, vendor, channel, project, UTC day
//! of the event's occurred_at). The increment is a single atomic upsert
//! in the store, and it is deduplicated by (message, vendor reference,
//! status) so a vendor retry never double-counts.
//!
//! The cache is derived state: [`AggregationUpdater::rebuild`] recomputes
//! every row from scratch by replaying the event log, and must produce
//! exactly what incremental ingestion produced.

use crate::store::{AnalyticsKey, AnalyticsStore, DedupKey, EventLedger, Message, MessageEvent};
use crate::StoreError;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies per-event counter deltas and rebuilds the cache from the log.
#[derive(Clone)]
pub struct AggregationUpdater {
    analytics: Arc<dyn AnalyticsStore>,
}

impl AggregationUpdater {
    /// Create an updater over an analytics store.
    pub fn new(analytics: Arc<dyn AnalyticsStore>) -> Self {
        Self { analytics }
    }

    /// Apply one event's delta to its analytics row.
    ///
    /// Returns whether the counter was incremented (`false` when the
    /// dedup key had already been counted).
    pub async fn apply(
        &self,
        message: &Message,
        event: &MessageEvent,
    ) -> Result<bool, StoreError> {
        let key = AnalyticsKey {
            user_id: message.user_id,
            vendor: message.vendor,
            channel: message.channel,
            project: message.project.clone(),
            day: event.occurred_at.day(),
        };

        // Events without a vendor reference cannot be deduplicated; they
        // always count.
        let dedup = event.vendor_ref.as_ref().map(|vendor_ref| DedupKey {
            message_id: message.id,
            vendor_ref: vendor_ref.clone(),
            status: event.status,
        });

        let applied = self.analytics.record(key, event.status, dedup).await?;
        if !applied {
            debug!(
                event_id = %event.id,
                message_id = %message.id,
                status = %event.status,
                "Duplicate delivery suppressed at aggregation boundary"
            );
        }
        Ok(applied)
    }

    /// Recompute every analytics row by replaying the full event log
    /// against an empty cache.
    ///
    /// Returns the number of applied (non-duplicate) increments.
    pub async fn rebuild(&self, ledger: &dyn EventLedger) -> Result<usize, StoreError> {
        self.analytics.clear().await?;

        let mut applied = 0;
        for (message, event) in ledger.all_events().await? {
            if self.apply(&message, &event).await? {
                applied += 1;
            }
        }

        info!(applied, "Rebuilt analytics cache from event log");
        Ok(applied)
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
