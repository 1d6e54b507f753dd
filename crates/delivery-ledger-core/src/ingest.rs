//! Ingestion coordinator: the webhook processing pipeline.
//!
//! One inbound delivery moves through
//! `Received -> ConfigResolved -> Verified -> Parsed -> Persisted ->
//! Aggregated -> Acknowledged`, with short-circuit failure exits at each
//! stage. Whole-request failures surface as [`IngestError`] so the HTTP
//! layer returns non-2xx and the vendor retries; per-sub-event failures
//! are absorbed into the [`IngestReceipt`] error count, explicitly to
//! prevent vendor retry storms from re-delivering already-successful
//! sub-events.

use crate::adapters::{AdapterError, AdapterRegistry};
use crate::aggregate::AggregationUpdater;
use crate::reference::ReferenceExtractor;
use crate::signature::{SignatureError, SignatureVerifier};
use crate::status::StatusMapper;
use crate::store::{ConfigurationStore, EventLedger, MessageEvent, StoreError};
use crate::{ChannelType, ErrorCategory, ProjectSlug, Timestamp, ValidationError, Vendor};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ============================================================================
// Route and Receipt
// ============================================================================

/// The (project, vendor, channel) triple resolved from the URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRoute {
    pub project: ProjectSlug,
    pub vendor: Vendor,
    pub channel: ChannelType,
}

impl WebhookRoute {
    /// Parse raw URL path segments into a route.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::UnknownVendor`] / [`IngestError::UnknownChannel`]
    /// for unsupported slugs and [`IngestError::InvalidProject`] for a
    /// malformed project slug.
    pub fn from_segments(project: &str, vendor: &str, channel: &str) -> Result<Self, IngestError> {
        let vendor = Vendor::from_str(vendor).map_err(|_| IngestError::UnknownVendor {
            slug: vendor.to_string(),
        })?;
        let channel = ChannelType::from_str(channel).map_err(|_| IngestError::UnknownChannel {
            slug: channel.to_string(),
        })?;
        let project = ProjectSlug::new(project)?;
        Ok(Self {
            project,
            vendor,
            channel,
        })
    }
}

/// Acknowledgement returned for a processed delivery.
///
/// Any 2xx response means "do not retry this delivery", even when some
/// sub-events failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReceipt {
    /// Events persisted to the log.
    pub events_processed: usize,
    /// Malformed or unpersistable sub-events skipped.
    pub errors: usize,
    /// Persisted events for which no vendor reference could be extracted
    /// (stored, but uncorrelatable; surfaced for operator visibility).
    pub unreferenced: usize,
}

// ============================================================================
// Errors
// ============================================================================

/// Whole-request ingestion failures.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unknown vendor '{slug}'")]
    UnknownVendor { slug: String },

    #[error("Unknown channel '{slug}'")]
    UnknownChannel { slug: String },

    #[error("Invalid project slug: {0}")]
    InvalidProject(#[from] ValidationError),

    #[error("No active webhook configuration for {project}/{vendor}/{channel}")]
    ConfigurationNotFound {
        project: ProjectSlug,
        vendor: Vendor,
        channel: ChannelType,
    },

    #[error("Signature required but header '{header}' is missing")]
    MissingSignature { header: &'static str },

    #[error("Signature verification failed: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] AdapterError),

    #[error("No adapter registered for vendor {vendor}")]
    AdapterNotRegistered { vendor: Vendor },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Check if error is transient and the vendor should retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get error category for monitoring.
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::MissingSignature { .. } | Self::InvalidSignature(_) => ErrorCategory::Security,
            Self::Store(e) => {
                if e.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::AdapterNotRegistered { .. } => ErrorCategory::Configuration,
            _ => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// IngestionCoordinator
// ============================================================================

/// Orchestrates configuration resolution, verification, parsing,
/// normalization, persistence and aggregation for inbound deliveries.
pub struct IngestionCoordinator {
    configs: Arc<dyn ConfigurationStore>,
    ledger: Arc<dyn EventLedger>,
    adapters: AdapterRegistry,
    verifier: SignatureVerifier,
    mapper: Arc<StatusMapper>,
    extractor: Arc<ReferenceExtractor>,
    aggregator: AggregationUpdater,
}

impl IngestionCoordinator {
    /// Wire a coordinator from its collaborators.
    ///
    /// The mapper and extractor are shared instances: the backfill engine
    /// must use the same ones so ingestion-time and repair-time mapping
    /// cannot drift.
    pub fn new(
        configs: Arc<dyn ConfigurationStore>,
        ledger: Arc<dyn EventLedger>,
        adapters: AdapterRegistry,
        mapper: Arc<StatusMapper>,
        extractor: Arc<ReferenceExtractor>,
        aggregator: AggregationUpdater,
    ) -> Self {
        Self {
            configs,
            ledger,
            adapters,
            verifier: SignatureVerifier::new(),
            mapper,
            extractor,
            aggregator,
        }
    }

    /// Process one webhook delivery end to end.
    ///
    /// `signature` is the value of the vendor's signature header, when
    /// present. `body` is the exact raw request bytes; verification runs
    /// over them before any JSON parsing.
    #[instrument(
        skip(self, signature, body),
        fields(
            project = %route.project,
            vendor = %route.vendor,
            channel = %route.channel,
            body_len = body.len(),
        )
    )]
    pub async fn ingest(
        &self,
        route: &WebhookRoute,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<IngestReceipt, IngestError> {
        // ConfigResolved
        let config = self
            .configs
            .resolve(&route.project, route.vendor, route.channel)
            .await?
            .ok_or_else(|| IngestError::ConfigurationNotFound {
                project: route.project.clone(),
                vendor: route.vendor,
                channel: route.channel,
            })?;

        if !config.is_active {
            // Deactivated configurations reject, never silently drop.
            warn!(config_id = %config.id, "Delivery to deactivated webhook configuration rejected");
            return Err(IngestError::ConfigurationNotFound {
                project: route.project.clone(),
                vendor: route.vendor,
                channel: route.channel,
            });
        }

        // Verified
        match (&config.secret, signature) {
            (Some(secret), Some(signature)) => {
                self.verifier.verify(body, signature, secret)?;
            }
            (Some(_), None) => {
                return Err(IngestError::MissingSignature {
                    header: crate::signature::signature_header(route.vendor),
                });
            }
            (None, _) => {
                // Documented relaxation for configurations that predate
                // signature support; logged so operators can audit exposure.
                warn!(config_id = %config.id, "Unverified webhook delivery: no secret configured");
            }
        }

        // Parsed
        let adapter = self
            .adapters
            .get(route.vendor)
            .ok_or(IngestError::AdapterNotRegistered {
                vendor: route.vendor,
            })?;
        let parsed = adapter.parse(body, route.channel)?;

        let mut receipt = IngestReceipt {
            errors: parsed.skipped,
            ..Default::default()
        };

        // Persisted + Aggregated, each raw event independently: one
        // failing event must not abort the rest of the batch.
        for raw in parsed.events {
            let vendor_ref = raw.vendor_ref.clone().or_else(|| {
                self.extractor
                    .extract(route.vendor, route.channel, &raw.payload)
            });
            if vendor_ref.is_none() {
                receipt.unreferenced += 1;
            }

            let status = self.mapper.map(route.vendor, &raw.raw_status);

            let message = match self
                .ledger
                .upsert_message(&config, vendor_ref.as_deref(), raw.recipient.as_deref())
                .await
            {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Failed to upsert message for event; skipping sub-event");
                    receipt.errors += 1;
                    continue;
                }
            };

            let event = MessageEvent::new(
                message.id,
                status,
                raw.raw_reason.clone(),
                vendor_ref,
                raw.occurred_at.unwrap_or_else(Timestamp::now),
                raw.payload,
            );
            let event_id = event.id;

            if let Err(e) = self.ledger.append_event(event.clone()).await {
                warn!(error = %e, "Failed to append event; skipping sub-event");
                receipt.errors += 1;
                continue;
            }

            // Aggregation failure after a persisted event never rolls the
            // event back; the rebuild path repairs the cache from the log.
            if let Err(e) = self.aggregator.apply(&message, &event).await {
                warn!(
                    error = %e,
                    event_id = %event_id,
                    "Aggregation update failed; event persisted, cache repairable by rebuild"
                );
            }

            receipt.events_processed += 1;
        }

        info!(
            events_processed = receipt.events_processed,
            errors = receipt.errors,
            unreferenced = receipt.unreferenced,
            "Webhook delivery processed"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
