//! # Delivery-Ledger CLI
//!
//! Command-line interface for the delivery-ledger webhook ingestion
//! service.
//!
//! This module provides CLI commands for:
//! - Serving the webhook ingestion HTTP endpoint
//! - Offline backfill: reference repair and status-drift reporting
//! - Rebuilding the analytics cache from the event log
//! - Configuration validation

use clap::{Parser, Subcommand};
use delivery_ledger_api::{ServiceConfig, ServiceError};
use delivery_ledger_core::store::{
    MemoryAnalyticsStore, MemoryConfigStore, MemoryEventLedger, StoreError, WebhookConfiguration,
};
use delivery_ledger_core::{
    AdapterRegistry, AggregationUpdater, BackfillEngine, ChannelType, IngestionCoordinator,
    ProjectSlug, ReferenceExtractor, StatusMapper, UserId, ValidationError, Vendor,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

// ============================================================================
// CLI Structure
// ============================================================================

/// Delivery-Ledger CLI - webhook ingestion for messaging vendors
#[derive(Parser)]
#[command(name = "delivery-ledger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Webhook ingestion and status normalization for messaging vendors")]
#[command(
    long_about = "Delivery-Ledger receives delivery-status callbacks from messaging vendors, \
                  normalizes them into a canonical event log, and maintains per-day analytics"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DELIVERY_LEDGER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook ingestion HTTP server
    Serve {
        /// Host to bind, overriding the configuration file
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overriding the configuration file
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run offline repair passes over the event log
    Backfill {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Also report statuses that drift from the current mapping tables
        #[arg(long)]
        remap: bool,
    },

    /// Rebuild the analytics cache by replaying the event log
    RebuildAggregates,

    /// Validate configuration
    Config {
        /// Configuration file to validate (defaults to --config)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,
    },
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    #[error("Invalid webhook entry: {0}")]
    InvalidEntry(#[from] ValidationError),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Top-level configuration: the HTTP service settings plus the webhook
/// configurations to seed the store with.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct LedgerConfig {
    /// HTTP service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Webhook configurations issued to tenants
    #[serde(default)]
    pub webhook: Vec<WebhookEntry>,
}

/// One `[[webhook]]` table in the configuration file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WebhookEntry {
    pub user_id: u64,
    pub project: String,
    pub vendor: String,
    pub channel: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl WebhookEntry {
    /// Validate and convert into a store record.
    pub fn into_configuration(self) -> Result<WebhookConfiguration, ConfigError> {
        let project = ProjectSlug::new(self.project)?;
        let vendor = Vendor::from_str(&self.vendor).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
        let channel = ChannelType::from_str(&self.channel).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;

        let mut config = WebhookConfiguration::new(
            UserId::new(self.user_id),
            project,
            vendor,
            channel,
            self.secret,
        );
        config.is_active = self.active;
        Ok(config)
    }
}

/// Load configuration from a file, or defaults when no file is given.
pub fn load_configuration(path: Option<&Path>) -> Result<LedgerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(LedgerConfig::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let config: LedgerConfig = toml::from_str(&raw)?;
    config
        .service
        .validate()
        .map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })?;
    Ok(config)
}

// ============================================================================
// Component Wiring
// ============================================================================

/// Everything a command needs, wired over shared stores.
pub struct Components {
    pub coordinator: Arc<IngestionCoordinator>,
    pub backfill: BackfillEngine,
}

/// Wire coordinator and backfill engine over in-memory stores seeded from
/// the configuration.
///
/// The mapper and extractor are constructed once and shared: live
/// ingestion and offline repair must apply identical rules.
pub fn build_components(config: &LedgerConfig) -> Result<Components, ConfigError> {
    let seeded: Result<Vec<_>, _> = config
        .webhook
        .iter()
        .cloned()
        .map(WebhookEntry::into_configuration)
        .collect();
    let config_store = Arc::new(MemoryConfigStore::with_configs(seeded?));

    let ledger = Arc::new(MemoryEventLedger::new());
    let analytics = Arc::new(MemoryAnalyticsStore::new());
    let adapters = AdapterRegistry::with_builtin_vendors();
    let mapper = Arc::new(StatusMapper::new());
    let extractor = Arc::new(ReferenceExtractor::new());
    let aggregator = AggregationUpdater::new(analytics);

    let coordinator = Arc::new(IngestionCoordinator::new(
        config_store,
        ledger.clone(),
        adapters.clone(),
        mapper.clone(),
        extractor.clone(),
        aggregator.clone(),
    ));
    let backfill = BackfillEngine::new(ledger, adapters, mapper, extractor, aggregator);

    Ok(Components {
        coordinator,
        backfill,
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    let mut config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.service.server.host = host;
            }
            if let Some(port) = port {
                config.service.server.port = port;
            }
            execute_serve_command(config).await
        }
        Commands::Backfill { dry_run, remap } => {
            execute_backfill_command(&config, dry_run, remap).await
        }
        Commands::RebuildAggregates => execute_rebuild_command(&config).await,
        Commands::Config { file, show } => {
            execute_config_command(file.or(cli.config), show)
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
fn initialize_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));

    if cli.json_logs {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Execute serve command
async fn execute_serve_command(config: LedgerConfig) -> Result<(), CliError> {
    info!(
        host = %config.service.server.host,
        port = config.service.server.port,
        webhooks = config.webhook.len(),
        "Starting delivery-ledger service"
    );

    let components = build_components(&config)?;
    delivery_ledger_api::start_server(config.service, components.coordinator).await?;
    Ok(())
}

/// Execute backfill command
async fn execute_backfill_command(
    config: &LedgerConfig,
    dry_run: bool,
    remap: bool,
) -> Result<(), CliError> {
    let components = build_components(config)?;

    let report = components.backfill.repair_references(dry_run).await?;
    println!(
        "reference repair: scanned {} events, {} {}, {} unrepairable",
        report.scanned,
        report.repaired,
        if dry_run { "repairable" } else { "repaired" },
        report.skipped,
    );

    if remap {
        let (drift_report, drifts) = components.backfill.report_status_drift().await?;
        println!(
            "status drift: scanned {} events, {} drifted, {} without raw status",
            drift_report.scanned, drift_report.drifted, drift_report.skipped,
        );
        for drift in drifts {
            println!(
                "  event {} (message {}): raw '{}' stored as {} now maps to {}",
                drift.event_id, drift.message_id, drift.raw_status, drift.stored, drift.remapped,
            );
        }

        let applied = components.backfill.rebuild_aggregates().await?;
        println!("analytics cache rebuilt: {applied} increments applied");
    }

    Ok(())
}

/// Execute rebuild-aggregates command
async fn execute_rebuild_command(config: &LedgerConfig) -> Result<(), CliError> {
    let components = build_components(config)?;
    let applied = components.backfill.rebuild_aggregates().await?;
    println!("analytics cache rebuilt: {applied} increments applied");
    Ok(())
}

/// Execute config command
fn execute_config_command(file: Option<PathBuf>, show: bool) -> Result<(), CliError> {
    let config = load_configuration(file.as_deref())?;

    // Entry validation happens eagerly so a bad file fails here, not at
    // first delivery.
    for entry in config.webhook.iter().cloned() {
        entry.into_configuration()?;
    }

    println!("configuration is valid ({} webhook entries)", config.webhook.len());

    if show {
        let rendered = toml::to_string_pretty(&config).map_err(|e| CliError::CommandFailed {
            message: format!("failed to render configuration: {e}"),
        })?;
        println!("{rendered}");
    }

    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
