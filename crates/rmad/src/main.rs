//! RMA Workflow Engine daemon
//!
//! Tracks defective-equipment return cases from intake through vendor
//! approval, replacement shipment, faulty-part return and closure. Serves
//! the case API over HTTP and runs the SLA sweep in the background.

use anyhow::{Context, Result};
use rma_common::{config_path, EngineConfig, WorkflowRules};
use rmad::engine::WorkflowService;
use rmad::server::{self, AppState};
use rmad::store::{CaseStore, MemoryStore, SqliteStore};
use rmad::{notifier, sweeper};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let explicit_config = std::env::var_os("RMAD_CONFIG").map(PathBuf::from);
    let config = match &explicit_config {
        Some(path) => EngineConfig::load_path(path)?,
        None => EngineConfig::load(),
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("RMA Workflow Engine v{} starting", env!("CARGO_PKG_VERSION"));

    // No config file yet: write the defaults so there is a file to edit.
    if explicit_config.is_none() {
        let path = config_path();
        if !path.exists() {
            match config.save(&path) {
                Ok(()) => info!("Wrote default config to {}", path.display()),
                Err(e) => warn!("Could not write default config to {}: {:#}", path.display(), e),
            }
        }
    }

    let store: Arc<dyn CaseStore> = if config.store.in_memory {
        info!("Using in-memory case store (nothing survives a restart)");
        Arc::new(MemoryStore::new())
    } else {
        let store = SqliteStore::open(&config.store.database)
            .with_context(|| format!("failed to open {}", config.store.database.display()))?;
        info!("Case store: {}", store.path().display());
        Arc::new(store)
    };

    let rules = if config.rules_path.exists() {
        let rules = WorkflowRules::load(&config.rules_path)?;
        info!(
            "Loaded workflow rules from {} ({} assignment rules)",
            config.rules_path.display(),
            rules.assignment.len()
        );
        rules
    } else {
        info!(
            "No rules file at {}, using built-in defaults",
            config.rules_path.display()
        );
        WorkflowRules::default()
    };

    let notifier = notifier::from_config(&config.notifier)?;
    info!("Notifier mode: {}", config.notifier.mode.as_str());

    let service = Arc::new(WorkflowService::new(
        store,
        rules,
        notifier,
        config.notifier.effective_retry_limit(),
    ));
    let tracked = service
        .case_count()
        .context("failed to count tracked cases")?;
    info!("Tracking {} case(s)", tracked);

    if config.sweep.enabled {
        sweeper::spawn(Arc::clone(&service), config.sweep.clone());
    } else {
        info!("SLA sweeper disabled by config");
    }

    server::run(AppState::new(service), &config.server.bind_addr).await
}
