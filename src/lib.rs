//! Parcel Crawler - resumable enumeration of assessor parcel numbers
//!
//! Walks the 8-digit search-key space, probes the 20 candidate parcel
//! numbers each key expands to, and stores normalized parcel detail in a
//! SQLite star schema. Every key commits atomically, so a run can be stopped
//! at any point and simply started again.

// Module declarations
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::{CrawlOrchestrator, CrawlStats};
use crate::infrastructure::{AppConfig, AssessorClient, DatabaseConnection, HttpClient};

/// Open storage, wire the assessor client and crawl the configured key range.
///
/// Ctrl-C cancels the run after rolling back the key in flight.
pub async fn run(config: AppConfig) -> Result<CrawlStats> {
    config.validate().context("Invalid configuration")?;
    let range = config.key_range()?;

    let db = DatabaseConnection::open(&config.database.path, config.database.max_connections)
        .await
        .context("Failed to open parcel database")?;
    db.migrate().await.context("Failed to create parcel schema")?;

    let http = Arc::new(HttpClient::new(config.http.clone())?);
    let assessor = Arc::new(AssessorClient::new(http, config.endpoints.clone()));
    let orchestrator = CrawlOrchestrator::new(
        db.pool().clone(),
        assessor.clone(),
        assessor,
        config.crawl.clone(),
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Interrupt received, stopping after rolling back the current key");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for interrupt signal: {}", e),
        }
    });

    let result = orchestrator.run(range, cancel).await;
    db.close().await;

    Ok(result?)
}
