//! Search-key crawl loop
//!
//! Each search key is one unit of work and one transaction:
//! `CHECKING` (are all candidates stored?) then either straight to commit, or
//! `PROCESSING` (one discovery call, then every candidate in order) and
//! commit. Nothing from a key is visible until the whole key commits, so an
//! interrupted key is simply redone by the next run.

#![allow(clippy::uninlined_format_args)]

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::candidates::{SearchKeyRange, candidates_for};
use crate::domain::errors::CrawlResult;
use crate::domain::parcel::{Apn, ParcelDetail, SearchKey};
use crate::domain::record_source::{DetailClient, DiscoveryClient};
use crate::infrastructure::config::CrawlConfig;
use crate::infrastructure::parcel_repository::ParcelRepository;

/// What happened to one candidate identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateOutcome {
    /// Already stored by an earlier key or run
    AlreadyChecked,
    /// Not in the discovered set; stored as a placeholder
    Invalid,
    /// Discovered, but the detail endpoint had nothing; stored as a placeholder
    NoData,
    /// Detail fetched, normalized and upserted
    Added,
}

/// Per-key tally of candidate outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    pub already_checked: u64,
    pub invalid: u64,
    pub no_data: u64,
    pub added: u64,
}

impl KeyReport {
    fn record(&mut self, outcome: CandidateOutcome) {
        match outcome {
            CandidateOutcome::AlreadyChecked => self.already_checked += 1,
            CandidateOutcome::Invalid => self.invalid += 1,
            CandidateOutcome::NoData => self.no_data += 1,
            CandidateOutcome::Added => self.added += 1,
        }
    }

    pub const fn placeholders(&self) -> u64 {
        self.invalid + self.no_data
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum KeyOutcome {
    /// Every candidate was already stored; no remote calls were made
    Skipped,
    Processed(KeyReport),
}

/// Run summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub keys_visited: u64,
    pub keys_skipped: u64,
    pub keys_processed: u64,
    pub keys_failed: u64,
    pub candidates_already_checked: u64,
    pub placeholders_invalid: u64,
    pub placeholders_no_data: u64,
    pub parcels_added: u64,
    /// Discovery and detail calls, retries inside the HTTP client not included
    pub requests_issued: u64,
    /// Last key that was committed or skipped
    pub last_completed_key: Option<SearchKey>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl CrawlStats {
    fn record_processed(&mut self, report: &KeyReport) {
        self.keys_processed += 1;
        self.candidates_already_checked += report.already_checked;
        self.placeholders_invalid += report.invalid;
        self.placeholders_no_data += report.no_data;
        self.parcels_added += report.added;
    }
}

pub struct CrawlOrchestrator {
    pool: SqlitePool,
    discovery: Arc<dyn DiscoveryClient>,
    details: Arc<dyn DetailClient>,
    parcels: ParcelRepository,
    config: CrawlConfig,
    requests_issued: AtomicU64,
}

impl CrawlOrchestrator {
    pub fn new(
        pool: SqlitePool,
        discovery: Arc<dyn DiscoveryClient>,
        details: Arc<dyn DetailClient>,
        config: CrawlConfig,
    ) -> Self {
        Self {
            pool,
            discovery,
            details,
            parcels: ParcelRepository::new(),
            config,
            requests_issued: AtomicU64::new(0),
        }
    }

    /// Remote calls made by this orchestrator so far.
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued.load(Ordering::Relaxed)
    }

    /// Crawl `range` in ascending order until it is exhausted, a fatal error
    /// occurs, or `cancel` fires.
    ///
    /// Remote failures skip the key when `continue_on_error` is set; storage
    /// failures always end the run. Either way the failing key's transaction
    /// is rolled back and every earlier key stays committed.
    pub async fn run(&self, range: SearchKeyRange, cancel: CancellationToken) -> CrawlResult<CrawlStats> {
        let started = Instant::now();
        let requests_before = self.requests_issued();
        let total_keys = range.len();
        let mut stats = CrawlStats::default();

        info!("🚀 Starting crawl over {} search keys", total_keys);

        for key in range {
            if cancel.is_cancelled() {
                stats.cancelled = true;
                break;
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = self.process_key(key) => Some(result),
            };

            let Some(result) = result else {
                warn!("🛑 Crawl interrupted during key {}; its uncommitted work was discarded", key);
                stats.cancelled = true;
                break;
            };

            stats.keys_visited += 1;
            match result {
                Ok(KeyOutcome::Skipped) => {
                    stats.keys_skipped += 1;
                    stats.last_completed_key = Some(key);
                }
                Ok(KeyOutcome::Processed(report)) => {
                    stats.record_processed(&report);
                    stats.last_completed_key = Some(key);
                }
                Err(e) if e.is_remote() && self.config.continue_on_error => {
                    stats.keys_failed += 1;
                    warn!("⚠️ Skipping key {} after {} error: {}", key, e.category(), e);
                }
                Err(e) => {
                    error!("❌ Crawl stopped at key {} ({}): {}", key, e.category(), e);
                    stats.requests_issued = self.requests_issued() - requests_before;
                    stats.elapsed = started.elapsed();
                    log_summary(&stats);
                    return Err(e);
                }
            }

            let interval = self.config.progress_interval_keys;
            if interval > 0 && stats.keys_visited % interval == 0 {
                info!(
                    "📊 Progress: {}/{} keys (skipped {}, failed {}), {} parcels added, {} requests",
                    stats.keys_visited,
                    total_keys,
                    stats.keys_skipped,
                    stats.keys_failed,
                    stats.parcels_added,
                    self.requests_issued() - requests_before
                );
            }
        }

        stats.requests_issued = self.requests_issued() - requests_before;
        stats.elapsed = started.elapsed();

        if stats.cancelled {
            match stats.last_completed_key {
                Some(key) => info!("Last completed key: {}", key),
                None => info!("No key was completed before cancellation"),
            }
        }
        log_summary(&stats);
        Ok(stats)
    }

    /// Process one search key inside its own transaction.
    pub async fn process_key(&self, key: SearchKey) -> CrawlResult<KeyOutcome> {
        let candidates = candidates_for(key);
        let mut tx = self.pool.begin().await?;

        let existing = self.parcels.existing_among(&mut tx, &candidates).await?;
        if candidates.iter().all(|apn| existing.contains(apn)) {
            tx.commit().await?;
            debug!("⏭️ Key {} already complete", key);
            return Ok(KeyOutcome::Skipped);
        }

        self.requests_issued.fetch_add(1, Ordering::Relaxed);
        let discovered = self.discovery.discover(key).await?;

        let mut report = KeyReport::default();
        for apn in candidates {
            let outcome = self.process_candidate(&mut tx, apn, &discovered).await?;
            report.record(outcome);
        }

        tx.commit().await?;
        debug!(
            "✅ Committed key {}: {} added, {} placeholders, {} already checked",
            key,
            report.added,
            report.placeholders(),
            report.already_checked
        );
        Ok(KeyOutcome::Processed(report))
    }

    async fn process_candidate(
        &self,
        conn: &mut SqliteConnection,
        apn: Apn,
        discovered: &HashSet<Apn>,
    ) -> CrawlResult<CandidateOutcome> {
        // Checked live: an earlier candidate of this same key may have stored it.
        if self.parcels.exists(conn, apn).await? {
            debug!("{} already checked", apn);
            return Ok(CandidateOutcome::AlreadyChecked);
        }

        if !discovered.contains(&apn) {
            self.parcels.insert_placeholder(conn, apn).await?;
            debug!("{} invalid", apn);
            return Ok(CandidateOutcome::Invalid);
        }

        self.requests_issued.fetch_add(1, Ordering::Relaxed);
        match self.details.fetch_detail(apn).await? {
            None => {
                self.parcels.insert_placeholder(conn, apn).await?;
                debug!("{} no data", apn);
                Ok(CandidateOutcome::NoData)
            }
            Some(raw) => {
                let detail = ParcelDetail::from_raw(&raw);
                self.parcels.upsert(conn, apn, &detail).await?;
                debug!("{} adding parcel", apn);
                Ok(CandidateOutcome::Added)
            }
        }
    }
}

fn log_summary(stats: &CrawlStats) {
    info!(
        "🏁 Crawl finished in {:?}: {} keys visited ({} processed, {} skipped, {} failed), \
         {} parcels added, {} placeholders ({} invalid, {} no data), {} requests{}",
        stats.elapsed,
        stats.keys_visited,
        stats.keys_processed,
        stats.keys_skipped,
        stats.keys_failed,
        stats.parcels_added,
        stats.placeholders_invalid + stats.placeholders_no_data,
        stats.placeholders_invalid,
        stats.placeholders_no_data,
        stats.requests_issued,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
}
