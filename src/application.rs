//! Application layer - the crawl loop over search keys

pub mod crawl_orchestrator;

pub use crawl_orchestrator::{CandidateOutcome, CrawlOrchestrator, CrawlStats, KeyOutcome, KeyReport};
