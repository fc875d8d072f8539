//! Remote record source interfaces
//!
//! The orchestrator only sees these two traits; the HTTP implementation lives
//! in `infrastructure::assessor_client`.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::errors::CrawlResult;
use crate::domain::parcel::{Apn, RawParcelRecord, SearchKey};

/// Discovers which parcel numbers exist for a search key.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    /// All identifiers the remote source considers valid for `key`.
    ///
    /// A transport or decoding failure is an error, never an empty set.
    async fn discover(&self, key: SearchKey) -> CrawlResult<HashSet<Apn>>;
}

/// Fetches the raw detail record for one parcel.
#[async_trait]
pub trait DetailClient: Send + Sync {
    /// `Ok(None)` means the source has no data for `apn`.
    async fn fetch_detail(&self, apn: Apn) -> CrawlResult<Option<RawParcelRecord>>;
}
