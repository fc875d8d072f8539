//! Shared fixtures for integration tests: an in-memory database and a
//! scripted assessor that counts every call made to it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use parcel_crawler_lib::application::CrawlOrchestrator;
use parcel_crawler_lib::domain::{
    Apn, CrawlError, CrawlResult, DetailClient, DiscoveryClient, RawParcelRecord, SearchKey,
    StoredParcel, candidates_for,
};
use parcel_crawler_lib::infrastructure::config::CrawlConfig;
use parcel_crawler_lib::infrastructure::{DatabaseConnection, ParcelRepository};

pub fn apn(value: u32) -> Apn {
    Apn::new(value).unwrap()
}

pub fn key(value: u32) -> SearchKey {
    SearchKey::new(value).unwrap()
}

pub fn record(address: &str, district: &str, class_code: &str) -> RawParcelRecord {
    RawParcelRecord {
        longitude: Some(-117.4),
        latitude: Some(33.9),
        class_code: Some(class_code.to_string()),
        district: Some(district.to_string()),
        address: Some(address.to_string()),
    }
}

pub async fn memory_db() -> DatabaseConnection {
    let db = DatabaseConnection::in_memory().await.unwrap();
    db.migrate().await.unwrap();
    db
}

pub fn orchestrator(
    db: &DatabaseConnection,
    assessor: &Arc<FakeAssessor>,
    config: CrawlConfig,
) -> CrawlOrchestrator {
    CrawlOrchestrator::new(db.pool().clone(), assessor.clone(), assessor.clone(), config)
}

pub async fn snapshot(db: &DatabaseConnection) -> Vec<StoredParcel> {
    let mut conn = db.pool().acquire().await.unwrap();
    ParcelRepository::new().list_all(&mut conn).await.unwrap()
}

pub async fn stored_ids(db: &DatabaseConnection) -> HashSet<Apn> {
    snapshot(db).await.into_iter().map(|parcel| parcel.id).collect()
}

/// Scripted assessor: a fixed set of valid parcel numbers, detail records for
/// some of them, and optional failures.
#[derive(Default)]
pub struct FakeAssessor {
    valid: HashSet<Apn>,
    details: HashMap<Apn, RawParcelRecord>,
    failing_keys: HashSet<SearchKey>,
    failing_details: HashSet<Apn>,
    cancel_on_detail: Option<(u64, CancellationToken)>,
    discover_calls: AtomicU64,
    detail_calls: AtomicU64,
}

impl FakeAssessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid, but the detail endpoint has no data for it.
    pub fn with_valid(mut self, apn: Apn) -> Self {
        self.valid.insert(apn);
        self
    }

    pub fn with_detail(mut self, apn: Apn, record: RawParcelRecord) -> Self {
        self.valid.insert(apn);
        self.details.insert(apn, record);
        self
    }

    pub fn failing_discovery(mut self, key: SearchKey) -> Self {
        self.failing_keys.insert(key);
        self
    }

    pub fn failing_detail(mut self, apn: Apn) -> Self {
        self.valid.insert(apn);
        self.failing_details.insert(apn);
        self
    }

    /// Cancel `token` on the `call`-th detail request and never answer it.
    pub fn cancel_on_detail_call(mut self, call: u64, token: CancellationToken) -> Self {
        self.cancel_on_detail = Some((call, token));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn discover_calls(&self) -> u64 {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u64 {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u64 {
        self.discover_calls() + self.detail_calls()
    }
}

#[async_trait]
impl DiscoveryClient for FakeAssessor {
    async fn discover(&self, key: SearchKey) -> CrawlResult<HashSet<Apn>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(&key) {
            return Err(CrawlError::transport("fake://search", "connection reset"));
        }
        Ok(candidates_for(key)
            .into_iter()
            .filter(|apn| self.valid.contains(apn))
            .collect())
    }
}

#[async_trait]
impl DetailClient for FakeAssessor {
    async fn fetch_detail(&self, apn: Apn) -> CrawlResult<Option<RawParcelRecord>> {
        let call = self.detail_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((cancel_at, token)) = &self.cancel_on_detail {
            if call == *cancel_at {
                token.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self.failing_details.contains(&apn) {
            return Err(CrawlError::HttpStatus {
                status: 500,
                url: "fake://detail".to_string(),
            });
        }
        Ok(self.details.get(&apn).cloned())
    }
}
