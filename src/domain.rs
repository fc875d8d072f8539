//! Domain module - parcel identifiers, candidate generation, address parsing
//!
//! Everything here is pure except the record source traits, which only
//! describe what the crawl loop needs from the remote assessor.

pub mod address;
pub mod candidates;
pub mod errors;
pub mod parcel;
pub mod record_source;

pub use candidates::{CANDIDATES_PER_KEY, SearchKeyRange, candidates_for};
pub use errors::{CrawlError, CrawlResult};
pub use parcel::{Apn, ParcelDetail, RawParcelRecord, SearchKey, StoredParcel};
pub use record_source::{DetailClient, DiscoveryClient};
