//! Infrastructure layer for storage, HTTP and process-level concerns
//!
//! SQLite access goes through `sqlx`, the assessor endpoints through a
//! rate-limited `reqwest` client.

pub mod assessor_client;
pub mod config;
pub mod database_connection;
pub mod dimension_store;
pub mod http_client;
pub mod logging;
pub mod parcel_repository;

pub use assessor_client::AssessorClient;
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use dimension_store::{Dimension, DimensionStore};
pub use http_client::{HttpClient, HttpClientConfig};
pub use parcel_repository::ParcelRepository;
