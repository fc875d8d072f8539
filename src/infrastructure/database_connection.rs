// Database connection and pool management
// This module handles SQLite database connections using sqlx

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::errors::CrawlResult;
use crate::infrastructure::dimension_store::Dimension;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating if needed) the SQLite file at `path`.
    pub async fn open(path: &Path, max_connections: u32) -> CrawlResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("🗄️ Opened parcel database: {}", path.display());
        Ok(Self { pool })
    }

    /// Private in-memory database on a single, never-recycled connection.
    pub async fn in_memory() -> CrawlResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn migrate(&self) -> CrawlResult<()> {
        // Dimension tables: append-only reference data keyed by unique name.
        for dimension in Dimension::ALL {
            let create_dimension_sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                )
                "#,
                dimension.table()
            );
            sqlx::query(&create_dimension_sql).execute(&self.pool).await?;
        }

        let create_parcel_sql = r#"
            CREATE TABLE IF NOT EXISTS Parcel (
                id INTEGER PRIMARY KEY,
                longitude REAL,
                latitude REAL,
                address_number TEXT,
                street_id INTEGER REFERENCES Street (id),
                city_id INTEGER REFERENCES City (id),
                property_type_id INTEGER REFERENCES Property_Type (id),
                unit_id INTEGER REFERENCES Unit (id)
            )
        "#;

        sqlx::query(create_parcel_sql).execute(&self.pool).await?;

        Ok(())
    }
}
