//! Get-or-create lookups for the normalized dimension tables
//!
//! Each dimension maps a unique `name` to a surrogate `id`. Rows are only
//! ever appended; the UNIQUE constraint on `name` is what keeps repeated or
//! racing resolves from creating duplicates.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use std::fmt;

use crate::domain::errors::CrawlResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Street,
    City,
    PropertyType,
    Unit,
}

impl Dimension {
    pub const ALL: [Self; 4] = [Self::Street, Self::City, Self::PropertyType, Self::Unit];

    pub const fn table(self) -> &'static str {
        match self {
            Self::Street => "Street",
            Self::City => "City",
            Self::PropertyType => "Property_Type",
            Self::Unit => "Unit",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Stateless resolver; every call runs on the connection it is handed, so it
/// joins whatever transaction that connection is in.
///
/// There is deliberately no id cache: an id handed out inside a transaction
/// that later rolls back would no longer exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionStore;

impl DimensionStore {
    pub const fn new() -> Self {
        Self
    }

    /// Id for `name` in `dimension`, inserting the row if it is missing.
    ///
    /// `None` in, `None` out, without touching storage.
    pub async fn resolve(
        &self,
        conn: &mut SqliteConnection,
        dimension: Dimension,
        name: Option<&str>,
    ) -> CrawlResult<Option<i64>> {
        let Some(name) = name else {
            return Ok(None);
        };

        let table = dimension.table();

        // Only the uniqueness conflict on `name` is absorbed; any other
        // constraint failure still surfaces as an error.
        let insert_sql =
            format!("INSERT INTO {table} (name) VALUES (?) ON CONFLICT (name) DO NOTHING");
        sqlx::query(&insert_sql).bind(name).execute(&mut *conn).await?;

        let select_sql = format!("SELECT id FROM {table} WHERE name = ?");
        let id: i64 = sqlx::query_scalar(&select_sql)
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;

        Ok(Some(id))
    }

    /// Id for `name` if it already exists; never inserts.
    pub async fn lookup(
        &self,
        conn: &mut SqliteConnection,
        dimension: Dimension,
        name: &str,
    ) -> CrawlResult<Option<i64>> {
        let select_sql = format!("SELECT id FROM {} WHERE name = ?", dimension.table());
        let id = sqlx::query_scalar(&select_sql)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    pub async fn count(&self, conn: &mut SqliteConnection, dimension: Dimension) -> CrawlResult<i64> {
        let count_sql = format!("SELECT COUNT(*) FROM {}", dimension.table());
        let count = sqlx::query_scalar(&count_sql).fetch_one(&mut *conn).await?;
        Ok(count)
    }
}
