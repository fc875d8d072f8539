//! Repository for the `Parcel` fact table
//!
//! A row exists for every identifier that has been examined. A placeholder row
//! (only `id` set) records "invalid or no data"; a populated row records the
//! normalized detail. All operations run on the caller's connection so the
//! orchestrator can group one search key's writes into a single transaction.

#![allow(clippy::uninlined_format_args)]

use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::collections::HashSet;

use crate::domain::errors::CrawlResult;
use crate::domain::parcel::{Apn, ParcelDetail, StoredParcel};
use crate::infrastructure::dimension_store::{Dimension, DimensionStore};

const SELECT_STORED_PARCEL: &str = r#"
    SELECT p.id, p.longitude, p.latitude, p.address_number,
           s.name AS street, c.name AS city, t.name AS property_type, u.name AS unit
    FROM Parcel p
    LEFT JOIN Street s ON s.id = p.street_id
    LEFT JOIN City c ON c.id = p.city_id
    LEFT JOIN Property_Type t ON t.id = p.property_type_id
    LEFT JOIN Unit u ON u.id = p.unit_id
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParcelRepository {
    dimensions: DimensionStore,
}

impl ParcelRepository {
    pub const fn new() -> Self {
        Self {
            dimensions: DimensionStore::new(),
        }
    }

    /// `true` if any row, placeholder or populated, exists for `apn`.
    pub async fn exists(&self, conn: &mut SqliteConnection, apn: Apn) -> CrawlResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM Parcel WHERE id = ?")
            .bind(i64::from(apn.value()))
            .fetch_optional(&mut *conn)
            .await?;
        Ok(found.is_some())
    }

    /// Batched existence check: the subset of `apns` already stored.
    pub async fn existing_among(
        &self,
        conn: &mut SqliteConnection,
        apns: &[Apn],
    ) -> CrawlResult<HashSet<Apn>> {
        if apns.is_empty() {
            return Ok(HashSet::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM Parcel WHERE id IN (");
        let mut separated = builder.separated(", ");
        for apn in apns {
            separated.push_bind(i64::from(apn.value()));
        }
        separated.push_unseparated(")");

        let ids: Vec<i64> = builder.build_query_scalar().fetch_all(&mut *conn).await?;

        Ok(ids
            .into_iter()
            .filter_map(|id| u32::try_from(id).ok().and_then(Apn::new))
            .collect())
    }

    /// Records `apn` as examined with no detail.
    ///
    /// Fails with a primary-key violation if a row already exists; callers
    /// check [`exists`](Self::exists) first.
    pub async fn insert_placeholder(&self, conn: &mut SqliteConnection, apn: Apn) -> CrawlResult<()> {
        sqlx::query("INSERT INTO Parcel (id) VALUES (?)")
            .bind(i64::from(apn.value()))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Resolves the four dimensions and replaces the whole row for `apn`.
    ///
    /// Replacement is wholesale: whatever was stored before, placeholder or
    /// populated, is gone afterwards. Missing values are stored as NULL.
    pub async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        apn: Apn,
        detail: &ParcelDetail,
    ) -> CrawlResult<()> {
        let street_id = self
            .dimensions
            .resolve(conn, Dimension::Street, detail.street.as_deref())
            .await?;
        let city_id = self
            .dimensions
            .resolve(conn, Dimension::City, detail.city.as_deref())
            .await?;
        let property_type_id = self
            .dimensions
            .resolve(conn, Dimension::PropertyType, detail.property_type.as_deref())
            .await?;
        let unit_id = self
            .dimensions
            .resolve(conn, Dimension::Unit, detail.unit.as_deref())
            .await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO Parcel
            (id, longitude, latitude, address_number, street_id, city_id, property_type_id, unit_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(i64::from(apn.value()))
        .bind(detail.longitude)
        .bind(detail.latitude)
        .bind(detail.address_number.as_deref())
        .bind(street_id)
        .bind(city_id)
        .bind(property_type_id)
        .bind(unit_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Stored row for `apn` with dimension names joined in.
    pub async fn find(
        &self,
        conn: &mut SqliteConnection,
        apn: Apn,
    ) -> CrawlResult<Option<StoredParcel>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_STORED_PARCEL);
        let row = sqlx::query(&sql)
            .bind(i64::from(apn.value()))
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|row| stored_parcel_from_row(&row)).transpose()
    }

    /// Every stored row in identifier order.
    pub async fn list_all(&self, conn: &mut SqliteConnection) -> CrawlResult<Vec<StoredParcel>> {
        let sql = format!("{} ORDER BY p.id", SELECT_STORED_PARCEL);
        let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

        rows.iter().map(stored_parcel_from_row).collect()
    }

    pub async fn count(&self, conn: &mut SqliteConnection) -> CrawlResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM Parcel")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }

    pub async fn placeholder_count(&self, conn: &mut SqliteConnection) -> CrawlResult<i64> {
        let count = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM Parcel
            WHERE longitude IS NULL AND latitude IS NULL AND address_number IS NULL
              AND street_id IS NULL AND city_id IS NULL
              AND property_type_id IS NULL AND unit_id IS NULL
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}

fn stored_parcel_from_row(row: &sqlx::sqlite::SqliteRow) -> CrawlResult<StoredParcel> {
    let raw_id: i64 = row.try_get("id")?;
    let id = u32::try_from(raw_id)
        .ok()
        .and_then(Apn::new)
        .ok_or_else(|| sqlx::Error::Protocol(format!("parcel id out of range: {}", raw_id)))?;

    Ok(StoredParcel {
        id,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        address_number: row.try_get("address_number")?,
        street: row.try_get("street")?,
        city: row.try_get("city")?,
        property_type: row.try_get("property_type")?,
        unit: row.try_get("unit")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn migrated() -> DatabaseConnection {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn apn(value: u32) -> Apn {
        Apn::new(value).unwrap()
    }

    fn sample_detail() -> ParcelDetail {
        ParcelDetail {
            longitude: Some(-117.4),
            latitude: Some(33.9),
            property_type: Some("SFR".into()),
            city: Some("RIVERSIDE".into()),
            unit: Some("4".into()),
            address_number: Some("123".into()),
            street: Some("MAIN ST".into()),
        }
    }

    #[tokio::test]
    async fn exists_after_placeholder_and_upsert() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        assert!(!repo.exists(&mut conn, apn(1)).await.unwrap());
        assert!(!repo.exists(&mut conn, apn(2)).await.unwrap());

        repo.insert_placeholder(&mut conn, apn(1)).await.unwrap();
        repo.upsert(&mut conn, apn(2), &sample_detail()).await.unwrap();

        assert!(repo.exists(&mut conn, apn(1)).await.unwrap());
        assert!(repo.exists(&mut conn, apn(2)).await.unwrap());
        assert!(!repo.exists(&mut conn, apn(3)).await.unwrap());
    }

    #[tokio::test]
    async fn placeholder_has_only_id() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.insert_placeholder(&mut conn, apn(123_456_789)).await.unwrap();

        let stored = repo.find(&mut conn, apn(123_456_789)).await.unwrap().unwrap();
        assert_eq!(stored.id, apn(123_456_789));
        assert!(stored.is_placeholder());
        assert_eq!(repo.placeholder_count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_placeholder_is_a_constraint_violation() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.insert_placeholder(&mut conn, apn(7)).await.unwrap();
        let err = repo.insert_placeholder(&mut conn, apn(7)).await.unwrap_err();

        assert_eq!(err.category(), "storage");
        assert_eq!(repo.count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_placeholder_wholesale() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.insert_placeholder(&mut conn, apn(42)).await.unwrap();
        repo.upsert(&mut conn, apn(42), &sample_detail()).await.unwrap();

        let stored = repo.find(&mut conn, apn(42)).await.unwrap().unwrap();
        assert!(!stored.is_placeholder());
        assert_eq!(stored.street.as_deref(), Some("MAIN ST"));
        assert_eq!(stored.city.as_deref(), Some("RIVERSIDE"));
        assert_eq!(stored.property_type.as_deref(), Some("SFR"));
        assert_eq!(stored.unit.as_deref(), Some("4"));
        assert_eq!(stored.address_number.as_deref(), Some("123"));
        assert_eq!(repo.count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_does_not_merge_with_previous_row() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.upsert(&mut conn, apn(42), &sample_detail()).await.unwrap();
        let sparse = ParcelDetail {
            street: Some("OAK AVE".into()),
            ..ParcelDetail::default()
        };
        repo.upsert(&mut conn, apn(42), &sparse).await.unwrap();

        let stored = repo.find(&mut conn, apn(42)).await.unwrap().unwrap();
        assert_eq!(stored.street.as_deref(), Some("OAK AVE"));
        assert_eq!(stored.longitude, None);
        assert_eq!(stored.latitude, None);
        assert_eq!(stored.address_number, None);
        assert_eq!(stored.city, None);
        assert_eq!(stored.unit, None);
    }

    #[tokio::test]
    async fn shared_street_resolves_to_one_row() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.upsert(&mut conn, apn(10), &sample_detail()).await.unwrap();
        repo.upsert(&mut conn, apn(11), &sample_detail()).await.unwrap();

        let street_ids: Vec<Option<i64>> =
            sqlx::query_scalar("SELECT street_id FROM Parcel ORDER BY id")
                .fetch_all(&mut *conn)
                .await
                .unwrap();
        assert_eq!(street_ids.len(), 2);
        assert_eq!(street_ids[0], street_ids[1]);
        assert_eq!(
            DimensionStore::new()
                .count(&mut conn, Dimension::Street)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn existing_among_returns_stored_subset() {
        let db = migrated().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = ParcelRepository::new();

        repo.insert_placeholder(&mut conn, apn(1)).await.unwrap();
        repo.upsert(&mut conn, apn(3), &sample_detail()).await.unwrap();

        let existing = repo
            .existing_among(&mut conn, &[apn(1), apn(2), apn(3), apn(1)])
            .await
            .unwrap();
        assert_eq!(existing, HashSet::from([apn(1), apn(3)]));
        assert!(repo.existing_among(&mut conn, &[]).await.unwrap().is_empty());
    }
}
