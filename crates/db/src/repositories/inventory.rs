use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use concierge_core::domain::inventory::{
    Embedding, InventoryKey, InventoryRecord, NewInventoryRecord, RoomMatch,
};

use super::{
    rank_matches, warn_if_all_incomparable, InsertOutcome, InventoryRepository, RepositoryError,
};
use crate::DbPool;

const SELECT_COLUMNS: &str =
    "SELECT id, room_type, stay_date, available, price, description, version FROM room_inventory";

pub struct SqlInventoryRepository {
    pool: DbPool,
}

impl SqlInventoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl InventoryRepository for SqlInventoryRepository {
    async fn find(&self, key: &InventoryKey) -> Result<Option<InventoryRecord>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE room_type = ? AND stay_date = ?"))
            .bind(key.room_type.as_str())
            .bind(key.date.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(inventory_record_from_row).transpose()
    }

    async fn compare_and_set_available(
        &self,
        key: &InventoryKey,
        expected_version: i64,
        new_available: u32,
    ) -> Result<bool, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE room_inventory
             SET available = ?, version = version + 1, updated_at = ?
             WHERE room_type = ? AND stay_date = ? AND version = ?",
        )
        .bind(i64::from(new_available))
        .bind(Utc::now().to_rfc3339())
        .bind(key.room_type.as_str())
        .bind(key.date.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn insert_if_absent(
        &self,
        record: NewInventoryRecord,
    ) -> Result<InsertOutcome, RepositoryError> {
        record.validate()?;
        let embedding_json = serde_json::to_string(&record.embedding.0)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            "INSERT INTO room_inventory
                (id, room_type, stay_date, available, price, description, embedding_json, version, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(record.key.record_id())
        .bind(record.key.room_type.as_str())
        .bind(record.key.date.to_string())
        .bind(i64::from(record.available))
        .bind(&record.price)
        .bind(&record.description)
        .bind(embedding_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if inserted.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyPresent
        })
    }

    async fn nearest(
        &self,
        embedding: &Embedding,
        limit: usize,
    ) -> Result<Vec<RoomMatch>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, room_type, stay_date, available, price, description, version, embedding_json
             FROM room_inventory",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = inventory_record_from_row(row)?;
            let stored = embedding_from_row(row)?;
            let Some(distance) = embedding.cosine_distance(&stored) else {
                debug!(
                    event_name = "inventory.search.skipped",
                    id = %record.id,
                    stored_dimensions = stored.dimensions(),
                    query_dimensions = embedding.dimensions(),
                    "skipping record with incomparable embedding"
                );
                continue;
            };
            matches.push(RoomMatch { record, distance });
        }

        warn_if_all_incomparable(rows.len(), matches.len(), embedding);
        Ok(rank_matches(matches, limit))
    }

    async fn list(&self) -> Result<Vec<InventoryRecord>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY room_type ASC, stay_date ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(inventory_record_from_row).collect()
    }
}

fn inventory_record_from_row(row: &SqliteRow) -> Result<InventoryRecord, RepositoryError> {
    let room_type: String = row.try_get("room_type")?;
    let stay_date: String = row.try_get("stay_date")?;
    let key = InventoryKey::parse(&room_type, &stay_date)?;

    let available: i64 = row.try_get("available")?;
    let available = u32::try_from(available).map_err(|_| {
        RepositoryError::Decode(format!("record {key} has out-of-range available count {available}"))
    })?;

    Ok(InventoryRecord {
        id: row.try_get("id")?,
        key,
        available,
        price: row.try_get("price")?,
        description: row.try_get("description")?,
        version: row.try_get("version")?,
    })
}

fn embedding_from_row(row: &SqliteRow) -> Result<Embedding, RepositoryError> {
    let raw: String = row.try_get("embedding_json")?;
    serde_json::from_str::<Vec<f32>>(&raw)
        .map(Embedding)
        .map_err(|error| RepositoryError::Decode(format!("invalid embedding_json: {error}")))
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::inventory::{Embedding, InventoryKey, NewInventoryRecord};

    use super::SqlInventoryRepository;
    use crate::repositories::{InsertOutcome, InventoryRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlInventoryRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlInventoryRepository::new(pool)
    }

    fn room(room_type: &str, available: u32, embedding: Vec<f32>) -> NewInventoryRecord {
        NewInventoryRecord {
            key: InventoryKey::parse(room_type, "2025-04-12").expect("key"),
            available,
            price: "$250".to_string(),
            description: format!("{room_type} with a view"),
            embedding: Embedding(embedding),
        }
    }

    #[tokio::test]
    async fn find_is_idempotent_and_missing_keys_are_none() {
        let repo = repository().await;
        repo.insert_if_absent(room("suite", 2, vec![1.0, 0.0])).await.expect("insert");

        let key = InventoryKey::parse("suite", "2025-04-12").expect("key");
        let first = repo.find(&key).await.expect("find");
        let second = repo.find(&key).await.expect("find again");
        assert_eq!(first, second);
        assert_eq!(first.map(|record| record.available), Some(2));

        let missing = InventoryKey::parse("suite", "2025-04-13").expect("key");
        assert_eq!(repo.find(&missing).await.expect("find missing"), None);
    }

    #[tokio::test]
    async fn stale_version_write_is_refused() {
        let repo = repository().await;
        repo.insert_if_absent(room("suite", 2, vec![1.0, 0.0])).await.expect("insert");
        let key = InventoryKey::parse("suite", "2025-04-12").expect("key");

        assert!(repo.compare_and_set_available(&key, 0, 1).await.expect("first cas"));
        assert!(!repo.compare_and_set_available(&key, 0, 0).await.expect("stale cas"));

        let record = repo.find(&key).await.expect("find").expect("record");
        assert_eq!(record.available, 1);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn second_insert_for_same_key_keeps_first_record() {
        let repo = repository().await;
        let first = repo.insert_if_absent(room("suite", 2, vec![1.0, 0.0])).await.expect("insert");
        let second =
            repo.insert_if_absent(room("Suite", 9, vec![0.0, 1.0])).await.expect("insert again");

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::AlreadyPresent);

        let records = repo.list().await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].available, 2);
    }

    #[tokio::test]
    async fn nearest_orders_by_distance_and_skips_other_dimensions() {
        let repo = repository().await;
        repo.insert_if_absent(room("suite", 2, vec![1.0, 0.0])).await.expect("suite");
        repo.insert_if_absent(room("loft", 3, vec![0.6, 0.8])).await.expect("loft");
        repo.insert_if_absent(room("eco", 2, vec![0.0, 1.0])).await.expect("eco");
        repo.insert_if_absent(room("single", 5, vec![1.0, 0.0, 0.0])).await.expect("single");

        let matches = repo.nearest(&Embedding(vec![1.0, 0.1]), 2).await.expect("nearest");
        let order: Vec<_> = matches.iter().map(|m| m.record.key.room_type.to_string()).collect();

        assert_eq!(order, vec!["suite", "loft"]);
        assert!(matches[0].distance <= matches[1].distance);
    }
}
