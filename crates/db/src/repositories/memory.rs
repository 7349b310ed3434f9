use std::collections::BTreeMap;

use tokio::sync::RwLock;

use concierge_core::domain::inventory::{
    Embedding, InventoryKey, InventoryRecord, NewInventoryRecord, RoomMatch,
};

use super::{
    rank_matches, warn_if_all_incomparable, InsertOutcome, InventoryRepository, RepositoryError,
};

struct StoredRoom {
    record: InventoryRecord,
    embedding: Embedding,
}

/// Process-local inventory with the same contract as the SQL store.
///
/// The write lock makes every compare-and-set atomic with respect to
/// concurrent readers and writers.
#[derive(Default)]
pub struct InMemoryInventoryRepository {
    rooms: RwLock<BTreeMap<InventoryKey, StoredRoom>>,
}

#[async_trait::async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn find(&self, key: &InventoryKey) -> Result<Option<InventoryRecord>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(key).map(|room| room.record.clone()))
    }

    async fn compare_and_set_available(
        &self,
        key: &InventoryKey,
        expected_version: i64,
        new_available: u32,
    ) -> Result<bool, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(key) {
            Some(room) if room.record.version == expected_version => {
                room.record.available = new_available;
                room.record.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_if_absent(
        &self,
        record: NewInventoryRecord,
    ) -> Result<InsertOutcome, RepositoryError> {
        record.validate()?;
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&record.key) {
            return Ok(InsertOutcome::AlreadyPresent);
        }

        let stored = StoredRoom {
            record: InventoryRecord {
                id: record.key.record_id(),
                key: record.key.clone(),
                available: record.available,
                price: record.price,
                description: record.description,
                version: 0,
            },
            embedding: record.embedding,
        };
        rooms.insert(record.key, stored);
        Ok(InsertOutcome::Inserted)
    }

    async fn nearest(
        &self,
        embedding: &Embedding,
        limit: usize,
    ) -> Result<Vec<RoomMatch>, RepositoryError> {
        let rooms = self.rooms.read().await;
        let matches: Vec<RoomMatch> = rooms
            .values()
            .filter_map(|room| {
                embedding
                    .cosine_distance(&room.embedding)
                    .map(|distance| RoomMatch { record: room.record.clone(), distance })
            })
            .collect();

        warn_if_all_incomparable(rooms.len(), matches.len(), embedding);
        Ok(rank_matches(matches, limit))
    }

    async fn list(&self) -> Result<Vec<InventoryRecord>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.values().map(|room| room.record.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::inventory::{Embedding, InventoryKey, NewInventoryRecord};

    use crate::repositories::{InMemoryInventoryRepository, InsertOutcome, InventoryRepository};

    fn suite(available: u32) -> NewInventoryRecord {
        NewInventoryRecord {
            key: InventoryKey::parse("suite", "2025-04-12").expect("key"),
            available,
            price: "$250".to_string(),
            description: "Spacious suite with an ocean view".to_string(),
            embedding: Embedding(vec![1.0, 0.0]),
        }
    }

    #[tokio::test]
    async fn in_memory_round_trip_assigns_id_and_initial_version() {
        let repo = InMemoryInventoryRepository::default();
        assert_eq!(repo.insert_if_absent(suite(2)).await.expect("insert"), InsertOutcome::Inserted);

        let record = repo
            .find(&InventoryKey::parse("suite", "2025-04-12").expect("key"))
            .await
            .expect("find")
            .expect("record");

        assert_eq!(record.id, "suite_2025-04-12");
        assert_eq!(record.available, 2);
        assert_eq!(record.version, 0);
    }

    #[tokio::test]
    async fn compare_and_set_requires_current_version() {
        let repo = InMemoryInventoryRepository::default();
        repo.insert_if_absent(suite(2)).await.expect("insert");
        let key = InventoryKey::parse("suite", "2025-04-12").expect("key");

        assert!(!repo.compare_and_set_available(&key, 3, 0).await.expect("stale"));
        assert!(repo.compare_and_set_available(&key, 0, 1).await.expect("fresh"));
        assert!(!repo
            .compare_and_set_available(&InventoryKey::parse("loft", "2025-04-12").expect("key"), 0, 1)
            .await
            .expect("missing"));

        let record = repo.find(&key).await.expect("find").expect("record");
        assert_eq!((record.available, record.version), (1, 1));
    }

    #[tokio::test]
    async fn duplicate_key_is_reported_not_overwritten() {
        let repo = InMemoryInventoryRepository::default();
        repo.insert_if_absent(suite(2)).await.expect("insert");
        assert_eq!(
            repo.insert_if_absent(suite(7)).await.expect("insert again"),
            InsertOutcome::AlreadyPresent
        );
        assert_eq!(repo.list().await.expect("list")[0].available, 2);
    }

    #[tokio::test]
    async fn invalid_seed_record_is_rejected() {
        let repo = InMemoryInventoryRepository::default();
        let mut record = suite(1);
        record.description = "  ".to_string();
        assert!(repo.insert_if_absent(record).await.is_err());
        assert!(repo.list().await.expect("list").is_empty());
    }
}
