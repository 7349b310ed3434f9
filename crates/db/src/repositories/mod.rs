use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use concierge_core::domain::inventory::{
    Embedding, InventoryKey, InventoryRecord, NewInventoryRecord, RoomMatch,
};
use concierge_core::errors::DomainError;

pub mod inventory;
pub mod memory;

pub use inventory::SqlInventoryRepository;
pub use memory::InMemoryInventoryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Persisted room inventory, one record per `(room type, date)`.
///
/// `compare_and_set_available` is the only mutation of `available`; it must be
/// a single atomic conditional write that succeeds only while the stored
/// version still equals `expected_version`, bumping the version on success.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find(&self, key: &InventoryKey) -> Result<Option<InventoryRecord>, RepositoryError>;

    async fn compare_and_set_available(
        &self,
        key: &InventoryKey,
        expected_version: i64,
        new_available: u32,
    ) -> Result<bool, RepositoryError>;

    async fn insert_if_absent(
        &self,
        record: NewInventoryRecord,
    ) -> Result<InsertOutcome, RepositoryError>;

    /// Up to `limit` records by ascending cosine distance to `embedding`.
    async fn nearest(
        &self,
        embedding: &Embedding,
        limit: usize,
    ) -> Result<Vec<RoomMatch>, RepositoryError>;

    async fn list(&self) -> Result<Vec<InventoryRecord>, RepositoryError>;
}

pub(crate) fn rank_matches(mut matches: Vec<RoomMatch>, limit: usize) -> Vec<RoomMatch> {
    matches.sort_by(|left, right| {
        left.distance
            .total_cmp(&right.distance)
            .then_with(|| left.record.key.cmp(&right.record.key))
    });
    matches.truncate(limit);
    matches
}

/// Warns when a non-empty store produced no comparable rows, which happens
/// when the configured embedder no longer matches the seeded vectors.
pub(crate) fn warn_if_all_incomparable(scanned: usize, matched: usize, query: &Embedding) -> bool {
    let all_skipped = scanned > 0 && matched == 0;
    if all_skipped {
        warn!(
            event_name = "inventory.search.incomparable",
            scanned,
            query_dimensions = query.dimensions(),
            "no stored embedding matches the query dimensions; re-seed with the current embedder"
        );
    }
    all_skipped
}
