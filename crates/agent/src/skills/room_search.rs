use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use concierge_core::domain::inventory::RoomMatch;
use concierge_core::errors::SearchError;
use concierge_core::search::Embedder;
use concierge_db::InventoryRepository;

use crate::tools::{parse_arguments, Tool, ToolDefinition, ToolError};

pub const SEARCH_ROOMS: &str = "SemanticSearchPlugin-search_rooms_by_description";

pub const NO_MATCHES: &str =
    "申し訳ございませんが、お探しの条件に合う客室が見つかりませんでした。";

#[derive(Debug, Deserialize)]
struct SearchArguments {
    query: String,
}

/// Semantic room search: embed the guest's wording, then rank stored rooms
/// by cosine distance.
pub struct RoomSearchTool {
    repository: Arc<dyn InventoryRepository>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    store_timeout: Duration,
}

impl RoomSearchTool {
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        embedder: Arc<dyn Embedder>,
        top_k: usize,
        store_timeout: Duration,
    ) -> Self {
        Self { repository, embedder, top_k: top_k.max(1), store_timeout }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<RoomMatch>, SearchError> {
        let embedding = self.embedder.embed(query).await?;

        let after_ms = u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX);
        let matches = timeout(self.store_timeout, self.repository.nearest(&embedding, self.top_k))
            .await
            .map_err(|_| {
                warn!(
                    event_name = "inventory.store.unavailable",
                    operation = "similarity search",
                    after_ms,
                    "similarity search timed out"
                );
                SearchError::Timeout { operation: "similarity search", after_ms }
            })?
            .map_err(|error| SearchError::StoreUnavailable(error.to_string()))?;

        debug!(hits = matches.len(), top_k = self.top_k, "room search completed");
        Ok(matches)
    }
}

pub fn format_matches(matches: &[RoomMatch]) -> String {
    if matches.is_empty() {
        return NO_MATCHES.to_string();
    }

    matches
        .iter()
        .map(|hit| {
            let record = &hit.record;
            format!(
                "\n🏨 **{}**\n📅 日付: {}\n🛏 説明: {}\n💵 料金: {}\n🟢 空室数: {} 室\n",
                record.key.room_type.capitalized(),
                record.key.date,
                record.description,
                record.price,
                record.available,
            )
        })
        .collect()
}

#[async_trait]
impl Tool for RoomSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: SEARCH_ROOMS.to_string(),
            description: "客室の説明に基づいてセマンティック検索でホテルの客室を検索します。"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "ユーザーが探している客室タイプの説明。",
                    },
                },
                "required": ["query"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: SearchArguments = parse_arguments(arguments)?;
        let query = arguments.query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("query must not be empty".to_string()));
        }

        let matches = self.search(query).await?;
        Ok(format_matches(&matches))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use concierge_core::domain::inventory::{
        Embedding, InventoryKey, InventoryRecord, NewInventoryRecord, RoomMatch,
    };
    use concierge_core::errors::SearchError;
    use concierge_core::search::Embedder;
    use concierge_db::{
        InMemoryInventoryRepository, InsertOutcome, InventoryRepository, RepositoryError,
    };

    use super::{RoomSearchTool, NO_MATCHES};
    use crate::tools::{Tool, ToolError};

    /// Maps a handful of words onto fixed axes.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
            let axis = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
            let vector = vec![axis("ocean"), axis("kitchen"), axis("garden"), 0.01];
            Ok(Embedding(vector))
        }
    }

    struct OfflineEmbedder;

    #[async_trait]
    impl Embedder for OfflineEmbedder {
        async fn embed(&self, _text: &str) -> Result<Embedding, SearchError> {
            Err(SearchError::EmbeddingFailure("HTTP 503".to_string()))
        }
    }

    async fn seeded_repository() -> Arc<dyn InventoryRepository> {
        let repo = InMemoryInventoryRepository::default();
        for (room_type, description, price) in [
            ("suite", "ocean view suite", "$250"),
            ("loft", "loft with a full kitchen", "$300"),
            ("garden", "quiet garden room", "$180"),
        ] {
            repo.insert_if_absent(NewInventoryRecord {
                key: InventoryKey::parse(room_type, "2025-04-12").expect("key"),
                available: 2,
                price: price.to_string(),
                description: description.to_string(),
                embedding: KeywordEmbedder.embed(description).await.expect("embed"),
            })
            .await
            .expect("seed");
        }
        Arc::new(repo)
    }

    #[tokio::test]
    async fn closest_room_is_listed_first() {
        let tool = RoomSearchTool::new(
            seeded_repository().await,
            Arc::new(KeywordEmbedder),
            2,
            Duration::from_secs(1),
        );

        let output = tool.execute(json!({ "query": "an ocean view please" })).await.expect("search");

        assert!(output.starts_with("\n🏨 **Suite**\n📅 日付: 2025-04-12\n"));
        assert!(output.contains("💵 料金: $250\n🟢 空室数: 2 室\n"));
        assert_eq!(output.matches("🏨").count(), 2, "results are capped at top_k");
    }

    #[tokio::test]
    async fn empty_inventory_reports_no_matches() {
        let tool = RoomSearchTool::new(
            Arc::new(InMemoryInventoryRepository::default()),
            Arc::new(KeywordEmbedder),
            3,
            Duration::from_secs(1),
        );

        let output = tool.execute(json!({ "query": "ocean" })).await.expect("search");
        assert_eq!(output, NO_MATCHES);
    }

    #[tokio::test]
    async fn embedding_outage_surfaces_as_search_error() {
        let tool = RoomSearchTool::new(
            seeded_repository().await,
            Arc::new(OfflineEmbedder),
            3,
            Duration::from_secs(1),
        );

        let error = tool.execute(json!({ "query": "ocean" })).await.expect_err("offline");
        assert!(matches!(error, ToolError::Search(SearchError::EmbeddingFailure(_))));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let tool = RoomSearchTool::new(
            seeded_repository().await,
            Arc::new(KeywordEmbedder),
            3,
            Duration::from_secs(1),
        );
        let error = tool.execute(json!({ "query": "  " })).await.expect_err("blank");
        assert!(matches!(error, ToolError::InvalidArguments(_)));
    }

    /// Similarity search either hangs or fails outright.
    enum BrokenStore {
        Stalled,
        Failing,
    }

    #[async_trait]
    impl InventoryRepository for BrokenStore {
        async fn find(
            &self,
            _key: &InventoryKey,
        ) -> Result<Option<InventoryRecord>, RepositoryError> {
            Ok(None)
        }

        async fn compare_and_set_available(
            &self,
            _key: &InventoryKey,
            _expected_version: i64,
            _new_available: u32,
        ) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn insert_if_absent(
            &self,
            _record: NewInventoryRecord,
        ) -> Result<InsertOutcome, RepositoryError> {
            Ok(InsertOutcome::AlreadyPresent)
        }

        async fn nearest(
            &self,
            _embedding: &Embedding,
            _limit: usize,
        ) -> Result<Vec<RoomMatch>, RepositoryError> {
            match self {
                Self::Stalled => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
                Self::Failing => Err(RepositoryError::Decode("corrupt embedding_json".to_string())),
            }
        }

        async fn list(&self) -> Result<Vec<InventoryRecord>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn stalled_store_surfaces_as_search_timeout() {
        let tool = RoomSearchTool::new(
            Arc::new(BrokenStore::Stalled),
            Arc::new(KeywordEmbedder),
            3,
            Duration::from_millis(20),
        );

        let error = tool.search("ocean").await.expect_err("stalled");
        assert_eq!(error, SearchError::Timeout { operation: "similarity search", after_ms: 20 });
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn failing_store_is_distinct_from_timeout_and_embedding_errors() {
        let tool = RoomSearchTool::new(
            Arc::new(BrokenStore::Failing),
            Arc::new(KeywordEmbedder),
            3,
            Duration::from_secs(1),
        );

        let error = tool.execute(json!({ "query": "ocean" })).await.expect_err("failing");
        let ToolError::Search(SearchError::StoreUnavailable(detail)) = &error else {
            panic!("expected store unavailable, got {error:?}");
        };
        assert!(detail.contains("corrupt embedding_json"));
        assert!(error.user_message().contains("客室検索"));
        assert!(!error.user_message().contains("corrupt"), "internal detail should not leak");
    }
}
