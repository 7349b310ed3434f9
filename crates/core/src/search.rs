use async_trait::async_trait;

use crate::domain::inventory::Embedding;
use crate::errors::SearchError;

/// Turns text into a vector comparable with the stored room embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError>;
}
