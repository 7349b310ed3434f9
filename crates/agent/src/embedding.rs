use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use concierge_core::config::{AppConfig, EmbeddingProvider};
use concierge_core::domain::inventory::Embedding;
use concierge_core::errors::SearchError;
pub use concierge_core::search::Embedder;

use crate::openai::{EndpointSettings, HttpFailure, OpenAiTransport, ProviderKind};
use crate::retry::RetryConfig;

pub const DEFAULT_HASHING_DIMENSIONS: usize = 256;

pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, SearchError> {
    let embedding = &config.embedding;
    let Some(kind) = ProviderKind::from_embedding(embedding.provider) else {
        let dimensions = embedding
            .dimensions
            .and_then(|dimensions| usize::try_from(dimensions).ok())
            .unwrap_or(DEFAULT_HASHING_DIMENSIONS);
        return Ok(Arc::new(HashingEmbedder::new(dimensions)));
    };

    let settings = EndpointSettings {
        kind,
        base_url: embedding.base_url.clone(),
        api_key: config.embedding_api_key().cloned(),
        api_version: embedding.api_version.clone(),
        model: embedding.model.clone(),
        timeout: Duration::from_secs(embedding.timeout_secs),
        retry: RetryConfig::default().with_max_retries(embedding.max_retries),
    };
    let transport = OpenAiTransport::new(settings)
        .map_err(|error| SearchError::EmbeddingFailure(error.to_string()))?;

    Ok(Arc::new(OpenAiEmbedder::new(transport, embedding.dimensions)))
}

pub fn provider_label(provider: EmbeddingProvider) -> &'static str {
    match provider {
        EmbeddingProvider::OpenAi => "openai",
        EmbeddingProvider::AzureOpenAi => "azure_openai",
        EmbeddingProvider::Ollama => "ollama",
        EmbeddingProvider::Hashing => "hashing",
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: [&'a str; 1],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    transport: OpenAiTransport,
    dimensions: Option<u32>,
}

impl OpenAiEmbedder {
    pub fn new(transport: OpenAiTransport, dimensions: Option<u32>) -> Self {
        Self { transport, dimensions }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
        let request =
            EmbeddingRequest { input: [text], model: self.transport.model(), dimensions: self.dimensions };

        let response: EmbeddingResponse =
            self.transport.post_json("embeddings", &request).await.map_err(|error| match error {
                HttpFailure::Timeout { after_ms } => {
                    SearchError::Timeout { operation: "embedding request", after_ms }
                }
                other => SearchError::EmbeddingFailure(other.to_string()),
            })?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| {
                SearchError::EmbeddingFailure("embedding response contained no vector".to_string())
            })?;

        debug!(
            event_name = "embedding.generated",
            model = self.transport.model(),
            dimensions = vector.len(),
            "embedding generated"
        );
        Ok(Embedding(vector))
    }
}

/// Deterministic offline embedder.
///
/// Lower-cased words and in-word character bigrams are hashed into signed
/// buckets, then L2-normalised. Texts sharing vocabulary land close together,
/// which is enough for demos and tests without a hosted model.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, SearchError> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty())
        {
            self.accumulate(&mut vector, word);
            let chars: Vec<char> = word.chars().collect();
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                self.accumulate(&mut vector, &bigram);
            }
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(SearchError::EmbeddingFailure(
                "cannot embed text without any words".to_string(),
            ));
        }
        vector.iter_mut().for_each(|value| *value /= norm);
        Ok(Embedding(vector))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}
