//! Shared HTTP plumbing for OpenAI-compatible endpoints.
//!
//! OpenAI and Ollama take `{base}/{operation}`; Azure OpenAI routes by
//! deployment and requires an `api-version` query parameter. OpenAI sends a
//! bearer token, Azure an `api-key` header, Ollama nothing.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use concierge_core::config::{EmbeddingProvider, LlmProvider};

use crate::retry::{execute_with_retry, is_retryable_status_code, RetryConfig};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    AzureOpenAi,
    Ollama,
}

impl From<LlmProvider> for ProviderKind {
    fn from(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::OpenAi => Self::OpenAi,
            LlmProvider::AzureOpenAi => Self::AzureOpenAi,
            LlmProvider::Ollama => Self::Ollama,
        }
    }
}

impl ProviderKind {
    pub fn from_embedding(provider: EmbeddingProvider) -> Option<Self> {
        match provider {
            EmbeddingProvider::OpenAi => Some(Self::OpenAi),
            EmbeddingProvider::AzureOpenAi => Some(Self::AzureOpenAi),
            EmbeddingProvider::Ollama => Some(Self::Ollama),
            EmbeddingProvider::Hashing => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpFailure {
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Configuration(String),
}

impl HttpFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Status { status, .. } => is_retryable_status_code(*status),
            Self::Decode(_) | Self::Configuration(_) => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EndpointSettings {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub api_version: Option<String>,
    /// Model name, or deployment name for Azure.
    pub model: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

#[derive(Clone)]
pub struct OpenAiTransport {
    client: Client,
    headers: HeaderMap,
    settings: EndpointSettings,
}

impl OpenAiTransport {
    pub fn new(settings: EndpointSettings) -> Result<Self, HttpFailure> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|error| HttpFailure::Configuration(error.to_string()))?;
        let headers = build_headers(&settings)?;
        Ok(Self { client, headers, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn kind(&self) -> ProviderKind {
        self.settings.kind
    }

    pub fn endpoint(&self, operation: &str) -> String {
        let settings = &self.settings;
        match settings.kind {
            ProviderKind::OpenAi => {
                let base = settings.base_url.as_deref().unwrap_or(OPENAI_API_BASE);
                format!("{}/{operation}", base.trim_end_matches('/'))
            }
            ProviderKind::Ollama => {
                let base = settings.base_url.as_deref().unwrap_or(OLLAMA_API_BASE);
                format!("{}/{operation}", base.trim_end_matches('/'))
            }
            ProviderKind::AzureOpenAi => format!(
                "{}/openai/deployments/{}/{operation}?api-version={}",
                settings.base_url.as_deref().unwrap_or_default().trim_end_matches('/'),
                settings.model,
                settings.api_version.as_deref().unwrap_or_default(),
            ),
        }
    }

    pub async fn post_json<B, R>(
        &self,
        operation: &'static str,
        body: &B,
    ) -> Result<R, HttpFailure>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let endpoint = self.endpoint(operation);
        let url = endpoint.as_str();
        let timeout_ms = u64::try_from(self.settings.timeout.as_millis()).unwrap_or(u64::MAX);

        let response = execute_with_retry(
            &self.settings.retry,
            operation,
            HttpFailure::is_retryable,
            move || async move {
                let response = self
                    .client
                    .post(url)
                    .headers(self.headers.clone())
                    .json(body)
                    .send()
                    .await
                    .map_err(|error| {
                        if error.is_timeout() {
                            HttpFailure::Timeout { after_ms: timeout_ms }
                        } else {
                            HttpFailure::Transport(error.to_string())
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(HttpFailure::Status { status: status.as_u16(), body });
                }
                Ok(response)
            },
        )
        .await?;

        let bytes = response.bytes().await.map_err(|error| {
            if error.is_timeout() {
                HttpFailure::Timeout { after_ms: timeout_ms }
            } else {
                HttpFailure::Transport(error.to_string())
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|error| HttpFailure::Decode(error.to_string()))
    }
}

fn build_headers(settings: &EndpointSettings) -> Result<HeaderMap, HttpFailure> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let key = settings.api_key.as_ref().map(|key| key.expose_secret().to_string());
    match (settings.kind, key) {
        (ProviderKind::OpenAi, Some(key)) => {
            headers.insert(AUTHORIZATION, sensitive_value(&format!("Bearer {key}"))?);
        }
        (ProviderKind::AzureOpenAi, Some(key)) => {
            headers.insert("api-key", sensitive_value(&key)?);
        }
        (ProviderKind::OpenAi | ProviderKind::AzureOpenAi, None) => {
            return Err(HttpFailure::Configuration("missing api key".to_string()));
        }
        (ProviderKind::Ollama, _) => {}
    }
    Ok(headers)
}

fn sensitive_value(raw: &str) -> Result<HeaderValue, HttpFailure> {
    let mut value = HeaderValue::from_str(raw)
        .map_err(|_| HttpFailure::Configuration("api key is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}
