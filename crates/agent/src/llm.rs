use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use concierge_core::config::{LlmConfig, LlmProvider};

use crate::openai::{EndpointSettings, HttpFailure, OpenAiTransport};
use crate::retry::RetryConfig;
use crate::tools::ToolDefinition;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: Option<String>, tool_calls: Vec<ToolCall> },
    Tool { tool_call_id: String, content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant { content: Some(content.into()), tool_calls: Vec::new() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("could not decode model response: {0}")]
    Decode(String),
}

impl From<HttpFailure> for ModelError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Timeout { after_ms } => Self::Timeout { after_ms },
            HttpFailure::Status { status, body } => Self::Status { status, body },
            HttpFailure::Decode(detail) => Self::Decode(detail),
            HttpFailure::Transport(detail) | HttpFailure::Configuration(detail) => {
                Self::Request(detail)
            }
        }
    }
}

/// A chat-completions model that can request tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError>;
}

pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, ModelError> {
    let settings = EndpointSettings {
        kind: config.provider.into(),
        base_url: config.base_url.clone(),
        api_key: config.api_key.clone(),
        api_version: config.api_version.clone(),
        model: config.model.clone(),
        timeout: Duration::from_secs(config.timeout_secs),
        retry: RetryConfig::default().with_max_retries(config.max_retries),
    };
    Ok(Arc::new(OpenAiChatModel::new(OpenAiTransport::new(settings)?)))
}

pub fn provider_label(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "openai",
        LlmProvider::AzureOpenAi => "azure_openai",
        LlmProvider::Ollama => "ollama",
    }
}

pub struct OpenAiChatModel {
    transport: OpenAiTransport,
}

impl OpenAiChatModel {
    pub fn new(transport: OpenAiTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        self.transport.model()
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
        let body = completion_body(self.transport.model(), &request);
        let response: Value = self.transport.post_json("chat/completions", &body).await?;
        parse_completion(&response)
    }
}

fn completion_body(model: &str, request: &ChatRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();
    let mut body = json!({ "model": model, "messages": messages });

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }
    body
}

fn message_to_wire(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System { content } => json!({ "role": "system", "content": content }),
        ChatMessage::User { content } => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant { content, tool_calls } => {
            let mut wire = json!({ "role": "assistant", "content": content });
            if !tool_calls.is_empty() {
                wire["tool_calls"] = tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments.to_string(),
                            }
                        })
                    })
                    .collect();
            }
            wire
        }
        ChatMessage::Tool { tool_call_id, content } => {
            json!({ "role": "tool", "tool_call_id": tool_call_id, "content": content })
        }
    }
}

fn parse_completion(response: &Value) -> Result<ChatResponse, ModelError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| ModelError::Decode("response has no choices[0].message".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string);

    let tool_calls = match message.get("tool_calls").and_then(Value::as_array) {
        Some(calls) => calls.iter().map(parse_tool_call).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ChatResponse { content, tool_calls })
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, ModelError> {
    let name = call
        .pointer("/function/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::Decode("tool call without function name".to_string()))?;
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

    // Providers send arguments as a JSON string; some local models send an object.
    let arguments = match call.pointer("/function/arguments") {
        Some(Value::String(raw)) if raw.trim().is_empty() => json!({}),
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
        None => json!({}),
    };

    Ok(ToolCall { id, name: name.to_string(), arguments })
}
