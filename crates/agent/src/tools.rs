use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use concierge_core::errors::{DomainError, InventoryError, SearchError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl From<DomainError> for ToolError {
    fn from(error: DomainError) -> Self {
        Self::InvalidArguments(error.to_string())
    }
}

impl ToolError {
    /// Text handed back to the model in place of a tool result.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArguments(detail) => {
                format!("入力内容を確認してください（{detail}）。")
            }
            Self::Inventory(InventoryError::Invalid(error)) => {
                format!("入力内容を確認してください（{error}）。")
            }
            Self::Inventory(error) if error.outcome_unknown() => {
                "予約の確定処理が時間内に完了しなかったため、予約が成立したかどうか確認できませんでした。もう一度予約する前に、必ず空室状況を確認してください。"
                    .to_string()
            }
            Self::Inventory(InventoryError::Contention { .. }) => {
                "申し訳ございません。ただいま予約が集中しているため確定できませんでした。もう一度お試しください。"
                    .to_string()
            }
            Self::Inventory(_) => {
                "申し訳ございません。現在、客室在庫システムに接続できません。しばらくしてからもう一度お試しください。"
                    .to_string()
            }
            Self::Search(_) => {
                "申し訳ございません。現在、客室検索をご利用いただけません。しばらくしてからもう一度お試しください。"
                    .to_string()
            }
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: Value) -> Result<String, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.definition().name, Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|tool| tool.definition())
    }

    /// Runs a tool by name. Failures never escape: they come back as text the
    /// model can relay to the guest.
    pub async fn invoke(&self, name: &str, arguments: Value) -> String {
        let Some(tool) = self.tools.get(name) else {
            warn!(event_name = "agent.tool.unknown", tool = name, "model requested unknown tool");
            return format!("ツール「{name}」は利用できません。");
        };

        match tool.execute(arguments).await {
            Ok(output) => {
                info!(event_name = "agent.tool.invoked", tool = name, "tool completed");
                output
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tool.failed",
                    tool = name,
                    error = %error,
                    "tool failed; returning user-facing message"
                );
                error.user_message()
            }
        }
    }
}

pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|error| ToolError::InvalidArguments(error.to_string()))
}

/// Accepts `2` as well as `"2"`; models are not consistent about it.
pub fn lenient_integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Integer {
        Number(i64),
        Text(String),
    }

    match Integer::deserialize(deserializer)? {
        Integer::Number(value) => Ok(value),
        Integer::Text(raw) => raw
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected an integer, got `{raw}`"))),
    }
}
