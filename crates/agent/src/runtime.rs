//! The tool-calling loop behind every concierge turn.
//!
//! One turn sends the thread history with the tool catalog, executes whatever
//! tools the model asks for, feeds the results back and repeats until the
//! model answers in plain text. A failed turn leaves the thread exactly as it
//! was before the user spoke.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use concierge_core::config::{AgentConfig, LlmConfig};

use crate::llm::{ChatMessage, ChatModel, ChatRequest, ModelError};
use crate::prompts::{CONCIERGE_INSTRUCTIONS, DEFAULT_AGENT_NAME};
use crate::retry::RetryConfig;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Debug)]
pub struct ConversationThread {
    id: Uuid,
    messages: Vec<ChatMessage>,
}

impl Default for ConversationThread {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationThread {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4(), messages: Vec::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    ToolCall { id: String, name: String, arguments: Value },
    ToolResult { id: String, name: String, result: String, elapsed: Duration },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub content: String,
    pub events: Vec<TurnEvent>,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model did not answer within {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("model kept requesting tools after {rounds} rounds")]
    ToolRoundLimit { rounds: u32 },
}

pub struct AgentRuntime {
    name: String,
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    instructions: String,
    max_tool_rounds: u32,
    model_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            model,
            tools,
            instructions: CONCIERGE_INSTRUCTIONS.to_string(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub fn from_config(
        agent: &AgentConfig,
        llm: &LlmConfig,
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(model, tools)
            .with_name(&agent.name)
            .with_max_tool_rounds(agent.max_tool_rounds)
            .with_model_timeout(model_budget(llm))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.instructions = instructions.to_string();
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_model_timeout(mut self, model_timeout: Duration) -> Self {
        self.model_timeout = model_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Runs one user turn. `observer` sees every tool call and result as it
    /// happens; the same events are returned in the reply.
    pub async fn invoke<F>(
        &self,
        thread: &mut ConversationThread,
        user_text: &str,
        mut observer: F,
    ) -> Result<AgentReply, AgentError>
    where
        F: FnMut(&TurnEvent),
    {
        let checkpoint = thread.messages.len();
        thread.messages.push(ChatMessage::user(user_text));

        match self.run_turn(thread, &mut observer).await {
            Ok(reply) => {
                info!(
                    event_name = "agent.turn.completed",
                    thread = %thread.id,
                    agent = %self.name,
                    tool_calls = reply.events.len() / 2,
                    "turn completed"
                );
                Ok(reply)
            }
            Err(error) => {
                thread.messages.truncate(checkpoint);
                warn!(
                    event_name = "agent.turn.failed",
                    thread = %thread.id,
                    error = %error,
                    "turn failed; thread rolled back"
                );
                Err(error)
            }
        }
    }

    async fn run_turn<F>(
        &self,
        thread: &mut ConversationThread,
        observer: &mut F,
    ) -> Result<AgentReply, AgentError>
    where
        F: FnMut(&TurnEvent),
    {
        let definitions = self.tools.definitions();
        let mut events = Vec::new();
        let mut rounds = 0;

        loop {
            let mut messages = Vec::with_capacity(thread.messages.len() + 1);
            messages.push(ChatMessage::system(self.instructions.as_str()));
            messages.extend(thread.messages.iter().cloned());
            let request = ChatRequest { messages, tools: definitions.clone() };

            let after_ms = u64::try_from(self.model_timeout.as_millis()).unwrap_or(u64::MAX);
            let response = timeout(self.model_timeout, self.model.complete(request))
                .await
                .map_err(|_| AgentError::Timeout { after_ms })??;

            if response.tool_calls.is_empty() {
                let content = response.content.unwrap_or_default();
                thread.messages.push(ChatMessage::assistant(content.as_str()));
                return Ok(AgentReply { content, events });
            }

            if rounds == self.max_tool_rounds {
                return Err(AgentError::ToolRoundLimit { rounds });
            }
            rounds += 1;

            thread.messages.push(ChatMessage::Assistant {
                content: response.content,
                tool_calls: response.tool_calls.clone(),
            });

            for call in response.tool_calls {
                let requested = TurnEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                };
                observer(&requested);
                events.push(requested);

                debug!(tool = %call.name, round = rounds, "executing tool call");
                let started = Instant::now();
                let result = self.tools.invoke(&call.name, call.arguments).await;
                let elapsed = started.elapsed();

                thread
                    .messages
                    .push(ChatMessage::Tool { tool_call_id: call.id.clone(), content: result.clone() });

                let finished = TurnEvent::ToolResult { id: call.id, name: call.name, result, elapsed };
                observer(&finished);
                events.push(finished);
            }
        }
    }
}

/// Upper bound for one model call including the transport's own retries.
pub fn model_budget(llm: &LlmConfig) -> Duration {
    let retry = RetryConfig::default().with_max_retries(llm.max_retries);
    let attempts = llm.max_retries.saturating_add(1);
    Duration::from_secs(llm.timeout_secs).saturating_mul(attempts) + retry.total_backoff()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{AgentError, AgentRuntime, ConversationThread, TurnEvent};
    use crate::llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ModelError, ToolCall};
    use crate::tools::{Tool, ToolDefinition, ToolError, ToolRegistry};

    struct Scripted {
        replies: Mutex<VecDeque<Result<ChatResponse, ModelError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ChatResponse, ModelError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ModelError> {
            self.seen.lock().expect("lock").push(request);
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok(text("(script exhausted)")))
        }
    }

    struct Today;

    #[async_trait]
    impl Tool for Today {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "TimePlugin-get_today".to_string(),
                description: "today".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            }
        }

        async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
            Ok("2025-04-11".to_string())
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse { content: Some(content.to_string()), tool_calls: Vec::new() }
    }

    fn call(id: &str) -> ChatResponse {
        ChatResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                name: "TimePlugin-get_today".to_string(),
                arguments: json!({}),
            }],
        }
    }

    fn runtime(model: Arc<Scripted>) -> AgentRuntime {
        let mut tools = ToolRegistry::default();
        tools.register(Today);
        AgentRuntime::new(model, Arc::new(tools))
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_the_answer() {
        let model = Scripted::new(vec![Ok(call("call_1")), Ok(text("本日は2025-04-11です。"))]);
        let agent = runtime(Arc::clone(&model));
        let mut thread = ConversationThread::new();
        let mut observed = Vec::new();

        let reply = agent
            .invoke(&mut thread, "今日の日付は？", |event| observed.push(event.clone()))
            .await
            .expect("reply");

        assert_eq!(reply.content, "本日は2025-04-11です。");
        assert_eq!(observed, reply.events);
        assert!(matches!(&reply.events[0], TurnEvent::ToolCall { name, .. } if name == "TimePlugin-get_today"));
        assert!(matches!(&reply.events[1], TurnEvent::ToolResult { result, .. } if result == "2025-04-11"));

        // user, assistant(tool_calls), tool, assistant(text)
        assert_eq!(thread.len(), 4);
        let seen = model.seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0].messages[0], ChatMessage::System { content } if content.contains("ロビーボーイ")));
        assert!(matches!(
            seen[1].messages.last(),
            Some(ChatMessage::Tool { tool_call_id, .. }) if tool_call_id == "call_1"
        ));
        assert_eq!(seen[0].tools.len(), 1);
    }

    #[tokio::test]
    async fn failed_turn_rolls_back_the_thread() {
        let model = Scripted::new(vec![
            Ok(text("いらっしゃいませ。")),
            Ok(call("call_1")),
            Err(ModelError::Status { status: 500, body: "boom".to_string() }),
            Ok(text("はい、承ります。")),
        ]);
        let agent = runtime(model);
        let mut thread = ConversationThread::new();

        agent.invoke(&mut thread, "こんにちは", |_| {}).await.expect("first turn");
        assert_eq!(thread.len(), 2);

        let error = agent.invoke(&mut thread, "今日は？", |_| {}).await.expect_err("model failure");
        assert!(matches!(error, AgentError::Model(ModelError::Status { status: 500, .. })));
        assert_eq!(thread.len(), 2, "partial tool exchange is discarded");

        let reply = agent.invoke(&mut thread, "予約したいです", |_| {}).await.expect("recovers");
        assert_eq!(reply.content, "はい、承ります。");
        assert_eq!(thread.len(), 4);
    }

    #[tokio::test]
    async fn endless_tool_requests_hit_the_round_limit() {
        let model = Scripted::new(vec![Ok(call("a")), Ok(call("b")), Ok(call("c"))]);
        let agent = runtime(model).with_max_tool_rounds(2);
        let mut thread = ConversationThread::new();

        let error = agent.invoke(&mut thread, "loop", |_| {}).await.expect_err("limit");
        assert!(matches!(error, AgentError::ToolRoundLimit { rounds: 2 }));
        assert!(thread.is_empty());
    }

    struct Silent;

    #[async_trait]
    impl ChatModel for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(ChatResponse::default())
        }
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let agent = AgentRuntime::new(Arc::new(Silent), Arc::new(ToolRegistry::default()))
            .with_model_timeout(std::time::Duration::from_millis(20));
        let mut thread = ConversationThread::new();

        let error = agent.invoke(&mut thread, "hello", |_| {}).await.expect_err("timeout");
        assert!(matches!(error, AgentError::Timeout { after_ms: 20 }));
        assert!(thread.is_empty());
    }
}
