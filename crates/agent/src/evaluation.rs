//! Offline evaluation: replay canned guest queries into a JSONL dataset, then
//! have a judge model grade each recorded answer for task adherence.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{ChatMessage, ChatModel, ChatRequest, ModelError};
use crate::runtime::{AgentError, AgentRuntime, ConversationThread, TurnEvent};
use crate::tools::ToolDefinition;

pub const DEFAULT_DATASET_PATH: &str = "evaluation_dataset.jsonl";

pub const SIMULATED_QUERIES: [&str; 5] = [
    "明日のデラックスルームの空室状況を確認してください。",
    "明日のデラックスルームを1室予約してください。",
    "今日の日付を教えてください。",
    "19:00に2名でディナーテーブルを予約したいです。",
    "海が見える部屋を探しています。検索してもらえますか？",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedToolCall {
    #[serde(rename = "type")]
    pub kind: String,
    pub tool_call_id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub query: String,
    pub tool_calls: Vec<RecordedToolCall>,
    /// Definitions of the tools this query actually used.
    pub tool_definitions: Vec<ToolDefinition>,
    pub response: String,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("could not access `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("could not serialize evaluation record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("agent failed on query `{query}`: {source}")]
    Agent { query: String, source: AgentError },
}

/// Replays `queries` over one shared thread, as a single guest would.
pub async fn generate_dataset(
    runtime: &AgentRuntime,
    queries: &[&str],
) -> Result<Vec<EvaluationRecord>, EvaluationError> {
    let mut thread = ConversationThread::new();
    let mut records = Vec::with_capacity(queries.len());

    for query in queries {
        let reply = runtime
            .invoke(&mut thread, query, |_| {})
            .await
            .map_err(|source| EvaluationError::Agent { query: query.to_string(), source })?;

        let tool_calls: Vec<RecordedToolCall> = reply
            .events
            .iter()
            .filter_map(|event| match event {
                TurnEvent::ToolCall { id, name, arguments } => Some(RecordedToolCall {
                    kind: "tool_call".to_string(),
                    tool_call_id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                TurnEvent::ToolResult { .. } => None,
            })
            .collect();

        let mut tool_definitions: Vec<ToolDefinition> = Vec::new();
        for call in &tool_calls {
            if tool_definitions.iter().any(|definition| definition.name == call.name) {
                continue;
            }
            if let Some(definition) = runtime.tools().definition(&call.name) {
                tool_definitions.push(definition);
            }
        }

        records.push(EvaluationRecord {
            query: query.to_string(),
            tool_calls,
            tool_definitions,
            response: reply.content,
        });
    }

    info!(event_name = "evaluation.dataset.generated", records = records.len(), "dataset generated");
    Ok(records)
}

pub fn write_jsonl(path: &Path, records: &[EvaluationRecord]) -> Result<(), EvaluationError> {
    let io_error = |source| EvaluationError::Io { path: path.to_path_buf(), source };

    let mut file = fs::File::create(path).map_err(io_error)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}").map_err(io_error)?;
    }
    file.flush().map_err(io_error)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Adherence {
    Pass,
    Fail,
    Unknown(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdherenceVerdict {
    pub result: Adherence,
    pub reason: String,
}

const JUDGE_INSTRUCTIONS: &str = "\
You grade a hotel concierge assistant for task adherence.
Given the guest query, the assistant's final response and the tool definitions \
available to the assistant, decide whether the response addresses the query, \
stays within what the tools allow and does not invent bookings or facts.
Reply with JSON only: {\"task_adherence_result\": \"pass\" | \"fail\", \"reason\": \"...\"}";

/// LLM-as-judge for task adherence.
pub struct TaskAdherenceEvaluator {
    model: Arc<dyn ChatModel>,
    tool_definitions: Vec<ToolDefinition>,
}

impl TaskAdherenceEvaluator {
    pub fn new(model: Arc<dyn ChatModel>, tool_definitions: Vec<ToolDefinition>) -> Self {
        Self { model, tool_definitions }
    }

    pub async fn evaluate(&self, query: &str, response: &str) -> Result<AdherenceVerdict, ModelError> {
        let payload = json!({
            "query": query,
            "response": response,
            "tool_definitions": self.tool_definitions,
        });
        let request = ChatRequest {
            messages: vec![ChatMessage::system(JUDGE_INSTRUCTIONS), ChatMessage::user(payload.to_string())],
            tools: Vec::new(),
        };

        let reply = self.model.complete(request).await?;
        Ok(parse_verdict(reply.content.as_deref().unwrap_or_default()))
    }
}

fn parse_verdict(raw: &str) -> AdherenceVerdict {
    #[derive(Deserialize)]
    struct JudgeReply {
        #[serde(alias = "result")]
        task_adherence_result: String,
        #[serde(default)]
        reason: String,
    }

    let embedded = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<JudgeReply>(&raw[start..=end]).ok()
        }
        _ => None,
    };

    let (result, reason) = match embedded {
        Some(reply) => (reply.task_adherence_result, reply.reason),
        None => {
            let field = |prefix: &str| {
                raw.lines().find_map(|line| {
                    let line = line.trim();
                    line.get(..prefix.len())
                        .filter(|head| head.eq_ignore_ascii_case(prefix))
                        .map(|_| line[prefix.len()..].trim().to_string())
                })
            };
            (field("RESULT:").unwrap_or_default(), field("REASON:").unwrap_or_default())
        }
    };

    let result = match result.trim().to_lowercase().as_str() {
        "pass" => Adherence::Pass,
        "fail" => Adherence::Fail,
        other => Adherence::Unknown(other.to_string()),
    };
    AdherenceVerdict { result, reason }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EvaluationFailure {
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub passed: usize,
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Grades every non-blank line of a JSONL dataset. A line that cannot be
/// decoded or judged counts as a failure; only an unreadable file aborts.
pub async fn score_dataset(
    evaluator: &TaskAdherenceEvaluator,
    path: &Path,
) -> Result<EvaluationSummary, EvaluationError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| EvaluationError::Io { path: path.to_path_buf(), source })?;
    let mut summary = EvaluationSummary::default();

    for (index, line) in contents.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.total += 1;

        let record: Value = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(error) => {
                summary
                    .failures
                    .push(EvaluationFailure { line: line_number, reason: format!("JSONデコードエラー: {error}") });
                continue;
            }
        };
        let query = record.get("query").and_then(Value::as_str).unwrap_or("クエリが提供されていません");
        let response =
            record.get("response").and_then(Value::as_str).unwrap_or("レスポンスが提供されていません");

        let failure = match evaluator.evaluate(query, response).await {
            Ok(AdherenceVerdict { result: Adherence::Pass, .. }) => None,
            Ok(AdherenceVerdict { result: Adherence::Fail, reason }) if reason.trim().is_empty() => {
                Some("タスク遵守評価で失敗".to_string())
            }
            Ok(AdherenceVerdict { result: Adherence::Fail, reason }) => Some(reason),
            Ok(AdherenceVerdict { result: Adherence::Unknown(result), .. }) => {
                Some(format!("不明な結果: {result}"))
            }
            Err(error) => Some(format!("評価エラー: {error}")),
        };

        match failure {
            None => summary.passed += 1,
            Some(reason) => {
                warn!(event_name = "evaluation.line.failed", line = line_number, reason = %reason, "evaluation failed");
                summary.failures.push(EvaluationFailure { line: line_number, reason });
            }
        }
    }

    info!(
        event_name = "evaluation.dataset.scored",
        total = summary.total,
        passed = summary.passed,
        failed = summary.failures.len(),
        "dataset scored"
    );
    Ok(summary)
}
