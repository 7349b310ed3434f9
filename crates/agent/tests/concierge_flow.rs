use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use concierge_agent::embedding::HashingEmbedder;
use concierge_agent::evaluation::{
    generate_dataset, score_dataset, write_jsonl, TaskAdherenceEvaluator,
};
use concierge_agent::llm::{ChatModel, ChatRequest, ChatResponse, ModelError, ToolCall};
use concierge_agent::skills::{ConciergeSkills, FixedClock};
use concierge_agent::{AgentRuntime, ConversationThread, TurnEvent};
use concierge_core::domain::inventory::InventoryKey;
use concierge_db::{BookingDesk, InMemoryInventoryRepository, InventoryRepository, SeedDataset};

struct ScriptedModel {
    replies: Mutex<VecDeque<ChatResponse>>,
}

impl ScriptedModel {
    fn new(replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()) })
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ModelError> {
        self.replies
            .lock()
            .expect("lock")
            .pop_front()
            .ok_or_else(|| ModelError::Request("script exhausted".to_string()))
    }
}

fn say(content: &str) -> ChatResponse {
    ChatResponse { content: Some(content.to_string()), tool_calls: Vec::new() }
}

fn use_tool(id: &str, name: &str, arguments: serde_json::Value) -> ChatResponse {
    ChatResponse {
        content: None,
        tool_calls: vec![ToolCall { id: id.to_string(), name: name.to_string(), arguments }],
    }
}

async fn seeded_concierge(model: Arc<ScriptedModel>) -> (AgentRuntime, Arc<dyn InventoryRepository>) {
    let repository: Arc<dyn InventoryRepository> = Arc::new(InMemoryInventoryRepository::default());
    let embedder = Arc::new(HashingEmbedder::new(512));
    SeedDataset::load(repository.as_ref(), embedder.as_ref()).await.expect("seed");

    let registry = ConciergeSkills {
        desk: Arc::new(BookingDesk::new(Arc::clone(&repository))),
        embedder,
        clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 4, 11).expect("date"))),
        search_top_k: 3,
    }
    .into_registry();

    (AgentRuntime::new(model, Arc::new(registry)), repository)
}

#[tokio::test]
async fn check_then_book_consumes_inventory() {
    let model = ScriptedModel::new(vec![
        use_tool(
            "call_1",
            "BookingPlugin-check_availability",
            json!({ "room_type": "suite", "date": "2025-04-12" }),
        ),
        say("明日はスイートが2室空いております。1泊$250です。予約いたしますか？"),
        use_tool(
            "call_2",
            "BookingPlugin-confirm_booking",
            json!({ "room_type": "suite", "date": "2025-04-12", "count": 2 }),
        ),
        say("2室のご予約を承りました。"),
        use_tool(
            "call_3",
            "BookingPlugin-confirm_booking",
            json!({ "room_type": "suite", "date": "2025-04-12", "count": 1 }),
        ),
        say("申し訳ございません、満室です。"),
    ]);
    let (agent, repository) = seeded_concierge(model).await;
    let mut thread = ConversationThread::new();

    let first = agent.invoke(&mut thread, "明日スイートは空いていますか？", |_| {}).await.expect("check");
    assert!(matches!(
        &first.events[1],
        TurnEvent::ToolResult { result, .. } if result == "2025-04-12に2室のsuiteが空いています。料金: $250"
    ));

    let second = agent.invoke(&mut thread, "2室お願いします", |_| {}).await.expect("book");
    assert!(matches!(
        &second.events[1],
        TurnEvent::ToolResult { result, .. } if result.starts_with("✅ 2025-04-12に2室のsuiteを$250で予約確定")
    ));

    let third = agent.invoke(&mut thread, "もう1室", |_| {}).await.expect("sold out");
    assert!(matches!(
        &third.events[1],
        TurnEvent::ToolResult { result, .. } if result == "2025-04-12にsuiteは0室のみ空いています。"
    ));

    let key = InventoryKey::parse("suite", "2025-04-12").expect("key");
    let suite = repository.find(&key).await.expect("find").expect("suite");
    assert_eq!(suite.available, 0);
    assert_eq!(thread.len(), 12);
}

#[tokio::test]
async fn semantic_search_surfaces_the_suite_for_ocean_views() {
    let model = ScriptedModel::new(vec![
        use_tool(
            "call_1",
            "SemanticSearchPlugin-search_rooms_by_description",
            json!({ "query": "キングサイズベッドとオーシャンビューの豪華なスイートルーム" }),
        ),
        say("オーシャンビューのスイートがございます。"),
    ]);
    let (agent, _) = seeded_concierge(model).await;
    let mut thread = ConversationThread::new();

    let reply = agent.invoke(&mut thread, "海が見える部屋を探しています。", |_| {}).await.expect("search");
    let TurnEvent::ToolResult { result, .. } = &reply.events[1] else {
        panic!("expected a tool result, got {:?}", reply.events[1]);
    };
    assert!(result.starts_with("\n🏨 **Suite**"), "unexpected ranking: {result}");
    assert_eq!(result.matches("🏨").count(), 3);
}

#[tokio::test]
async fn generated_dataset_scores_through_the_judge() {
    let model = ScriptedModel::new(vec![
        use_tool("call_1", "TimePlugin-get_today", json!({})),
        say("本日は2025-04-11です。"),
        use_tool(
            "call_2",
            "DiningPlugin-reserve_table",
            json!({ "time": "19:00", "party_size": "2" }),
        ),
        say("19:00に2名様でご予約しました。"),
    ]);
    let (agent, _) = seeded_concierge(model).await;

    let records = generate_dataset(
        &agent,
        &["今日の日付を教えてください。", "19:00に2名でディナーテーブルを予約したいです。"],
    )
    .await
    .expect("dataset");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tool_calls[0].kind, "tool_call");
    assert_eq!(records[0].tool_definitions.len(), 1);
    assert_eq!(records[0].tool_definitions[0].name, "TimePlugin-get_today");
    assert_eq!(records[1].response, "19:00に2名様でご予約しました。");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("evaluation_dataset.jsonl");
    write_jsonl(&path, &records).expect("write");
    let mut contents = std::fs::read_to_string(&path).expect("read");
    contents.push_str("\nnot json\n");
    std::fs::write(&path, contents).expect("append");

    let judge = ScriptedModel::new(vec![
        say(r#"{"task_adherence_result": "pass", "reason": "used get_today"}"#),
        say("RESULT: fail\nREASON: did not confirm the party size"),
    ]);
    let evaluator = TaskAdherenceEvaluator::new(judge, agent.tools().definitions());
    let summary = score_dataset(&evaluator, &path).await.expect("score");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert!(!summary.is_success());
    assert_eq!(summary.failures[0].line, 2);
    assert_eq!(summary.failures[0].reason, "did not confirm the party size");
    assert_eq!(summary.failures[1].line, 4);
    assert!(summary.failures[1].reason.starts_with("JSONデコードエラー"));
}
