//! Text surface of the chat session: banner, exit handling and how tool
//! activity is echoed to the guest.

use serde_json::Value;

use crate::runtime::TurnEvent;

pub const WELCOME_BANNER: &str = "🛎️  スマートホスピタリティアシスタントへようこそ";
pub const EXIT_HINT: &str =
    "下にメッセージを入力してください。終了するには'exit'または'終了'と入力してください。";
pub const USER_PROMPT: &str = "👤 ユーザー: ";
pub const SESSION_CLOSED: &str = "👋 セッション終了";
pub const TURN_FAILED: &str =
    "申し訳ございません。ただいま応答できませんでした。もう一度お試しください。";

pub const EXIT_COMMANDS: [&str; 4] = ["exit", "quit", "終了", "やめる"];

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_COMMANDS.iter().any(|command| *command == input)
}

pub fn format_event(event: &TurnEvent) -> String {
    match event {
        TurnEvent::ToolCall { name, arguments, .. } => {
            format!("🛠️  ツール実行 → {name}\n   引数 → {}", render_arguments(arguments))
        }
        TurnEvent::ToolResult { name, result, elapsed, .. } => format!(
            "✅ ツール結果 {name} (実行時間: {:.2}s)\n   → {result}",
            elapsed.as_secs_f64()
        ),
    }
}

pub fn format_reply(agent_name: &str, content: &str) -> String {
    format!("# {agent_name}: {content}\n")
}

fn render_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::{format_event, format_reply, is_exit_command};
    use crate::runtime::TurnEvent;

    #[test]
    fn exit_commands_ignore_case_and_whitespace() {
        for input in ["exit", "EXIT", " Quit ", "終了", "やめる"] {
            assert!(is_exit_command(input), "{input} should end the session");
        }
        assert!(!is_exit_command("exit please"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn tool_events_render_name_arguments_and_timing() {
        let call = TurnEvent::ToolCall {
            id: "call_1".to_string(),
            name: "DiningPlugin-reserve_table".to_string(),
            arguments: json!({ "party_size": 2 }),
        };
        let result = TurnEvent::ToolResult {
            id: "call_1".to_string(),
            name: "DiningPlugin-reserve_table".to_string(),
            result: "2名様のテーブルを19:00に予約いたしました。".to_string(),
            elapsed: Duration::from_millis(120),
        };

        assert_eq!(
            format_event(&call),
            "🛠️  ツール実行 → DiningPlugin-reserve_table\n   引数 → {\"party_size\":2}"
        );
        assert_eq!(
            format_event(&result),
            "✅ ツール結果 DiningPlugin-reserve_table (実行時間: 0.12s)\n   → 2名様のテーブルを19:00に予約いたしました。"
        );
    }

    #[test]
    fn reply_is_prefixed_with_agent_name() {
        assert_eq!(format_reply("ConciergeAgent", "こんにちは"), "# ConciergeAgent: こんにちは\n");
    }
}
