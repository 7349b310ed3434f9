use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::{lenient_integer, parse_arguments, Tool, ToolDefinition, ToolError};

pub const GET_SPECIALS: &str = "DiningPlugin-get_specials";
pub const GET_ITEM_PRICE: &str = "DiningPlugin-get_item_price";
pub const RESERVE_TABLE: &str = "DiningPlugin-reserve_table";

pub const TODAYS_SPECIALS: &str =
    "本日のスープ: クラムチャウダー\n本日のサラダ: コブサラダ\n本日のドリンク: チャイティー";
pub const FLAT_ITEM_PRICE: &str = "$9.99";

pub struct SpecialsTool;

#[async_trait]
impl Tool for SpecialsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_SPECIALS.to_string(),
            description: "本日のダイニングスペシャルを提供します。".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        Ok(TODAYS_SPECIALS.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PriceArguments {
    menu_item: String,
}

pub struct ItemPriceTool;

#[async_trait]
impl Tool for ItemPriceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_ITEM_PRICE.to_string(),
            description: "指定されたメニュー項目の価格を提供します。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "menu_item": { "type": "string", "description": "メニュー項目名。" },
                },
                "required": ["menu_item"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: PriceArguments = parse_arguments(arguments)?;
        if arguments.menu_item.trim().is_empty() {
            return Err(ToolError::InvalidArguments("menu_item must not be empty".to_string()));
        }
        Ok(FLAT_ITEM_PRICE.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ReservationArguments {
    time: String,
    #[serde(deserialize_with = "lenient_integer")]
    party_size: i64,
}

pub struct ReserveTableTool;

#[async_trait]
impl Tool for ReserveTableTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RESERVE_TABLE.to_string(),
            description: "ホテルレストランでのテーブル予約をシミュレートします。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "time": { "type": "string", "description": "予約時間（例：HH:MM）。" },
                    "party_size": { "type": "integer", "description": "予約人数。" },
                },
                "required": ["time", "party_size"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: ReservationArguments = parse_arguments(arguments)?;
        let time = arguments.time.trim();
        if time.is_empty() {
            return Err(ToolError::InvalidArguments("time must not be empty".to_string()));
        }
        if arguments.party_size < 1 {
            return Err(ToolError::InvalidArguments(format!(
                "party_size must be at least 1, got {}",
                arguments.party_size
            )));
        }
        Ok(format!("{}名様のテーブルを{time}に予約いたしました。", arguments.party_size))
    }
}
