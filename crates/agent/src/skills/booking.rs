use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use concierge_core::domain::inventory::{BookingRequest, InventoryKey};
use concierge_core::errors::InventoryError;
use concierge_db::{BookingDesk, InventoryRepository};

use crate::tools::{lenient_integer, parse_arguments, Tool, ToolDefinition, ToolError};

pub const CHECK_AVAILABILITY: &str = "BookingPlugin-check_availability";
pub const CONFIRM_BOOKING: &str = "BookingPlugin-confirm_booking";

pub type SharedDesk = Arc<BookingDesk<dyn InventoryRepository>>;

#[derive(Debug, Deserialize)]
struct AvailabilityArguments {
    room_type: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct BookingArguments {
    room_type: String,
    date: String,
    #[serde(deserialize_with = "lenient_integer")]
    count: i64,
}

fn room_type_parameter() -> Value {
    json!({ "type": "string", "description": "客室タイプ。" })
}

fn date_parameter() -> Value {
    json!({ "type": "string", "description": "予約日（YYYY-MM-DD形式）。" })
}

pub struct CheckAvailabilityTool {
    desk: SharedDesk,
}

impl CheckAvailabilityTool {
    pub fn new(desk: SharedDesk) -> Self {
        Self { desk }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CHECK_AVAILABILITY.to_string(),
            description: "指定された日付で客室が利用可能かどうかを確認します。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room_type": room_type_parameter(),
                    "date": date_parameter(),
                },
                "required": ["room_type", "date"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: AvailabilityArguments = parse_arguments(arguments)?;
        let key = InventoryKey::parse(&arguments.room_type, &arguments.date)?;
        let (room_type, date) = (&key.room_type, &key.date);

        match self.desk.check_availability(&key).await {
            Ok(record) if record.available > 0 => Ok(format!(
                "{date}に{available}室の{room_type}が空いています。料金: {price}",
                available = record.available,
                price = record.price,
            )),
            Ok(_) | Err(InventoryError::NotFound { .. }) => {
                Ok(format!("申し訳ございませんが、{date}に{room_type}の空室はございません。"))
            }
            Err(error) => Err(error.into()),
        }
    }
}

pub struct ConfirmBookingTool {
    desk: SharedDesk,
}

impl ConfirmBookingTool {
    pub fn new(desk: SharedDesk) -> Self {
        Self { desk }
    }
}

#[async_trait]
impl Tool for ConfirmBookingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: CONFIRM_BOOKING.to_string(),
            description: "予約を確定し、客室数を減らします。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "room_type": room_type_parameter(),
                    "date": date_parameter(),
                    "count": { "type": "integer", "description": "予約する客室数。" },
                },
                "required": ["room_type", "date", "count"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: BookingArguments = parse_arguments(arguments)?;
        let key = InventoryKey::parse(&arguments.room_type, &arguments.date)?;
        let request = BookingRequest::new(key, arguments.count)?;
        let (room_type, date) = (&request.key.room_type, &request.key.date);

        match self.desk.commit(&request).await {
            Ok(receipt) => Ok(format!(
                "✅ {date}に{count}室の{room_type}を{price}で予約確定いたしました。",
                count = receipt.count,
                price = receipt.price,
            )),
            Err(InventoryError::NotFound { .. }) => {
                Ok(format!("{date}に{room_type}の客室が見つかりませんでした。"))
            }
            Err(InventoryError::InsufficientInventory { available, .. }) => {
                Ok(format!("{date}に{room_type}は{available}室のみ空いています。"))
            }
            Err(error) => Err(error.into()),
        }
    }
}
