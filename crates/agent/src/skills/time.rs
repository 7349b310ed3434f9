use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeDelta};
use serde::Deserialize;
use serde_json::{json, Value};

use concierge_core::domain::inventory::DATE_FORMAT;

use crate::tools::{lenient_integer, parse_arguments, Tool, ToolDefinition, ToolError};

pub const GET_TODAY: &str = "TimePlugin-get_today";
pub const GET_RELATIVE_DATE: &str = "TimePlugin-get_relative_date";

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub struct TodayTool {
    clock: Arc<dyn Clock>,
}

impl TodayTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for TodayTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_TODAY.to_string(),
            description: "今日の日付をYYYY-MM-DD形式で返します。".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        Ok(self.clock.today().format(DATE_FORMAT).to_string())
    }
}

#[derive(Debug, Deserialize)]
struct OffsetArguments {
    #[serde(deserialize_with = "lenient_integer")]
    days_offset: i64,
}

pub struct RelativeDateTool {
    clock: Arc<dyn Clock>,
}

impl RelativeDateTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for RelativeDateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: GET_RELATIVE_DATE.to_string(),
            description: "日数のオフセットに基づいて相対的な日付を返します。".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "days_offset": { "type": "integer", "description": "今日に追加する日数。" },
                },
                "required": ["days_offset"],
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let arguments: OffsetArguments = parse_arguments(arguments)?;
        let out_of_range =
            || ToolError::InvalidArguments(format!("days_offset {} is out of range", arguments.days_offset));

        let offset = TimeDelta::try_days(arguments.days_offset).ok_or_else(out_of_range)?;
        let date = self.clock.today().checked_add_signed(offset).ok_or_else(out_of_range)?;
        Ok(date.format(DATE_FORMAT).to_string())
    }
}
