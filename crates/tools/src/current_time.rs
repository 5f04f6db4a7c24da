//! Current time tool: reports the wall-clock time in UTC.

use async_trait::async_trait;
use chrono::Utc;
use reagent_core::error::ToolError;
use reagent_core::tool::Tool;
use reagent_core::CancellationToken;

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current time in UTC, formatted as HH:MM:SS. Takes no arguments."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _ctx: &CancellationToken,
        _arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        Ok(Utc::now().format("%H:%M:%S").to_string())
    }
}
