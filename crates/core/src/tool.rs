//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: evaluate arithmetic,
//! read a clock, call an API. They are registered in a [`ToolRegistry`],
//! which the reasoning loop uses to dispatch actions by name.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ToolError;
use crate::message::Message;

/// A tool definition sent to a model so it knows what it can call.
///
/// Serializes to `{"type": "function", "function": {name, description, parameters}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always `"function"`
    #[serde(rename = "type")]
    pub kind: String,

    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model verbatim).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with already-decoded JSON arguments.
    async fn execute(
        &self,
        ctx: &CancellationToken,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to a model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            kind: "function".into(),
            function: FunctionDefinition {
                name: self.name().to_string(),
                description: self.description().to_string(),
                parameters: self.parameters_schema(),
            },
        }
    }
}

/// Decode tool arguments into a typed struct.
pub fn parse_arguments<T: DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> std::result::Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: e.to_string(),
    })
}

/// A registry of available tools, keyed by name.
///
/// Built with `&mut self`, then shared (usually as `Arc<ToolRegistry>`).
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced registered tool");
        } else {
            debug!(tool = %name, "Registered tool");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Every registered tool, in no particular order.
    pub fn all(&self) -> Vec<&dyn Tool> {
        self.tools.values().map(|t| t.as_ref()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get all tool definitions (for sending to a model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the named tool on a raw JSON payload.
    ///
    /// An empty payload means `{}`. The payload must be a JSON object holding
    /// every key the tool's schema lists under `required`.
    pub async fn execute(
        &self,
        ctx: &CancellationToken,
        name: &str,
        payload: &str,
    ) -> std::result::Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments = decode_payload(tool.as_ref(), payload)?;
        debug!(tool = name, "Executing tool");

        tool.execute(ctx, arguments).await.map_err(|e| match e {
            ToolError::ExecutionFailed { .. } | ToolError::InvalidArguments { .. } => e,
            other => ToolError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Execute every tool call of an assistant message.
    ///
    /// Returns one tool message per call, in call order. Failures become the
    /// message text and are flagged with `"error": true` metadata.
    pub async fn handle_tool_calls(&self, ctx: &CancellationToken, message: &Message) -> Vec<Message> {
        let mut results = Vec::with_capacity(message.tool_calls().len());
        for call in message.tool_calls() {
            let result = match self.execute(ctx, call.name(), call.arguments()).await {
                Ok(output) => Message::tool(output, call.id.clone()),
                Err(e) => Message::tool(format!("Error: {e}"), call.id.clone())
                    .with_metadata("error", serde_json::Value::Bool(true)),
            };
            results.push(result);
        }
        results
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_payload(tool: &dyn Tool, payload: &str) -> std::result::Result<serde_json::Value, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool_name: tool.name().to_string(),
        reason,
    };

    let payload = payload.trim();
    let arguments = if payload.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(payload).map_err(|e| invalid(format!("invalid JSON: {e}")))?
    };

    let object = arguments
        .as_object()
        .ok_or_else(|| invalid("arguments must be a JSON object".into()))?;

    let schema = tool.parameters_schema();
    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|keys| keys.iter().filter_map(|k| k.as_str()));
    if let Some(mut required) = required {
        if let Some(missing) = required.find(|key| !object.contains_key(*key)) {
            return Err(invalid(format!("missing required field `{missing}`")));
        }
    }

    Ok(arguments)
}

type ToolFuture = Pin<Box<dyn Future<Output = std::result::Result<String, ToolError>> + Send>>;

/// Adapts an async closure into a [`Tool`].
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
    func: Box<dyn Fn(serde_json::Value) -> ToolFuture + Send + Sync>,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        func: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func: Box::new(move |args| Box::pin(func(args))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn execute(
        &self,
        ctx: &CancellationToken,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError> {
        if ctx.is_cancelled() {
            return Err(ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: "cancelled".into(),
            });
        }
        (self.func)(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            _ctx: &CancellationToken,
            arguments: serde_json::Value,
        ) -> std::result::Result<String, ToolError> {
            let args: EchoArgs = parse_arguments(self.name(), arguments)?;
            Ok(args.text)
        }
    }

    fn failing_tool() -> FunctionTool {
        FunctionTool::new(
            "broken",
            "Always fails",
            serde_json::json!({"type": "object", "properties": {}}),
            |_args| async {
                Err(ToolError::ExecutionFailed {
                    tool_name: "broken".into(),
                    reason: "disk on fire".into(),
                })
            },
        )
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(failing_tool()));
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.all().len(), 2);
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, ["broken", "echo"]);
    }

    #[test]
    fn reregistering_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(FunctionTool::new(
            "echo",
            "Shouts back",
            serde_json::json!({}),
            |_args| async { Ok("LOUD".to_string()) },
        )));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description(), "Shouts back");
    }

    #[test]
    fn definitions_are_function_shaped() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = serde_json::to_value(registry.definitions()).unwrap();
        assert_eq!(defs[0]["type"], "function");
        assert_eq!(defs[0]["function"]["name"], "echo");
        assert_eq!(defs[0]["function"]["parameters"]["required"][0], "text");
    }

    #[tokio::test]
    async fn execute_tool() {
        let ctx = CancellationToken::new();
        let out = registry()
            .execute(&ctx, "echo", r#"{"text": "hello world"}"#)
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn execute_missing_tool() {
        let ctx = CancellationToken::new();
        let err = registry().execute(&ctx, "nonexistent", "{}").await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn malformed_payload_rejected() {
        let ctx = CancellationToken::new();
        let registry = registry();

        let err = registry.execute(&ctx, "echo", "{not json").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = registry.execute(&ctx, "echo", "[1, 2]").await.unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[tokio::test]
    async fn missing_required_field_rejected() {
        let ctx = CancellationToken::new();
        let err = registry().execute(&ctx, "echo", "").await.unwrap_err();
        assert!(err.to_string().contains("missing required field `text`"));
    }

    #[tokio::test]
    async fn wrong_field_type_rejected_by_tool() {
        let ctx = CancellationToken::new();
        let err = registry()
            .execute(&ctx, "echo", r#"{"text": 5}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool_name, .. } if tool_name == "echo"));
    }

    #[tokio::test]
    async fn empty_payload_means_empty_object() {
        let ctx = CancellationToken::new();
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(FunctionTool::new(
            "count",
            "Counts arguments",
            serde_json::json!({"type": "object"}),
            |args| async move { Ok(args.as_object().map_or(0, |o| o.len()).to_string()) },
        )));
        assert_eq!(registry.execute(&ctx, "count", "  ").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn tool_failure_propagates() {
        let ctx = CancellationToken::new();
        let err = registry().execute(&ctx, "broken", "{}").await.unwrap_err();
        assert_eq!(err.to_string(), "Tool execution failed: broken: disk on fire");
    }

    #[tokio::test]
    async fn handle_tool_calls_produces_tool_messages() {
        let ctx = CancellationToken::new();
        let assistant = Message::assistant_with_tool_calls(
            "checking",
            vec![
                ToolCall::new("call_1", "echo", r#"{"text":"hi"}"#),
                ToolCall::new("call_2", "missing", "{}"),
            ],
        );

        let results = registry().handle_tool_calls(&ctx, &assistant).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content(), "hi");
        assert_eq!(results[0].tool_call_id(), Some("call_1"));
        assert!(results[0].metadata().get("error").is_none());

        assert_eq!(results[1].content(), "Error: Tool not found: missing");
        assert_eq!(results[1].tool_call_id(), Some("call_2"));
        assert_eq!(results[1].metadata()["error"], true);
    }
}
