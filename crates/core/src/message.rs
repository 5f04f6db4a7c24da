//! Message domain types.
//!
//! A [`Message`] is one conversation turn. Every component that produces a turn
//! (user input, model output, tool result) creates one through a kind-specific
//! factory; after that the message is never mutated. Ordering rules over a list
//! of messages live in [`crate::validation`], not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The discriminant of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Instructions for the model
    System,
    /// The end user
    Human,
    /// The model
    #[serde(alias = "ai")]
    Assistant,
    /// Tool execution result
    Tool,
}

impl MessageKind {
    /// The role name used by chat-style wire formats.
    pub fn role(&self) -> &'static str {
        match self {
            MessageKind::System => "system",
            MessageKind::Human => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::Tool => "tool",
        }
    }

    /// The label used when a message list is flattened into a text prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            MessageKind::System => "System",
            MessageKind::Human => "User",
            MessageKind::Assistant => "Assistant",
            MessageKind::Tool => "Tool",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::System => "system",
            MessageKind::Human => "human",
            MessageKind::Assistant => "assistant",
            MessageKind::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// A request from the model to run a tool.
///
/// Wire shape: `{"id", "type": "function", "function": {"name", "arguments"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Always `"function"`
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,

    pub function: FunctionCall,
}

/// The function half of a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

fn function_type() -> String {
    "function".into()
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Name of the tool this call targets.
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// The raw argument payload.
    pub fn arguments(&self) -> &str {
        &self.function.arguments
    }
}

/// A single conversation turn.
///
/// Fields are private: the kind and content are fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireMessage", try_from = "WireMessage")]
pub struct Message {
    id: String,
    kind: MessageKind,
    content: String,
    timestamp: DateTime<Utc>,
    tool_calls: Vec<ToolCall>,
    tool_call_id: Option<String>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    fn new(kind: MessageKind, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content,
            timestamp: now_millis(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content.into())
    }

    /// Create a new human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content.into())
    }

    /// Create an assistant message that requests tool executions.
    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::new(MessageKind::Assistant, content.into())
        }
    }

    /// Create a tool result message for the given tool call.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(MessageKind::Tool, content.into())
        }
    }

    /// Attach a side-channel metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    /// Tool calls requested by an assistant message. Empty for other kinds.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The tool call at `index`, if any.
    pub fn tool_call(&self, index: usize) -> Option<&ToolCall> {
        self.tool_calls.get(index)
    }

    /// For tool messages, the call this result answers.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    /// Project to the canonical role/content wire form.
    pub fn to_prompt_format(&self) -> PromptMessage {
        PromptMessage {
            role: self.kind.role(),
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            tool_call_id: self.tool_call_id.clone(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind,
            self.content
        )
    }
}

/// Timestamps are kept at millisecond precision so they survive serialization.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// The chat wire form of a message (`{"role", "content", ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Project a list of messages to their wire form.
pub fn to_prompt_format(messages: &[Message]) -> Vec<PromptMessage> {
    messages.iter().map(Message::to_prompt_format).collect()
}

/// Self-describing serialized form of a [`Message`].
#[derive(Serialize, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(rename = "type")]
    kind: MessageKind,
    content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<Message> for WireMessage {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            content: m.content,
            timestamp: m.timestamp,
            tool_calls: m.tool_calls,
            tool_call_id: m.tool_call_id,
            metadata: m.metadata,
        }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = String;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        if !w.tool_calls.is_empty() && w.kind != MessageKind::Assistant {
            return Err(format!("{} message cannot carry tool calls", w.kind));
        }
        match (w.kind, &w.tool_call_id) {
            (MessageKind::Tool, None) => {
                return Err("tool message requires tool_call_id".into());
            }
            (kind, Some(_)) if kind != MessageKind::Tool => {
                return Err(format!("{kind} message cannot carry tool_call_id"));
            }
            _ => {}
        }
        Ok(Self {
            id: w.id,
            kind: w.kind,
            content: w.content,
            timestamp: w.timestamp,
            tool_calls: w.tool_calls,
            tool_call_id: w.tool_call_id,
            metadata: w.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::system("You are helpful").with_metadata("source", serde_json::json!("test")),
            Message::human("What is 5 + 3?"),
            Message::assistant_with_tool_calls(
                "Calculating...",
                vec![ToolCall::new("call_1", "calculator", r#"{"a":5,"b":3}"#)],
            ),
            Message::tool("8", "call_1"),
            Message::assistant("The result is 8"),
        ]
    }

    #[test]
    fn create_human_message() {
        let msg = Message::human("Hello, agent!");
        assert_eq!(msg.kind(), MessageKind::Human);
        assert_eq!(msg.content(), "Hello, agent!");
        assert!(!msg.has_tool_calls());
        assert!(msg.tool_call_id().is_none());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Message::human("a").id(), Message::human("a").id());
    }

    #[test]
    fn assistant_tool_calls_by_index() {
        let msg = &sample_messages()[2];
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_call(0).unwrap().name(), "calculator");
        assert!(msg.tool_call(1).is_none());
    }

    #[test]
    fn prompt_format_roles() {
        let roles: Vec<_> = to_prompt_format(&sample_messages())
            .into_iter()
            .map(|p| p.role)
            .collect();
        assert_eq!(roles, ["system", "user", "assistant", "tool", "assistant"]);
    }

    #[test]
    fn prompt_format_carries_tool_fields() {
        let msgs = sample_messages();
        let assistant = serde_json::to_value(msgs[2].to_prompt_format()).unwrap();
        assert_eq!(assistant["tool_calls"][0]["type"], "function");
        assert_eq!(assistant["tool_calls"][0]["function"]["name"], "calculator");

        let tool = serde_json::to_value(msgs[3].to_prompt_format()).unwrap();
        assert_eq!(tool["tool_call_id"], "call_1");
        assert!(tool.get("tool_calls").is_none());
    }

    #[test]
    fn serialized_form_is_self_describing() {
        let json = serde_json::to_value(&sample_messages()[0]).unwrap();
        assert_eq!(json["type"], "system");
        assert_eq!(json["content"], "You are helpful");
        assert_eq!(json["metadata"]["source"], "test");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn serialization_roundtrip_is_stable_for_every_kind() {
        for msg in sample_messages() {
            let first = serde_json::to_string(&msg).unwrap();
            let decoded: Message = serde_json::from_str(&first).unwrap();
            let second = serde_json::to_string(&decoded).unwrap();
            assert_eq!(first, second);
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn legacy_ai_type_accepted() {
        let json = r#"{"id":"m1","type":"ai","content":"hi","timestamp":0}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind(), MessageKind::Assistant);
    }

    #[test]
    fn tool_message_without_call_id_rejected() {
        let json = r#"{"id":"m1","type":"tool","content":"8","timestamp":0}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn tool_calls_on_human_rejected() {
        let json = r#"{"id":"m1","type":"human","content":"x","timestamp":0,
            "tool_calls":[{"id":"c","type":"function","function":{"name":"n","arguments":"{}"}}]}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn display_shows_kind_and_content() {
        let rendered = Message::human("Hello").to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with("] human: Hello"));
    }
}
