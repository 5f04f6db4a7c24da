//! Scratchpad: the reasoning log of one ReAct run.
//!
//! Records every raw model response and every observation in order, plus a
//! per-tool summary of what was called. The loop never reads it back for
//! control flow: the prompt string is the source of truth. The scratchpad
//! exists for inspection and can be exported to JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The log of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scratchpad {
    entries: Vec<ScratchEntry>,
    tool_calls: Vec<ToolCallRecord>,
    iterations: u32,
    max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchEntry {
    pub kind: EntryKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Raw model output.
    Response,
    /// Tool result or rendered tool error.
    Observation,
}

/// One executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub input: String,
    pub output: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl Scratchpad {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            entries: Vec::new(),
            tool_calls: Vec::new(),
            iterations: 0,
            max_iterations,
        }
    }

    pub fn record_response(&mut self, response: &str) {
        self.push(EntryKind::Response, response);
    }

    pub fn record_observation(&mut self, observation: &str) {
        self.push(EntryKind::Observation, observation);
    }

    fn push(&mut self, kind: EntryKind, content: &str) {
        self.entries.push(ScratchEntry {
            kind,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_tool_call(&mut self, tool_name: &str, input: &str, output: &str, success: bool) {
        self.tool_calls.push(ToolCallRecord {
            tool_name: tool_name.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            success,
            timestamp: Utc::now(),
        });
    }

    /// Start a reasoning cycle. Returns `false` once the budget is spent.
    pub fn tick(&mut self) -> bool {
        if self.iterations >= self.max_iterations {
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn entries(&self) -> &[ScratchEntry] {
        &self.entries
    }

    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    /// Entry contents in order, as plain strings.
    pub fn contents(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.content.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable dump for debugging.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for entry in &self.entries {
            let label = match entry.kind {
                EntryKind::Response => "Response",
                EntryKind::Observation => "Observation",
            };
            out.push_str(&format!("[{label}] {}\n", entry.content.trim()));
        }

        if !self.tool_calls.is_empty() {
            out.push_str("\n## Tool Calls\n");
            for call in &self.tool_calls {
                let status = if call.success { "ok" } else { "failed" };
                out.push_str(&format!(
                    "- {} ({status}): {} -> {}\n",
                    call.tool_name, call.input, call.output
                ));
            }
        }

        out.push_str(&format!(
            "Iterations: {}/{}\n",
            self.iterations, self.max_iterations
        ));
        out
    }

    /// One-line summary.
    pub fn summarize(&self) -> String {
        let succeeded = self.tool_calls.iter().filter(|c| c.success).count();
        format!(
            "{} tool calls ({} successful). {} iterations used",
            self.tool_calls.len(),
            succeeded,
            self.iterations
        )
    }
}
