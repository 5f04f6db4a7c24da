//! ReAct marker parser.
//!
//! Model output is plain text carrying line markers (`Thought:`, `Action:`,
//! `Action Input:`, `Final Answer:`). [`parse`] turns one response into a
//! [`ReactStep`] with fixed precedence:
//!
//! 1. An `Action:` line with a non-empty name wins, even if the response
//!    also contains `Final Answer:`. The first `Action:` line and the first
//!    `Action Input:` line are used; later duplicates are ignored.
//! 2. Otherwise `Final Answer:` ends the loop with everything after the
//!    first occurrence of the marker.
//! 3. Otherwise the response is an intermediate thought.
//!
//! An `Action:` line with nothing after the marker does not count as an
//! action. The response is then an intermediate thought, even when it also
//! carries `Final Answer:`.

use serde::{Deserialize, Serialize};

pub const THOUGHT: &str = "Thought:";
pub const ACTION: &str = "Action:";
pub const ACTION_INPUT: &str = "Action Input:";
pub const OBSERVATION: &str = "Observation:";
pub const FINAL_ANSWER: &str = "Final Answer:";

/// What the model asked for in one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ReactStep {
    /// Run a tool. `input` is the raw argument text, possibly empty.
    Action { name: String, input: String },
    FinalAnswer { answer: String },
    /// Neither marker: keep reasoning.
    Thought { text: String },
}

/// Parse one model response.
pub fn parse(response: &str) -> ReactStep {
    if response.contains(ACTION) {
        match parse_action(response) {
            Some((name, input)) if !name.is_empty() => return ReactStep::Action { name, input },
            Some(_) => {
                return ReactStep::Thought {
                    text: response.trim().to_string(),
                };
            }
            None => {}
        }
    }

    if let Some(answer) = extract_final_answer(response) {
        return ReactStep::FinalAnswer { answer };
    }

    ReactStep::Thought {
        text: response.trim().to_string(),
    }
}

/// First `Action:` line and first `Action Input:` line, trimmed.
///
/// `None` when no line starts with `Action:`. The name may be empty.
fn parse_action(response: &str) -> Option<(String, String)> {
    let mut name: Option<&str> = None;
    let mut input: Option<&str> = None;

    for line in response.lines().map(str::trim_start) {
        if name.is_none() {
            if let Some(rest) = line.strip_prefix(ACTION) {
                name = Some(rest.trim());
                continue;
            }
        }
        if input.is_none() {
            if let Some(rest) = line.strip_prefix(ACTION_INPUT) {
                input = Some(rest.trim());
            }
        }
    }

    name.map(|name| (name.to_string(), input.unwrap_or_default().to_string()))
}

fn extract_final_answer(response: &str) -> Option<String> {
    response
        .find(FINAL_ANSWER)
        .map(|idx| response[idx + FINAL_ANSWER.len()..].trim().to_string())
}
