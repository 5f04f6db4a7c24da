//! Prompt construction for the ReAct loop.
//!
//! The prompt is one growing string: a preamble listing the tools, the
//! question, then alternating model output and observations, always ending
//! with a `Thought:` cue for the model to continue from.

use std::fmt::Write as _;

use reagent_core::tool::ToolRegistry;

use crate::parser::{OBSERVATION, THOUGHT};

/// The fixed instructions plus tool listing. Tools are sorted by name so the
/// prompt is identical across runs.
pub fn preamble(tools: &ToolRegistry) -> String {
    let mut all = tools.all();
    all.sort_by(|a, b| a.name().cmp(b.name()));

    let mut listing = String::new();
    for tool in &all {
        let _ = writeln!(listing, "- {}: {}", tool.name(), tool.description());
    }
    let names: Vec<&str> = all.iter().map(|t| t.name()).collect();

    format!(
        "You are a helpful assistant that can use tools to answer questions.

Available tools:
{listing}
Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!",
        names = names.join(", ")
    )
}

/// The first prompt of a run.
pub fn initial(preamble: &str, query: &str) -> String {
    format!("{preamble}\n\nQuestion: {query}\n\n{THOUGHT}")
}

/// Fold a model response that led to a tool call, plus its observation.
pub fn push_observation(prompt: &mut String, response: &str, observation: &str) {
    let _ = write!(
        prompt,
        " {}\n{OBSERVATION} {observation}\n\n{THOUGHT}",
        continuation(response)
    );
}

/// Fold an intermediate reasoning fragment.
pub fn push_fragment(prompt: &mut String, response: &str) {
    let _ = write!(prompt, " {}\n\n{THOUGHT}", continuation(response));
}

/// The response as it continues a `Thought:` cue. A model that repeats the
/// cue would otherwise produce `Thought: Thought:`.
fn continuation(response: &str) -> &str {
    let response = response.trim();
    response
        .strip_prefix(THOUGHT)
        .map(str::trim_start)
        .unwrap_or(response)
}
