//! The ReAct reasoning loop for Reagent.
//!
//! The agent alternates **Thought → Action → Observation**:
//!
//! 1. **Prompt** the model with the tool list, the question and everything
//!    said so far, ending on a `Thought:` cue
//! 2. **Parse** the reply: an `Action:` runs a tool, a `Final Answer:` ends
//!    the run, anything else is folded back in as more reasoning
//! 3. **Observe**: the tool result (or its error) is appended as
//!    `Observation:` and the loop goes back to step 1
//!
//! The loop stops at the first final answer or after `max_iterations`
//! reasoning cycles.

pub mod parser;
pub mod prompt;
pub mod react;
pub mod scratchpad;

pub use parser::{ReactStep, parse};
pub use react::{DEFAULT_MAX_ITERATIONS, ReactAgent, ReactOutcome, SharedModel};
pub use scratchpad::{EntryKind, ScratchEntry, Scratchpad, ToolCallRecord};

#[cfg(test)]
pub(crate) mod test_helpers;
