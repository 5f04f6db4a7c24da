//! # Reagent Core
//!
//! Domain types, traits, and error definitions for the Reagent agent runtime.
//! Every other crate in the workspace depends inward on this one.
//!
//! ## Building blocks
//!
//! - [`Runnable`]: the composable unit (`invoke`, `stream`, `batch`, `pipe`)
//! - [`Message`]: an immutable conversation turn
//! - [`Tool`] and [`ToolRegistry`]: named capabilities the agent can call
//! - [`ModelInput`]: what a language-model unit accepts

pub mod callback;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod runnable;
pub mod tool;
pub mod transcript;
pub mod validation;

// Re-export key types at crate root for ergonomics
pub use callback::{Callback, CallbackManager, LoggingCallback};
pub use config::RunConfig;
pub use error::{AgentError, CallbackError, Error, ModelError, Result, ToolError, ValidationError};
pub use message::{Message, MessageKind, PromptMessage, ToolCall};
pub use model::ModelInput;
pub use runnable::{Parallel, Retry, RunStream, Runnable, RunnableLambda, Sequence};
pub use tool::{FunctionTool, Tool, ToolDefinition, ToolRegistry, parse_arguments};
pub use transcript::Transcript;
pub use validation::{ValidationPolicy, validate};

pub use tokio_util::sync::CancellationToken;
