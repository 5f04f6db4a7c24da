//! Error types for the Reagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::any::Any;
use std::fmt;
use thiserror::Error;

use crate::message::MessageKind;

/// The top-level error type for all Reagent operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Agent errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Conversation policy errors ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Runnable execution ---
    #[error("{0} must implement call()")]
    NotImplemented(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("{unit} timed out after {timeout_ms}ms")]
    Timeout { unit: String, timeout_ms: u64 },

    /// An observer callback failed. The outcome of the unit it was observing
    /// is kept in `outcome` so the caller can still recover it.
    #[error("Observer failed during {event} of {unit}: {source}")]
    Observer {
        unit: String,
        event: ObserverEvent,
        #[source]
        source: CallbackError,
        outcome: ObservedOutcome,
    },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Configuration ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error (or the error an observer wrapped) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Observer { .. } => self.original_error().is_some_and(Error::is_cancelled),
            _ => false,
        }
    }

    /// The unit's own error, when an observer failed while reporting it.
    pub fn original_error(&self) -> Option<&Error> {
        match self {
            Error::Observer {
                outcome: ObservedOutcome::Failed(original),
                ..
            } => Some(original),
            _ => None,
        }
    }

    /// Recover the unit's output when an observer failed in `on_end`.
    ///
    /// Returns `None` for every other error, or when `O` is not the
    /// output type of the unit that produced it.
    pub fn into_output<O: 'static>(self) -> Option<O> {
        match self {
            Error::Observer {
                outcome: ObservedOutcome::Output(output),
                ..
            } => output.downcast::<O>().ok().map(|boxed| *boxed),
            _ => None,
        }
    }
}

/// Which observer hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverEvent {
    Start,
    End,
    Error,
}

impl fmt::Display for ObserverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverEvent::Start => write!(f, "on_start"),
            ObserverEvent::End => write!(f, "on_end"),
            ObserverEvent::Error => write!(f, "on_error"),
        }
    }
}

/// What the observed unit had produced when its observer failed.
#[derive(Debug)]
pub enum ObservedOutcome {
    /// The unit never ran (`on_start` failed).
    NotStarted,
    /// The unit failed with this error.
    Failed(Box<Error>),
    /// The unit succeeded; the output is type-erased.
    Output(Box<dyn Any + Send>),
}

/// Error returned by an observer callback.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    #[error("Model has been closed")]
    Closed,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model invocation failed at iteration {iteration}: {source}")]
    ModelInvocation {
        iteration: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("max iterations reached without final answer (limit: {max_iterations})")]
    MaxIterationsExceeded { max_iterations: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("conversation is empty")]
    Empty,

    #[error("first message must be system, got {0}")]
    SystemNotFirst(MessageKind),

    #[error("conversation must have at least one human message")]
    NoHumanMessage,

    #[error("consecutive {kind} messages at positions {first} and {second}")]
    ConsecutiveSameKind {
        kind: MessageKind,
        first: usize,
        second: usize,
    },

    #[error("tool message at position {position} does not follow an assistant tool call")]
    OrphanToolMessage { position: usize },
}
