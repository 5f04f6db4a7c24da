//! Per-call execution configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::callback::Callback;

/// Execution options threaded through every runnable call.
///
/// Built once with the `with_*` methods, then shared by reference.
#[derive(Clone, Default)]
pub struct RunConfig {
    /// Observers, notified in order.
    pub callbacks: Vec<Arc<dyn Callback>>,

    /// Free-form labels for tracing.
    pub tags: Vec<String>,

    /// Arbitrary key/value metadata.
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Extra attempts after the first failure, honoured by [`Retry`](crate::runnable::Retry).
    pub max_retries: u32,

    /// Upper bound on a single `invoke`.
    pub timeout: Option<Duration>,

    /// Cap on in-flight invocations for `batch` and `Parallel`. `None` means one per input.
    pub max_concurrency: Option<usize>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("callbacks", &self.callbacks.len())
            .field("tags", &self.tags)
            .field("metadata", &self.metadata)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}
