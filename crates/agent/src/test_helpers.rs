//! Shared test helpers for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reagent_core::error::{ModelError, Result};
use reagent_core::model::ModelInput;
use reagent_core::{CancellationToken, RunConfig, Runnable};

/// A model unit that replays scripted responses and records every prompt.
///
/// Returns `ModelError::InvalidInput` once the script runs out.
pub struct SequentialMockModel {
    responses: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl SequentialMockModel {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self::with_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// The same response `times` times, then exhausted.
    pub fn repeating(response: &str, times: usize) -> Self {
        Self::new(std::iter::repeat_n(response, times))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Runnable<ModelInput, String> for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn call(&self, input: ModelInput, _ctx: &CancellationToken, _config: &RunConfig) -> Result<String> {
        self.prompts.lock().unwrap().push(input.render(None));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::InvalidInput("script exhausted".into()).into()))
    }
}
