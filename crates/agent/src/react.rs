//! ReAct pattern: Thought → Action → Observation loop.
//!
//! Each cycle sends the growing prompt to the model, parses the reply and
//! either runs a tool, returns the final answer, or keeps reasoning. Tool
//! failures are fed back as observations so the model can correct itself;
//! only model failures and an exhausted budget end the run with an error.

use std::sync::Arc;

use async_trait::async_trait;
use reagent_config::AppConfig;
use reagent_core::error::{AgentError, Error, Result};
use reagent_core::model::ModelInput;
use reagent_core::tool::ToolRegistry;
use reagent_core::{CancellationToken, RunConfig, Runnable};
use tracing::{debug, info, warn};

use crate::parser::{self, ReactStep};
use crate::prompt;
use crate::scratchpad::Scratchpad;

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// The model unit the loop talks to.
pub type SharedModel = Arc<dyn Runnable<ModelInput, String>>;

/// A ReAct agent over a model unit and a tool registry.
pub struct ReactAgent {
    name: String,
    model: SharedModel,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    run_config: RunConfig,
}

/// The result of a ReAct run.
#[derive(Debug, Clone)]
pub struct ReactOutcome {
    /// The final answer text.
    pub answer: String,
    /// Every response and observation of the run.
    pub scratchpad: Scratchpad,
    /// Reasoning cycles used.
    pub iterations: u32,
    /// Tool executions attempted, failed ones included.
    pub tool_calls_made: usize,
}

enum LoopState {
    Reasoning,
    Acting {
        response: String,
        name: String,
        input: String,
    },
    Observing {
        response: String,
        observation: String,
    },
    Done(String),
    Exhausted,
}

impl ReactAgent {
    pub fn new(model: SharedModel, tools: Arc<ToolRegistry>) -> Self {
        Self {
            name: "react_agent".into(),
            model,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            run_config: RunConfig::default(),
        }
    }

    /// Build the agent from config: the configured HTTP model, the built-in
    /// tools and the `[runtime]` limits for [`run`](Self::run).
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let model = reagent_providers::from_config(&config.model)?;
        let tools = reagent_tools::default_registry();
        Ok(Self::new(Arc::new(model), Arc::new(tools))
            .with_max_iterations(config.agent.max_iterations)
            .with_run_config(config.to_run_config()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Execution config used by [`run`](Self::run).
    pub fn with_run_config(mut self, config: RunConfig) -> Self {
        self.run_config = config;
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run_config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer `query` with a fresh context and the agent's own run config.
    pub async fn run(&self, query: &str) -> Result<String> {
        self.invoke(query.to_string(), &CancellationToken::new(), &self.run_config)
            .await
    }

    /// Execute the ReAct loop.
    ///
    /// `config` is forwarded to every model invocation, so its observers,
    /// timeout and retry budget apply per model call.
    pub async fn run_with(&self, query: &str, ctx: &CancellationToken, config: &RunConfig) -> Result<ReactOutcome> {
        let mut scratchpad = Scratchpad::new(self.max_iterations);
        let mut prompt = prompt::initial(&prompt::preamble(&self.tools), query);
        let mut tool_calls_made = 0usize;
        let mut state = LoopState::Reasoning;

        info!(agent = %self.name, model = self.model.name(), max_iter = self.max_iterations, "ReAct loop starting");

        loop {
            state = match state {
                LoopState::Reasoning => {
                    if !scratchpad.tick() {
                        LoopState::Exhausted
                    } else {
                        let iteration = scratchpad.iterations();
                        debug!(iteration, prompt_len = prompt.len(), "ReAct iteration");

                        let response = self
                            .model
                            .invoke(ModelInput::Prompt(prompt.clone()), ctx, config)
                            .await
                            .map_err(|e| model_failure(iteration, e))?;
                        scratchpad.record_response(&response);

                        match parser::parse(&response) {
                            ReactStep::Action { name, input } => LoopState::Acting { response, name, input },
                            ReactStep::FinalAnswer { answer } => LoopState::Done(answer),
                            ReactStep::Thought { .. } => {
                                prompt::push_fragment(&mut prompt, &response);
                                LoopState::Reasoning
                            }
                        }
                    }
                }

                LoopState::Acting { response, name, input } => {
                    tool_calls_made += 1;
                    debug!(tool = %name, input = %input, "ReAct action");

                    let observation = match self.tools.execute(ctx, &name, &input).await {
                        Ok(output) => {
                            scratchpad.record_tool_call(&name, &input, &output, true);
                            output
                        }
                        Err(e) => {
                            warn!(tool = %name, error = %e, "Tool failed, reporting as observation");
                            let output = format!("Error: {e}");
                            scratchpad.record_tool_call(&name, &input, &output, false);
                            output
                        }
                    };
                    LoopState::Observing { response, observation }
                }

                LoopState::Observing { response, observation } => {
                    prompt::push_observation(&mut prompt, &response, &observation);
                    scratchpad.record_observation(&observation);
                    LoopState::Reasoning
                }

                LoopState::Done(answer) => {
                    info!(
                        iterations = scratchpad.iterations(),
                        tool_calls = tool_calls_made,
                        "ReAct loop completed"
                    );
                    return Ok(ReactOutcome {
                        answer,
                        iterations: scratchpad.iterations(),
                        scratchpad,
                        tool_calls_made,
                    });
                }

                LoopState::Exhausted => {
                    warn!("ReAct: max iterations reached ({})", self.max_iterations);
                    return Err(AgentError::MaxIterationsExceeded {
                        max_iterations: self.max_iterations,
                    }
                    .into());
                }
            };
        }
    }
}

/// Cancellation passes through untouched; anything else is a fatal model failure.
fn model_failure(iteration: u32, error: Error) -> Error {
    if error.is_cancelled() {
        return error;
    }
    AgentError::ModelInvocation {
        iteration,
        source: Box::new(error),
    }
    .into()
}

#[async_trait]
impl Runnable<String, String> for ReactAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, query: String, ctx: &CancellationToken, config: &RunConfig) -> Result<String> {
        self.run_with(&query, ctx, config).await.map(|outcome| outcome.answer)
    }
}
