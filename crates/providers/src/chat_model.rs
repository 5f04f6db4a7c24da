//! Chat model: adapts a completion backend to the runnable model contract.
//!
//! [`ChatModel`] is a `Runnable<ModelInput, String>`: it renders the input
//! into one text prompt, hands it to a [`CompletionBackend`] and returns the
//! generated text. The backend sits behind an async mutex, so concurrent
//! invocations on one model are served one at a time.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reagent_core::error::{Error, ModelError, Result};
use reagent_core::model::ModelInput;
use reagent_core::runnable::{RunStream, Runnable};
use reagent_core::{CancellationToken, RunConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// The model to use
    pub model: String,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

/// A stream of generated text fragments.
pub type TokenStream = BoxStream<'static, std::result::Result<String, ModelError>>;

/// A text-generation backend: prompt in, text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &str;

    /// Generate the full completion for `prompt`.
    async fn complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, ModelError>;

    /// Generate the completion as a stream of fragments.
    async fn stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<TokenStream, ModelError>;

    /// Release backend resources.
    async fn close(&self) {}
}

type SharedBackend = Arc<Mutex<Option<Box<dyn CompletionBackend>>>>;

/// The model unit.
pub struct ChatModel {
    name: String,
    backend: SharedBackend,
    params: GenerationParams,
    system_prompt: Option<String>,
}

impl ChatModel {
    pub fn new(backend: impl CompletionBackend + 'static) -> Self {
        Self {
            name: backend.name().to_string(),
            backend: Arc::new(Mutex::new(Some(Box::new(backend)))),
            params: GenerationParams::default(),
            system_prompt: None,
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Wrap every raw prompt with this system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn render(&self, input: &ModelInput) -> String {
        input.render(self.system_prompt.as_deref())
    }

    /// Release the backend. Waits for in-flight calls and open streams.
    ///
    /// Every later call fails with [`ModelError::Closed`].
    pub async fn close(&self) {
        let mut slot = self.backend.lock().await;
        if let Some(backend) = slot.take() {
            backend.close().await;
            info!(model = %self.name, "Model closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.backend.lock().await.is_none()
    }
}

#[async_trait]
impl Runnable<ModelInput, String> for ChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: ModelInput, _ctx: &CancellationToken, _config: &RunConfig) -> Result<String> {
        let prompt = self.render(&input);
        let slot = self.backend.lock().await;
        let backend = slot.as_ref().ok_or(ModelError::Closed)?;

        debug!(model = %self.name, prompt_len = prompt.len(), "Sending completion request");
        let text = backend.complete(&prompt, &self.params).await?;
        Ok(text)
    }

    /// Streams fragments as the backend produces them.
    ///
    /// The backend stays locked until the stream ends or is dropped.
    fn stream<'a>(
        &'a self,
        input: ModelInput,
        ctx: &'a CancellationToken,
        _config: &'a RunConfig,
    ) -> RunStream<'a, String> {
        let prompt = self.render(&input);
        let backend = Arc::clone(&self.backend);
        let params = self.params.clone();
        let name = self.name.clone();

        let head = async move {
            let slot = backend.lock_owned().await;
            let opened = match slot.as_ref() {
                Some(backend) => {
                    debug!(model = %name, prompt_len = prompt.len(), "Opening completion stream");
                    backend.stream(&prompt, &params).await
                }
                None => Err(ModelError::Closed),
            };
            match opened {
                Ok(tokens) => LockedStream { tokens, _slot: slot }.boxed(),
                Err(e) => stream::once(async move { Err(Error::from(e)) }).boxed(),
            }
        };

        stream::once(head)
            .flatten()
            .take_until(ctx.cancelled())
            .boxed()
    }
}

/// Token stream that keeps the backend locked while alive.
struct LockedStream {
    tokens: TokenStream,
    _slot: OwnedMutexGuard<Option<Box<dyn CompletionBackend>>>,
}

impl Stream for LockedStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.tokens
            .poll_next_unpin(cx)
            .map(|item| item.map(|fragment| fragment.map_err(Error::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reagent_core::message::Message;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes the prompt back and records what it saw.
    #[derive(Default)]
    struct EchoBackend {
        prompts: Arc<StdMutex<Vec<String>>>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, ModelError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("echo: {prompt}"))
        }

        async fn stream(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<TokenStream, ModelError> {
            let words: Vec<_> = prompt
                .split_whitespace()
                .map(|w| Ok(w.to_string()))
                .collect();
            Ok(stream::iter(words).boxed())
        }

        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn invoke_with_prompt() {
        let model = ChatModel::new(EchoBackend::default());
        let out = model
            .invoke("hello".into(), &CancellationToken::new(), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(out, "echo: hello");
    }

    #[tokio::test]
    async fn invoke_with_messages_flattens() {
        let backend = EchoBackend::default();
        let prompts = backend.prompts.clone();
        let model = ChatModel::new(backend);
        let input = ModelInput::from(vec![Message::system("Be brief"), Message::human("Hi")]);
        model
            .invoke(input, &CancellationToken::new(), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(prompts.lock().unwrap()[0], "System: Be brief\n\nUser: Hi\n\nAssistant:");
    }

    #[tokio::test]
    async fn system_prompt_wraps_raw_prompt() {
        let backend = EchoBackend::default();
        let prompts = backend.prompts.clone();
        let model = ChatModel::new(backend).with_system_prompt("You are terse");
        model
            .invoke("2+2?".into(), &CancellationToken::new(), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(
            prompts.lock().unwrap()[0],
            "System: You are terse\n\nUser: 2+2?\n\nAssistant:"
        );
    }

    #[tokio::test]
    async fn concurrent_calls_are_serialized() {
        let backend = EchoBackend::default();
        let peak = backend.peak.clone();
        let model = ChatModel::new(backend);
        let inputs: Vec<ModelInput> = (0..4).map(|i| ModelInput::from(format!("q{i}"))).collect();
        let out = model
            .batch(inputs, &CancellationToken::new(), &RunConfig::default())
            .await
            .unwrap();
        assert_eq!(out, ["echo: q0", "echo: q1", "echo: q2", "echo: q3"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_yields_fragments() {
        let model = ChatModel::new(EchoBackend::default());
        let ctx = CancellationToken::new();
        let config = RunConfig::default();
        let fragments: Vec<String> = model
            .stream("one two three".into(), &ctx, &config)
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn closed_model_rejects_calls() {
        let backend = EchoBackend::default();
        let closed = backend.closed.clone();
        let model = ChatModel::new(backend);

        model.close().await;
        model.close().await;
        assert!(model.is_closed().await);
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        let err = model
            .invoke("hi".into(), &CancellationToken::new(), &RunConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Closed)));

        let ctx = CancellationToken::new();
        let config = RunConfig::default();
        let items: Vec<_> = model.stream("hi".into(), &ctx, &config).collect().await;
        assert!(matches!(items.as_slice(), [Err(Error::Model(ModelError::Closed))]));
    }

    #[test]
    fn generation_params_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.top_p, 0.9);
        assert!(params.max_tokens.is_none());
    }
}
