//! OpenAI-compatible completion backend.
//!
//! Speaks the text-completion protocol (`POST {base_url}/completions`) that
//! llama.cpp's server, vLLM, Ollama and OpenAI itself expose. Supports plain
//! and streaming (SSE) responses.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reagent_core::error::ModelError;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

use crate::chat_model::{CompletionBackend, GenerationParams, TokenStream};

/// A completion backend for any OpenAI-compatible `/completions` endpoint.
pub struct OpenAiCompletionBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompletionBackend {
    /// Create a backend with the default request timeout (120s).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ModelError> {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(120))
    }

    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// A local llama.cpp server (convenience constructor).
    pub fn llama_cpp(base_url: Option<&str>) -> Result<Self, ModelError> {
        Self::new("llama.cpp", base_url.unwrap_or("http://localhost:8080/v1"), None)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(prompt: &'a str, params: &'a GenerationParams, stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &params.model,
            prompt,
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: params.max_tokens,
            stop: &params.stop,
            stream,
        }
    }

    /// Send a request and map non-success statuses to errors.
    async fn send(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/completions", self.base_url);
        debug!(backend = %self.name, model = %body.model, stream = body.stream, "Sending completion request");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        if body.stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ModelError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ModelError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion backend returned error");
            return Err(ModelError::Api {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompletionBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, ModelError> {
        let response = self.send(&Self::request_body(prompt, params, false)).await?;

        let api_response: CompletionResponse = response.json().await.map_err(|e| ModelError::Api {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| ModelError::Api {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }

    async fn stream(&self, prompt: &str, params: &GenerationParams) -> Result<TokenStream, ModelError> {
        let response = self.send(&Self::request_body(prompt, params, true)).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let backend_name = self.name.clone();

        // Read the SSE byte stream on its own task; dropping the receiver stops it.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(ModelError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                };

                for event in decoder.push(&bytes) {
                    match event {
                        SseEvent::Done => return,
                        SseEvent::Text(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        SseEvent::Unparseable(data) => {
                            trace!(backend = %backend_name, data = %data, "Ignoring unparseable SSE chunk");
                        }
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "no_stop_sequences")]
    stop: &'a [String],
    stream: bool,
}

fn no_stop_sequences(stop: &&[String]) -> bool {
    stop.is_empty()
}

/// Both the plain response and every streamed chunk share this shape.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

// --- SSE decoding ---

#[derive(Debug, PartialEq)]
enum SseEvent {
    Text(String),
    Done,
    Unparseable(String),
}

/// Splits an SSE byte stream into `data:` events. Partial lines are buffered
/// as raw bytes and only decoded once complete.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip blank separators, comments and non-data fields
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                events.push(SseEvent::Done);
                break;
            }

            match serde_json::from_str::<CompletionResponse>(data) {
                Ok(chunk) => {
                    if let Some(text) = chunk.choices.into_iter().next().map(|c| c.text) {
                        if !text.is_empty() {
                            events.push(SseEvent::Text(text));
                        }
                    }
                }
                Err(_) => events.push(SseEvent::Unparseable(data.to_string())),
            }
        }
        events
    }
}
