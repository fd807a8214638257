//! # LLM Provider Interface
//!
//! - `LlmProvider` trait defines the calls agents make
//! - `ProviderConfig` is built from resolved `ModelSettings` / `HostedSettings`
//! - Streaming via `StreamReceiver`

pub mod openai;

pub use openai::OpenAIProvider;

use futures_util::StreamExt;
use modelrunner_config::{HostedSettings, ModelSettings};
use modelrunner_error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::pin::Pin;

// ============================================================================
// Core Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Per-call overrides; unset fields fall back to the provider config
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub stop: Option<Vec<String>>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub(crate) fn parse(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    Done { finish_reason: FinishReason },
    Error(String),
}

// ============================================================================
// Provider Trait
// ============================================================================

#[allow(async_fn_in_trait)]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs (e.g. "model-runner", "gemini")
    fn name(&self) -> &str;

    /// Model sent when the request does not name one
    fn default_model(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver>;

    /// Simple prompt -> response helper
    async fn prompt(&self, prompt: &str) -> Result<String> {
        self.chat(vec![ChatMessage::user(prompt)]).await
    }

    /// Chat with message history
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let response = self.complete(CompletionRequest::new(messages)).await?;
        response.content.ok_or_else(|| {
            Error::inference_failed("no content in response")
                .with_operation("provider::chat")
                .with_context("provider", self.name().to_string())
        })
    }
}

/// Receiver for streaming responses
pub struct StreamReceiver {
    inner: Pin<Box<dyn futures_core::Stream<Item = StreamChunk> + Send>>,
}

impl StreamReceiver {
    pub fn new<S>(stream: S) -> Self
    where
        S: futures_core::Stream<Item = StreamChunk> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    pub async fn next(&mut self) -> Option<StreamChunk> {
        self.inner.next().await
    }

    /// Concatenate text chunks until `Done` or end of stream.
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                StreamChunk::Text(t) => text.push_str(&t),
                StreamChunk::Done { .. } => break,
                StreamChunk::Error(e) => {
                    return Err(Error::network_failed(e).with_operation("stream::collect_text"))
                }
            }
        }
        Ok(text)
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Docker Model Runner or any local OpenAI-compatible server
    Local,
    /// Gemini through its OpenAI-compatible endpoint
    Hosted,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model id as the server expects it (no provider prefix)
    pub default_model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Extra request body keys
    pub extra: Map<String, Value>,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn from_settings(settings: &ModelSettings) -> Self {
        Self {
            kind: ProviderKind::Local,
            api_key: Some(settings.api_key.clone()),
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            default_model: settings.upstream_model().to_string(),
            temperature: Some(settings.temperature),
            max_tokens: Some(settings.max_tokens),
            extra: settings.extra.clone(),
            timeout_secs: 300,
        }
    }

    pub fn hosted(settings: &HostedSettings) -> Self {
        Self {
            kind: ProviderKind::Hosted,
            api_key: Some(settings.api_key.clone()),
            base_url: settings.api_base.trim_end_matches('/').to_string(),
            default_model: settings.model.clone(),
            temperature: None,
            max_tokens: None,
            extra: Map::new(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
