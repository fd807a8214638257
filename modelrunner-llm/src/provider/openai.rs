//! OpenAI-compatible provider
//!
//! Docker Model Runner's llama.cpp engine and Gemini's compatibility layer both
//! speak this wire format, so one client covers the local and hosted paths.

use super::*;
use modelrunner_error::ErrorKind;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::unexpected("failed to create HTTP client")
                    .with_operation("openai::new")
                    .set_source(e)
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Build the wire body: config defaults, then `extra`, then per-call fields.
    fn build_body(&self, request: CompletionRequest, stream: bool) -> Value {
        let defaults = OpenAIRequest {
            model: self.config.default_model.clone(),
            messages: request.messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
            stop: None,
        };

        let mut object = match serde_json::to_value(defaults) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.config.extra {
            object.insert(key.clone(), value.clone());
        }

        if let Some(model) = request.model {
            object.insert("model".into(), Value::from(model));
        }
        if let Some(temperature) = request.temperature {
            object.insert("temperature".into(), Value::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            object.insert("max_tokens".into(), Value::from(max_tokens));
        }
        if let Some(stop) = request.stop {
            object.insert("stop".into(), Value::from(stop));
        }
        object.insert("stream".into(), Value::Bool(stream));
        Value::Object(object)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => req.bearer_auth(key),
            _ => req,
        }
    }

    async fn send(&self, body: &Value, operation: &'static str) -> Result<Response> {
        let response = self
            .authorize(self.client.post(self.endpoint()).json(body))
            .send()
            .await
            .map_err(|e| {
                Error::network_failed(e.to_string())
                    .with_operation(operation)
                    .with_context("endpoint", self.endpoint())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), text)
            .with_operation(operation)
            .with_context("endpoint", self.endpoint())
            .with_context("model", self.config.default_model.clone()))
    }
}

/// Map a non-success HTTP status onto an error kind.
fn status_error(status: u16, body: String) -> Error {
    let kind = match status {
        401 | 403 => ErrorKind::AuthenticationFailed,
        404 => ErrorKind::ConfigInvalid,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ProviderUnavailable,
        _ => ErrorKind::InferenceFailed,
    };
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };
    Error::new(kind, message).with_context("status", status.to_string())
}

impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        match self.config.kind {
            ProviderKind::Local => "model-runner",
            ProviderKind::Hosted => "gemini",
        }
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = self.build_body(request, false);
        tracing::debug!(provider = self.name(), endpoint = %self.endpoint(), "sending completion");

        let response = self.send(&body, "openai::complete").await?;
        let api_response: OpenAIResponse = response.json().await.map_err(|e| {
            Error::parse_failed(e.to_string()).with_operation("openai::complete")
        })?;

        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            Error::inference_failed("no choices in response").with_operation("openai::complete")
        })?;

        let usage = api_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response.id.unwrap_or_default(),
            model: api_response.model.unwrap_or_default(),
            content: choice.message.content,
            finish_reason: FinishReason::parse(choice.finish_reason.as_deref()),
            usage,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver> {
        let body = self.build_body(request, true);
        let response = self.send(&body, "openai::stream").await?;

        let stream = async_stream::stream! {
            let mut byte_stream = Box::pin(response.bytes_stream());
            let mut buffer: Vec<u8> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield StreamChunk::Error(e.to_string());
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);

                // decode whole events only; a chunk may end mid-character
                while let Some(pos) = find_event_end(&buffer) {
                    let raw: Vec<u8> = buffer.drain(..pos + 2).collect();
                    let event = String::from_utf8_lossy(&raw);
                    for chunk in parse_sse_event(&event) {
                        let done = matches!(chunk, StreamChunk::Done { .. });
                        yield chunk;
                        if done {
                            return;
                        }
                    }
                }
            }
        };

        Ok(StreamReceiver::new(stream))
    }
}

/// Offset of the first blank-line event separator in `buffer`
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Decode one SSE event block into chunks.
fn parse_sse_event(event: &str) -> Vec<StreamChunk> {
    let mut chunks = Vec::new();
    for line in event.lines() {
        let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
            continue;
        };

        if data == "[DONE]" {
            chunks.push(StreamChunk::Done {
                finish_reason: FinishReason::Stop,
            });
            continue;
        }

        let Ok(parsed) = serde_json::from_str::<OpenAIStreamChunk>(data) else {
            continue;
        };
        let Some(choice) = parsed.choices.into_iter().next() else {
            continue;
        };
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                chunks.push(StreamChunk::Text(content));
            }
        }
        if let Some(reason) = choice.finish_reason {
            chunks.push(StreamChunk::Done {
                finish_reason: FinishReason::parse(Some(&reason)),
            });
        }
    }
    chunks
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}
