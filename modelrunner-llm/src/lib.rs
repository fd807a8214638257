//! # modelrunner-llm
//!
//! Chat completions against whatever endpoint `modelrunner-config` resolved.
//!
//! - **Local**: Docker Model Runner's llama.cpp engine, OpenAI wire format
//! - **Hosted**: Gemini through its OpenAI-compatible endpoint
//!
//! Clients are built from explicit settings, never from the process environment.

pub mod provider;

pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
    OpenAIProvider, ProviderConfig, ProviderKind, Role, StreamChunk, StreamReceiver, Usage,
};
