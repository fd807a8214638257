//! Model identifiers and per-client settings
//!
//! Model names are kept in LiteLLM form (`openai/<tag>`): the prefix picks the
//! OpenAI-compatible adapter, and [`ModelSettings::upstream_model`] strips it
//! again for the wire request.

use serde::Serialize;
use serde_json::{Map, Value};

pub const PROVIDER_PREFIX: &str = "openai/";
pub const DEFAULT_MODEL: &str = "ai/llama3.2:1B-Q8_0";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: usize = 2048;
/// Sampling temperature for the local model when it stands in for search
pub const SEARCH_TEMPERATURE: f32 = 0.2;

pub const HOSTED_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LOCATION: &str = "us-central1";
pub const HOSTED_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Prepend the provider prefix unless it is already there.
pub fn normalize_model_name(name: &str) -> String {
    if name.starts_with(PROVIDER_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", PROVIDER_PREFIX, name)
    }
}

/// Settings for one OpenAI-compatible client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSettings {
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Extra request keys; rendered after the base keys, so they win on clash
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl ModelSettings {
    pub fn new(
        model: impl Into<String>,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            extra: Map::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Model id as the inference server knows it
    pub fn upstream_model(&self) -> &str {
        self.model
            .strip_prefix(PROVIDER_PREFIX)
            .unwrap_or(&self.model)
    }

    /// Flat JSON object: base keys, then `extra` merged over them.
    pub fn to_json(&self) -> Value {
        let mut object = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }
}

/// Settings for the hosted Gemini path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedSettings {
    pub api_key: String,
    pub location: String,
    pub model: String,
    pub api_base: String,
}

impl HostedSettings {
    pub fn new(api_key: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            location: location.into(),
            model: HOSTED_MODEL.to_string(),
            api_base: HOSTED_API_BASE.to_string(),
        }
    }
}

/// Model picked for search-style queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchSettings {
    /// Gemini, chosen whenever `GOOGLE_API_KEY` is set
    Hosted(HostedSettings),
    /// The resolved local model at [`SEARCH_TEMPERATURE`]
    Local(ModelSettings),
}

impl SearchSettings {
    pub fn is_hosted(&self) -> bool {
        matches!(self, Self::Hosted(_))
    }
}
