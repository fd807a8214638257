//! Endpoint resolution
//!
//! Precedence: explicit `DOCKER_MODEL_RUNNER` override, then the first
//! reachable in-container candidate, then localhost.

use crate::container;
use crate::env::{self, EnvSource};
use crate::model::{self, HostedSettings, ModelSettings, SearchSettings};
use crate::probe::Prober;
use modelrunner_error::{Error, Result};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Docker Model Runner as seen from the host
pub const LOCALHOST_ENDPOINT: &str = "http://localhost:12434/engines/llama.cpp/v1";

/// Placeholder key; the local runner ignores it but clients insist on one
pub const PLACEHOLDER_API_KEY: &str = "anything";

/// Probed in order when running inside a container
pub const CONTAINER_ENDPOINTS: &[&str] = &[
    // Docker Desktop
    "http://host.docker.internal:12434/engines/llama.cpp/v1",
    "http://model-runner.docker.internal:12434/engines/llama.cpp/v1",
    // default bridge gateway
    "http://172.17.0.1:12434/engines/llama.cpp/v1",
    // compose service name
    "http://model-runner:12434/engines/llama.cpp/v1",
];

/// Which rule produced `api_base`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSource {
    Override,
    Container,
    Localhost,
}

impl fmt::Display for EndpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Override => "override",
            Self::Container => "container",
            Self::Localhost => "localhost",
        };
        write!(f, "{}", s)
    }
}

/// The resolved runner configuration. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    api_base: String,
    model_name: String,
    api_key: String,
    google_api_key: Option<String>,
    google_cloud_location: String,
    in_container: bool,
    source: EndpointSource,
}

impl RunnerConfig {
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn google_api_key(&self) -> Option<&str> {
        self.google_api_key.as_deref()
    }

    pub fn google_cloud_location(&self) -> &str {
        &self.google_cloud_location
    }

    pub fn in_container(&self) -> bool {
        self.in_container
    }

    pub fn source(&self) -> EndpointSource {
        self.source
    }

    /// JSON view for display, secrets masked
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "api_base": self.api_base,
            "model_name": self.model_name,
            "api_key": mask_secret(&self.api_key),
            "google_api_key": self.google_api_key.as_deref().map(mask_secret),
            "google_cloud_location": self.google_cloud_location,
            "in_container": self.in_container,
            "source": self.source,
        })
    }

    /// Client settings for the local runner with default sampling
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings::new(&self.model_name, &self.api_base, &self.api_key)
    }

    /// Client settings for the hosted Gemini path.
    ///
    /// Fails with `ConfigMissing` when `GOOGLE_API_KEY` was not set.
    pub fn hosted_settings(&self) -> Result<HostedSettings> {
        let api_key = self.google_api_key.as_deref().ok_or_else(|| {
            Error::missing_env(env::GOOGLE_API_KEY).with_operation("config::hosted_settings")
        })?;
        Ok(HostedSettings::new(api_key, &self.google_cloud_location))
    }

    /// Hosted Gemini when `GOOGLE_API_KEY` is set, otherwise the local model
    /// at [`model::SEARCH_TEMPERATURE`].
    pub fn search_settings(&self) -> SearchSettings {
        match self.google_api_key.as_deref() {
            Some(api_key) => SearchSettings::Hosted(HostedSettings::new(
                api_key,
                &self.google_cloud_location,
            )),
            None => SearchSettings::Local(
                self.model_settings()
                    .with_temperature(model::SEARCH_TEMPERATURE),
            ),
        }
    }

    /// Variables downstream OpenAI-style clients read from their environment
    pub fn exported_env(&self) -> [(&'static str, String); 2] {
        [
            (env::OPENAI_API_KEY, self.api_key.clone()),
            (env::OPENAI_API_BASE, self.api_base.clone()),
        ]
    }

    /// Pass the exported variables to a child process.
    pub fn apply_to_command<'a>(
        &self,
        command: &'a mut std::process::Command,
    ) -> &'a mut std::process::Command {
        command.envs(self.exported_env())
    }

    /// Write the exported variables into this process's environment.
    ///
    /// Call before spawning threads; prefer [`Self::apply_to_command`].
    pub fn export_process_env(&self) {
        for (key, value) in self.exported_env() {
            std::env::set_var(key, value);
        }
    }
}

impl fmt::Debug for RunnerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerConfig")
            .field("api_base", &self.api_base)
            .field("model_name", &self.model_name)
            .field("api_key", &mask_secret(&self.api_key))
            .field("google_api_key", &self.google_api_key.as_deref().map(mask_secret))
            .field("google_cloud_location", &self.google_cloud_location)
            .field("in_container", &self.in_container)
            .field("source", &self.source)
            .finish()
    }
}

/// Keep the first four characters of a secret, hide the rest.
pub fn mask_secret(secret: &str) -> String {
    if secret == PLACEHOLDER_API_KEY {
        return secret.to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    if visible.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Resolves a [`RunnerConfig`] from an environment source and a prober.
pub struct EndpointResolver<E, P> {
    env: E,
    prober: P,
    candidates: Vec<String>,
    fallback: String,
}

impl<E: EnvSource, P: Prober> EndpointResolver<E, P> {
    pub fn new(env: E, prober: P) -> Self {
        Self {
            env,
            prober,
            candidates: CONTAINER_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
            fallback: LOCALHOST_ENDPOINT.to_string(),
        }
    }

    /// Replace the in-container candidate list (probed in the given order)
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Resolve endpoint, model and credentials.
    ///
    /// Never fails: unreachable candidates degrade to the localhost fallback.
    /// Does not touch the process environment.
    pub async fn resolve(&self) -> RunnerConfig {
        let in_container = container::in_container(&self.env);
        let (api_base, source) = self.detect_endpoint(in_container).await;

        let model_name = model::normalize_model_name(
            &self
                .env
                .non_empty(env::MODEL_NAME)
                .unwrap_or_else(|| model::DEFAULT_MODEL.to_string()),
        );

        let config = RunnerConfig {
            api_base,
            model_name,
            api_key: self
                .env
                .non_empty(env::OPENAI_API_KEY)
                .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_string()),
            google_api_key: self.env.non_empty(env::GOOGLE_API_KEY),
            google_cloud_location: self
                .env
                .non_empty(env::GOOGLE_CLOUD_LOCATION)
                .unwrap_or_else(|| model::DEFAULT_LOCATION.to_string()),
            in_container,
            source,
        };

        info!(
            api_base = %config.api_base,
            model = %config.model_name,
            in_container,
            source = %source,
            "model runner configuration resolved"
        );

        config
    }

    async fn detect_endpoint(&self, in_container: bool) -> (String, EndpointSource) {
        if let Some(endpoint) = self.env.non_empty(env::DOCKER_MODEL_RUNNER) {
            info!("using {}: {}", env::DOCKER_MODEL_RUNNER, endpoint);
            return (endpoint, EndpointSource::Override);
        }

        if in_container {
            for endpoint in &self.candidates {
                if self.prober.is_reachable(endpoint).await {
                    info!("auto-detected container endpoint: {}", endpoint);
                    return (endpoint.clone(), EndpointSource::Container);
                }
            }
            // Likely unusable from inside the container; kept for parity with host runs.
            warn!("no container endpoints reachable, falling back to {}", self.fallback);
        }

        info!("using localhost endpoint: {}", self.fallback);
        (self.fallback.clone(), EndpointSource::Localhost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{CONTAINERENV_PATH, DOCKERENV_PATH};
    use crate::env::EnvSnapshot;
    use modelrunner_error::ErrorKind;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Reachability from a fixed set; records every probe
    #[derive(Default)]
    struct FakeProber {
        reachable: HashSet<String>,
        probed: Mutex<Vec<String>>,
    }

    impl FakeProber {
        fn reaching(endpoints: &[&str]) -> Self {
            Self {
                reachable: endpoints.iter().map(|s| s.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }
    }

    impl Prober for FakeProber {
        async fn is_reachable(&self, endpoint: &str) -> bool {
            self.probed.lock().unwrap().push(endpoint.to_string());
            self.reachable.contains(endpoint)
        }
    }

    fn docker() -> EnvSnapshot {
        EnvSnapshot::new().with_path(DOCKERENV_PATH)
    }

    #[tokio::test]
    async fn test_bare_host_uses_localhost_without_probing() {
        let prober = FakeProber::reaching(CONTAINER_ENDPOINTS);
        let config = EndpointResolver::new(EnvSnapshot::new(), &prober).resolve().await;

        assert_eq!(config.api_base(), "http://localhost:12434/engines/llama.cpp/v1");
        assert_eq!(config.source(), EndpointSource::Localhost);
        assert!(!config.in_container());
        assert!(prober.probed().is_empty());
    }

    #[tokio::test]
    async fn test_override_always_wins() {
        let envs = [
            EnvSnapshot::new(),
            docker(),
            EnvSnapshot::new().with_var(env::KUBERNETES_SERVICE_HOST, "10.0.0.1"),
        ];

        for base in envs {
            let env = base.with_var(env::DOCKER_MODEL_RUNNER, "http://example:9999/v1");
            let prober = FakeProber::reaching(CONTAINER_ENDPOINTS);
            let config = EndpointResolver::new(env, &prober).resolve().await;

            assert_eq!(config.api_base(), "http://example:9999/v1");
            assert_eq!(config.source(), EndpointSource::Override);
            assert!(prober.probed().is_empty());
        }
    }

    #[tokio::test]
    async fn test_override_is_not_validated() {
        let env = EnvSnapshot::new().with_var(env::DOCKER_MODEL_RUNNER, "not-a-url");
        let config = EndpointResolver::new(env, FakeProber::default()).resolve().await;
        assert_eq!(config.api_base(), "not-a-url");
    }

    #[tokio::test]
    async fn test_empty_override_is_ignored() {
        let env = EnvSnapshot::new().with_var(env::DOCKER_MODEL_RUNNER, "");
        let config = EndpointResolver::new(env, FakeProber::default()).resolve().await;
        assert_eq!(config.api_base(), LOCALHOST_ENDPOINT);
    }

    #[tokio::test]
    async fn test_container_picks_single_reachable_candidate() {
        let target = CONTAINER_ENDPOINTS[2];
        let prober = FakeProber::reaching(&[target]);
        let config = EndpointResolver::new(docker(), &prober).resolve().await;

        assert_eq!(config.api_base(), target);
        assert_eq!(config.source(), EndpointSource::Container);
        assert!(config.in_container());
        // stops at the first hit
        assert_eq!(prober.probed(), CONTAINER_ENDPOINTS[..3].to_vec());
    }

    #[tokio::test]
    async fn test_container_prefers_earlier_candidate() {
        let prober = FakeProber::reaching(&[CONTAINER_ENDPOINTS[1], CONTAINER_ENDPOINTS[3]]);
        let env = EnvSnapshot::new().with_var(env::CONTAINER, "docker");
        let config = EndpointResolver::new(env, &prober).resolve().await;
        assert_eq!(config.api_base(), CONTAINER_ENDPOINTS[1]);
    }

    #[tokio::test]
    async fn test_container_without_reachable_candidate_falls_back() {
        let prober = FakeProber::default();
        let env = EnvSnapshot::new().with_path(CONTAINERENV_PATH);
        let config = EndpointResolver::new(env, &prober).resolve().await;

        assert_eq!(config.api_base(), LOCALHOST_ENDPOINT);
        assert_eq!(config.source(), EndpointSource::Localhost);
        assert!(config.in_container());
        assert_eq!(prober.probed().len(), CONTAINER_ENDPOINTS.len());
    }

    #[tokio::test]
    async fn test_custom_candidates_and_fallback() {
        let prober = FakeProber::reaching(&["http://runner.internal:8080/v1"]);
        let resolver = EndpointResolver::new(docker(), &prober)
            .with_candidates(["http://a:1/v1", "http://runner.internal:8080/v1"])
            .with_fallback("http://127.0.0.1:8080/v1");

        assert_eq!(resolver.candidates().len(), 2);
        assert_eq!(resolver.resolve().await.api_base(), "http://runner.internal:8080/v1");

        let resolver = EndpointResolver::new(docker(), FakeProber::default())
            .with_candidates(Vec::<String>::new())
            .with_fallback("http://127.0.0.1:8080/v1");
        assert_eq!(resolver.resolve().await.api_base(), "http://127.0.0.1:8080/v1");
    }

    #[tokio::test]
    async fn test_model_and_credentials_defaults() {
        let config = EndpointResolver::new(EnvSnapshot::new(), FakeProber::default())
            .resolve()
            .await;

        assert_eq!(config.model_name(), "openai/ai/llama3.2:1B-Q8_0");
        assert_eq!(config.api_key(), "anything");
        assert_eq!(config.google_api_key(), None);
        assert_eq!(config.google_cloud_location(), "us-central1");
    }

    #[tokio::test]
    async fn test_model_and_credentials_from_env() {
        let env = EnvSnapshot::new()
            .with_var(env::MODEL_NAME, "openai/ai/qwen3")
            .with_var(env::OPENAI_API_KEY, "sk-local")
            .with_var(env::GOOGLE_API_KEY, "g-key")
            .with_var(env::GOOGLE_CLOUD_LOCATION, "europe-west4");
        let config = EndpointResolver::new(env, FakeProber::default()).resolve().await;

        assert_eq!(config.model_name(), "openai/ai/qwen3");
        assert_eq!(config.api_key(), "sk-local");

        let hosted = config.hosted_settings().unwrap();
        assert_eq!(hosted.api_key, "g-key");
        assert_eq!(hosted.location, "europe-west4");
        assert_eq!(hosted.model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_hosted_path_requires_google_key() {
        let config = EndpointResolver::new(EnvSnapshot::new(), FakeProber::default())
            .resolve()
            .await;

        let err = config.hosted_settings().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigMissing);
        assert_eq!(err.context_value("var"), Some("GOOGLE_API_KEY"));
    }

    #[tokio::test]
    async fn test_search_settings_follow_google_key() {
        let local = EndpointResolver::new(EnvSnapshot::new(), FakeProber::default())
            .resolve()
            .await;
        match local.search_settings() {
            SearchSettings::Local(settings) => {
                assert_eq!(settings.temperature, 0.2);
                assert_eq!(settings.model, local.model_name());
                assert_eq!(settings.api_base, LOCALHOST_ENDPOINT);
            }
            other => panic!("expected local settings, got {:?}", other),
        }

        let env = EnvSnapshot::new()
            .with_var(env::GOOGLE_API_KEY, "g-key")
            .with_var(env::GOOGLE_CLOUD_LOCATION, "europe-west4");
        let hosted = EndpointResolver::new(env, FakeProber::default()).resolve().await;
        let settings = hosted.search_settings();
        assert!(settings.is_hosted());
        assert_eq!(
            settings,
            SearchSettings::Hosted(HostedSettings::new("g-key", "europe-west4"))
        );
    }

    #[tokio::test]
    async fn test_resolve_is_repeatable() {
        let prober = FakeProber::reaching(&[CONTAINER_ENDPOINTS[0]]);
        let resolver = EndpointResolver::new(docker(), &prober);
        assert_eq!(resolver.resolve().await, resolver.resolve().await);
    }

    #[tokio::test]
    async fn test_model_settings_and_exports() {
        let env = EnvSnapshot::new().with_var(env::OPENAI_API_KEY, "sk-local");
        let config = EndpointResolver::new(env, FakeProber::default()).resolve().await;

        let settings = config.model_settings().with_temperature(0.7);
        assert_eq!(settings.model, config.model_name());
        assert_eq!(settings.api_base, LOCALHOST_ENDPOINT);
        assert_eq!(settings.temperature, 0.7);

        let exported = config.exported_env();
        assert_eq!(exported[0], ("OPENAI_API_KEY", "sk-local".to_string()));
        assert_eq!(exported[1], ("OPENAI_API_BASE", LOCALHOST_ENDPOINT.to_string()));

        let mut command = std::process::Command::new("env");
        config.apply_to_command(&mut command);
        let envs: Vec<_> = command.get_envs().collect();
        assert_eq!(envs.len(), 2);
    }

    #[test]
    fn test_debug_masks_secrets() {
        let env = EnvSnapshot::new()
            .with_var(env::OPENAI_API_KEY, "sk-verysecret")
            .with_var(env::GOOGLE_API_KEY, "AIzaSecret");
        let config = tokio_test::block_on(
            EndpointResolver::new(env, FakeProber::default()).resolve(),
        );

        let debug = format!("{:?}", config);
        assert!(debug.contains("sk-v****"));
        assert!(!debug.contains("verysecret"));
        assert!(!debug.contains("AIzaSecret"));

        let summary = config.summary();
        assert_eq!(summary["api_key"], "sk-v****");
        assert_eq!(summary["google_api_key"], "AIza****");
        assert_eq!(summary["source"], "localhost");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("anything"), "anything");
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("abcdefgh"), "abcd****");
    }
}
