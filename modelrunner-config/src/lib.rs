//! # modelrunner-config
//!
//! Picks the inference endpoint and model for LLM clients without the caller
//! knowing whether it runs on a bare host or inside a container.
//!
//! ## Resolution order
//! 1. `DOCKER_MODEL_RUNNER`, used verbatim
//! 2. inside a container: first reachable of [`CONTAINER_ENDPOINTS`]
//! 3. [`LOCALHOST_ENDPOINT`]
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run() {
//! let config = modelrunner_config::global().await;
//! let settings = config.model_settings().with_temperature(0.2);
//! println!("{} via {}", settings.model, settings.api_base);
//! # }
//! ```

pub mod container;
pub mod env;
pub mod model;
pub mod probe;
pub mod resolver;

pub use container::{ContainerSignal, CONTAINERENV_PATH, DOCKERENV_PATH};
pub use env::{EnvSnapshot, EnvSource, ProcessEnv};
pub use model::{
    normalize_model_name, HostedSettings, ModelSettings, SearchSettings, PROVIDER_PREFIX,
};
pub use probe::{Prober, TcpProber, DEFAULT_PROBE_TIMEOUT};
pub use resolver::{
    mask_secret, EndpointResolver, EndpointSource, RunnerConfig, CONTAINER_ENDPOINTS,
    LOCALHOST_ENDPOINT, PLACEHOLDER_API_KEY,
};

use modelrunner_error::{Error, Result};
use tokio::sync::OnceCell;

static GLOBAL: OnceCell<RunnerConfig> = OnceCell::const_new();

/// Resolve against the live environment and mirror `OPENAI_API_KEY` /
/// `OPENAI_API_BASE` into it for clients that only read the environment.
///
/// Writing the environment races with other threads reading it. Await this
/// before spawning tasks that read the environment, or use
/// [`resolve_blocking`] before the runtime starts.
pub async fn resolve_from_env(prober: TcpProber) -> RunnerConfig {
    let config = EndpointResolver::new(ProcessEnv, prober).resolve().await;
    config.export_process_env();
    config
}

/// [`resolve_from_env`] on a private single-threaded runtime.
///
/// Meant for `main` before any runtime or worker thread exists.
pub fn resolve_blocking(prober: TcpProber) -> Result<RunnerConfig> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::from(e).with_operation("config::resolve_blocking"))?;
    Ok(runtime.block_on(resolve_from_env(prober)))
}

/// The process-wide configuration, resolved with `prober` on first use.
///
/// Later calls return the first result whatever prober they pass. The same
/// environment caveat as [`resolve_from_env`] applies to the first call.
pub async fn init_global(prober: TcpProber) -> &'static RunnerConfig {
    GLOBAL.get_or_init(|| resolve_from_env(prober)).await
}

/// The process-wide configuration, resolved on first use with the default
/// probe timeout. See [`init_global`].
pub async fn global() -> &'static RunnerConfig {
    init_global(TcpProber::default()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quick_prober() -> TcpProber {
        TcpProber::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_global_is_resolved_once() {
        let first = init_global(quick_prober()).await;
        let second = global().await;
        assert!(std::ptr::eq(first, second));
        assert!(first.model_name().starts_with(PROVIDER_PREFIX));
        assert_eq!(std::env::var(env::OPENAI_API_BASE).unwrap(), first.api_base());
    }

    #[test]
    fn test_resolve_blocking_outside_runtime() {
        let config = resolve_blocking(quick_prober()).unwrap();
        assert!(config.model_name().starts_with(PROVIDER_PREFIX));
        assert_eq!(std::env::var(env::OPENAI_API_KEY).unwrap(), config.api_key());
    }
}
