//! Environment sources
//!
//! Resolution never reads `std::env` directly. It goes through [`EnvSource`],
//! so tests can hand it an [`EnvSnapshot`] instead of the live process.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Explicit endpoint override, highest precedence
pub const DOCKER_MODEL_RUNNER: &str = "DOCKER_MODEL_RUNNER";
pub const MODEL_NAME: &str = "MODEL_NAME";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const GOOGLE_CLOUD_LOCATION: &str = "GOOGLE_CLOUD_LOCATION";
pub const KUBERNETES_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
pub const CONTAINER: &str = "CONTAINER";

/// Every variable the resolver may read
pub const CONSUMED_VARS: &[&str] = &[
    DOCKER_MODEL_RUNNER,
    MODEL_NAME,
    OPENAI_API_KEY,
    GOOGLE_API_KEY,
    GOOGLE_CLOUD_LOCATION,
    KUBERNETES_SERVICE_HOST,
    CONTAINER,
];

/// Read-only view of environment variables and file existence.
pub trait EnvSource {
    /// Raw variable lookup; `Some("")` means set but empty.
    fn var(&self, key: &str) -> Option<String>;

    fn path_exists(&self, path: &Path) -> bool;

    /// Variable lookup treating an empty value as unset
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }

    fn path_exists(&self, path: &Path) -> bool {
        (**self).path_exists(path)
    }
}

/// The live process environment and filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// A frozen set of variables and existing paths.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
    paths: HashSet<PathBuf>,
}

impl EnvSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the consumed variables and the given sentinel paths from `source`.
    pub fn capture<E: EnvSource>(source: &E, sentinels: &[&Path]) -> Self {
        let mut snapshot = Self::new();
        for key in CONSUMED_VARS {
            if let Some(value) = source.var(key) {
                snapshot.vars.insert((*key).to_string(), value);
            }
        }
        for path in sentinels {
            if source.path_exists(path) {
                snapshot.paths.insert(path.to_path_buf());
            }
        }
        snapshot
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(path.into());
        self
    }
}

impl EnvSource for EnvSnapshot {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_treats_blank_as_unset() {
        let env = EnvSnapshot::new()
            .with_var(DOCKER_MODEL_RUNNER, "")
            .with_var(MODEL_NAME, "ai/smollm2");

        assert_eq!(env.var(DOCKER_MODEL_RUNNER).as_deref(), Some(""));
        assert_eq!(env.non_empty(DOCKER_MODEL_RUNNER), None);
        assert_eq!(env.non_empty(MODEL_NAME).as_deref(), Some("ai/smollm2"));
    }

    #[test]
    fn test_capture_only_keeps_known_vars_and_existing_paths() {
        let present = PathBuf::from("/.dockerenv");
        let absent = PathBuf::from("/run/.containerenv");

        let source = EnvSnapshot::new()
            .with_var(CONTAINER, "docker")
            .with_var("HOME", "/root")
            .with_path(present.clone());

        let snapshot = EnvSnapshot::capture(&source, &[present.as_path(), absent.as_path()]);
        assert_eq!(snapshot.var(CONTAINER).as_deref(), Some("docker"));
        assert_eq!(snapshot.var("HOME"), None);
        assert!(snapshot.path_exists(&present));
        assert!(!snapshot.path_exists(&absent));
    }

    #[test]
    fn test_process_env_checks_real_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ProcessEnv.path_exists(file.path()));
        assert!(!ProcessEnv.path_exists(Path::new("/definitely/not/here/.dockerenv")));
    }
}
