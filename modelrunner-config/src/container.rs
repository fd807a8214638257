//! Container detection
//!
//! Any one signal is enough to treat the process as containerized.

use crate::env::{EnvSource, CONTAINER, KUBERNETES_SERVICE_HOST};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Created by the Docker runtime in every container
pub const DOCKERENV_PATH: &str = "/.dockerenv";
/// Created by Podman
pub const CONTAINERENV_PATH: &str = "/run/.containerenv";

pub fn sentinel_paths() -> [&'static Path; 2] {
    [Path::new(DOCKERENV_PATH), Path::new(CONTAINERENV_PATH)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerSignal {
    DockerEnvFile,
    ContainerEnvFile,
    Kubernetes,
    ContainerMarker,
}

impl fmt::Display for ContainerSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DockerEnvFile => DOCKERENV_PATH,
            Self::ContainerEnvFile => CONTAINERENV_PATH,
            Self::Kubernetes => KUBERNETES_SERVICE_HOST,
            Self::ContainerMarker => "CONTAINER=docker",
        };
        write!(f, "{}", s)
    }
}

/// All signals present in `env`, in check order.
pub fn detect<E: EnvSource>(env: &E) -> Vec<ContainerSignal> {
    let mut signals = Vec::new();
    if env.path_exists(Path::new(DOCKERENV_PATH)) {
        signals.push(ContainerSignal::DockerEnvFile);
    }
    if env.path_exists(Path::new(CONTAINERENV_PATH)) {
        signals.push(ContainerSignal::ContainerEnvFile);
    }
    // set at all counts, even when empty
    if env.var(KUBERNETES_SERVICE_HOST).is_some() {
        signals.push(ContainerSignal::Kubernetes);
    }
    if env.var(CONTAINER).as_deref() == Some("docker") {
        signals.push(ContainerSignal::ContainerMarker);
    }
    signals
}

pub fn in_container<E: EnvSource>(env: &E) -> bool {
    !detect(env).is_empty()
}
