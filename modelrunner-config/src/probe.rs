//! Endpoint reachability probes

use modelrunner_error::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

/// Per-candidate connect timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Decides whether an endpoint URL currently accepts connections.
///
/// Implementations must not fail: anything that goes wrong is "unreachable".
#[allow(async_fn_in_trait)]
pub trait Prober {
    async fn is_reachable(&self, endpoint: &str) -> bool;
}

impl<P: Prober> Prober for &P {
    async fn is_reachable(&self, endpoint: &str) -> bool {
        (**self).is_reachable(endpoint).await
    }
}

/// Host and port a TCP probe should target for `endpoint`.
///
/// Port falls back to the scheme default (443 for https, 80 otherwise).
pub fn socket_target(endpoint: &str) -> Result<(String, u16)> {
    let url = Url::parse(endpoint).map_err(|e| {
        Error::config_invalid(format!("invalid endpoint URL: {}", e))
            .with_operation("probe::socket_target")
            .with_context("endpoint", endpoint)
    })?;

    let host = url
        .host_str()
        .ok_or_else(|| {
            Error::config_invalid("endpoint URL has no host")
                .with_operation("probe::socket_target")
                .with_context("endpoint", endpoint)
        })?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    let port = url
        .port()
        .unwrap_or(if url.scheme() == "https" { 443 } else { 80 });

    Ok((host, port))
}

/// Plain TCP connect with a bounded timeout (covers DNS lookup too).
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Like [`Prober::is_reachable`] but keeps the failure reason.
    pub async fn check(&self, endpoint: &str) -> Result<()> {
        let (host, port) = socket_target(endpoint)?;

        match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(Error::unreachable(endpoint)
                .with_operation("probe::check")
                .set_source(e)),
            Err(_) => Err(Error::unreachable(endpoint)
                .with_operation("probe::check")
                .with_context("timeout_ms", self.timeout.as_millis().to_string())),
        }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl Prober for TcpProber {
    async fn is_reachable(&self, endpoint: &str) -> bool {
        match self.check(endpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("connectivity test failed for {}: {}", endpoint, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_socket_target_ports() {
        assert_eq!(
            socket_target("http://host.docker.internal:12434/engines/llama.cpp/v1").unwrap(),
            ("host.docker.internal".to_string(), 12434)
        );
        assert_eq!(
            socket_target("https://generativelanguage.googleapis.com/v1beta").unwrap(),
            ("generativelanguage.googleapis.com".to_string(), 443)
        );
        assert_eq!(socket_target("http://model-runner/v1").unwrap().1, 80);
        assert_eq!(socket_target("http://[::1]:8080/").unwrap(), ("::1".to_string(), 8080));
    }

    #[test]
    fn test_socket_target_rejects_garbage() {
        let err = socket_target("not a url").unwrap_err();
        assert_eq!(err.kind(), modelrunner_error::ErrorKind::ConfigInvalid);
        assert_eq!(err.context_value("endpoint"), Some("not a url"));
    }

    #[tokio::test]
    async fn test_listening_socket_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let prober = TcpProber::default();
        assert!(prober.is_reachable(&format!("http://127.0.0.1:{}/v1", port)).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let prober = TcpProber::new(Duration::from_millis(500));
        let endpoint = format!("http://127.0.0.1:{}/v1", port);
        assert!(!prober.is_reachable(&endpoint).await);

        let err = prober.check(&endpoint).await.unwrap_err();
        assert_eq!(err.kind(), modelrunner_error::ErrorKind::EndpointUnreachable);
    }

    #[tokio::test]
    async fn test_bad_url_is_unreachable_not_an_error() {
        assert!(!TcpProber::default().is_reachable("::::").await);
    }
}
