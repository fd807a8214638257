//! Error kinds for modelrunner operations

use std::fmt;

/// The kind of error that occurred.
///
/// Callers match on the kind to decide what to do, e.g. fall back to the
/// local endpoint when the hosted path reports `ConfigMissing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// Invalid configuration value
    ConfigInvalid,

    /// A required configuration value (usually an env var) is absent
    ConfigMissing,

    // =========================================================================
    // Endpoint errors
    // =========================================================================
    /// Endpoint did not accept a connection
    EndpointUnreachable,

    /// Network error
    NetworkFailed,

    // =========================================================================
    // Inference errors
    // =========================================================================
    /// Inference request failed
    InferenceFailed,

    /// Provider not available
    ProviderUnavailable,

    /// Rate limit exceeded
    RateLimited,

    /// Credential rejected by the provider
    AuthenticationFailed,

    // =========================================================================
    // IO / parse errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Failed to parse input
    ParseFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::InvalidArgument => "InvalidArgument",

            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::ConfigMissing => "ConfigMissing",

            ErrorKind::EndpointUnreachable => "EndpointUnreachable",
            ErrorKind::NetworkFailed => "NetworkFailed",

            ErrorKind::InferenceFailed => "InferenceFailed",
            ErrorKind::ProviderUnavailable => "ProviderUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",

            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::ParseFailed => "ParseFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::EndpointUnreachable
                | ErrorKind::NetworkFailed
                | ErrorKind::InferenceFailed
                | ErrorKind::ProviderUnavailable
                | ErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
