//! # modelrunner-error
//!
//! One error type shared by the resolver, the inference client and the CLI.
//!
//! - **ErrorKind**: what went wrong (e.g. ConfigMissing, NetworkFailed)
//! - **ErrorStatus**: whether retrying can help (Permanent, Temporary, Persistent)
//! - **Context**: key-value pairs naming the variable, endpoint or model involved
//! - **Source**: the wrapped underlying error, kept behind `anyhow::Error`
//!
//! ## Usage
//!
//! ```rust
//! use modelrunner_error::{Error, ErrorKind};
//!
//! fn hosted_key(key: Option<&str>) -> Result<String, Error> {
//!     key.map(str::to_string).ok_or_else(|| {
//!         Error::missing_env("GOOGLE_API_KEY").with_operation("config::hosted_settings")
//!     })
//! }
//!
//! assert_eq!(hosted_key(None).unwrap_err().kind(), ErrorKind::ConfigMissing);
//! ```
//!
//! External errors are wrapped with `set_source(err)`. Only `std::io::Error`
//! gets a `From` impl; everything else is mapped explicitly at the call site.

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the modelrunner Error
pub type Result<T> = std::result::Result<T, Error>;
