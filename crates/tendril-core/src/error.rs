//! Registration and control errors

use tendril_sdk::RedirectError;
use thiserror::Error;

/// Errors raised by the registration and control APIs.
///
/// Failures of intercepted calls themselves are never reported here; they
/// reach the caller as a [`tendril_sdk::Throwable`].
#[derive(Debug, Error)]
pub enum HookError {
    /// Target cannot be intercepted; nothing was changed
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The redirection backend could not intercept a new target
    #[error("Failed to hook {target}: {source}")]
    InstallationFailed {
        /// Target description
        target: String,
        /// Backend failure
        #[source]
        source: RedirectError,
    },

    /// An internal invariant about the host runtime does not hold
    #[error("Assertion failed: {0}")]
    AssertionFailure(String),

    /// The process-wide interceptor has not been initialised
    #[error("Interceptor is not initialized")]
    NotInitialized,
}

/// Registration result
pub type HookResult<T> = Result<T, HookError>;
