//! Failure values for intercepted calls

use std::sync::Arc;

/// Class name of argument failures (arity or kind mismatch)
pub const ILLEGAL_ARGUMENT: &str = "IllegalArgumentException";
/// Class name raised when a primitive result is null
pub const NULL_POINTER: &str = "NullPointerException";
/// Class name raised when a result has the wrong kind
pub const CLASS_CAST: &str = "ClassCastException";
/// Class name of broken internal invariants
pub const ASSERTION: &str = "AssertionError";
/// Class name of generic runtime failures
pub const RUNTIME: &str = "RuntimeException";

/// A failure produced by a call, as the caller of the target observes it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct Throwable {
    class: Arc<str>,
    message: Arc<str>,
}

impl Throwable {
    /// Create a failure of the given class
    pub fn new(class: impl Into<Arc<str>>, message: impl Into<Arc<str>>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
        }
    }

    /// Argument failure
    pub fn illegal_argument(message: impl Into<Arc<str>>) -> Self {
        Self::new(ILLEGAL_ARGUMENT, message)
    }

    /// Null where a value was required
    pub fn null_pointer(message: impl Into<Arc<str>>) -> Self {
        Self::new(NULL_POINTER, message)
    }

    /// Value of the wrong kind
    pub fn class_cast(message: impl Into<Arc<str>>) -> Self {
        Self::new(CLASS_CAST, message)
    }

    /// Broken internal invariant
    pub fn assertion(message: impl Into<Arc<str>>) -> Self {
        Self::new(ASSERTION, message)
    }

    /// Generic runtime failure
    pub fn runtime(message: impl Into<Arc<str>>) -> Self {
        Self::new(RUNTIME, message)
    }

    /// Failure class name
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this is an argument failure
    pub fn is_illegal_argument(&self) -> bool {
        &*self.class == ILLEGAL_ARGUMENT
    }
}

/// Failure of a reflective or backup invocation.
///
/// Failures thrown by the target itself arrive wrapped in
/// [`InvokeError::Target`]; the others are raised by the invocation layer
/// before the target's body runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    /// The target ran and threw
    #[error("target threw {0}")]
    Target(Throwable),

    /// Argument count or kinds do not match the declaration
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// The target cannot be called from here
    #[error("illegal access: {0}")]
    IllegalAccess(String),
}

impl InvokeError {
    /// Strip the transport wrapping and return the failure the caller sees
    pub fn into_throwable(self) -> Throwable {
        match self {
            InvokeError::Target(t) => t,
            InvokeError::ArgumentMismatch(msg) => Throwable::illegal_argument(msg),
            InvokeError::IllegalAccess(msg) => Throwable::new("IllegalAccessException", msg),
        }
    }

    /// Whether this is an argument mismatch raised before the body ran
    pub fn is_argument_mismatch(&self) -> bool {
        matches!(self, InvokeError::ArgumentMismatch(_))
    }
}

impl From<Throwable> for InvokeError {
    fn from(t: Throwable) -> Self {
        InvokeError::Target(t)
    }
}
