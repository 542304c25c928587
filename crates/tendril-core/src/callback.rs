//! Callbacks attached to intercepted targets
//!
//! A [`MethodHook`] gets a `before` and an `after` look at every call of the
//! targets it is registered on. Returning an error (or panicking) from either
//! is contained by the dispatcher: the failure is logged, whatever the
//! callback did to the frame's outcome is discarded, and the remaining
//! callbacks run as usual.

use crate::frame::CallFrame;
use crate::unhook::Unhook;
use std::sync::Arc;
use tendril_sdk::{Target, Throwable, Value};

/// Unexpected failure inside a callback
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl From<String> for CallbackError {
    fn from(s: String) -> Self {
        CallbackError(s)
    }
}

impl From<&str> for CallbackError {
    fn from(s: &str) -> Self {
        CallbackError(s.to_string())
    }
}

impl From<Throwable> for CallbackError {
    fn from(t: Throwable) -> Self {
        CallbackError(t.to_string())
    }
}

/// Result of one callback phase
pub type CallbackResult = Result<(), CallbackError>;

/// Observer/override logic run around an intercepted call.
///
/// To suppress the original call, set a result or throwable on the frame in
/// [`before`](MethodHook::before). Callbacks are compared by identity
/// (`Arc` address), so registering the same `Arc` twice on one target is a
/// no-op.
pub trait MethodHook: Send + Sync {
    /// Runs before the original call
    fn before(&self, frame: &mut CallFrame<'_>) -> CallbackResult {
        let _ = frame;
        Ok(())
    }

    /// Runs after the original call, or after an early return
    fn after(&self, frame: &mut CallFrame<'_>) -> CallbackResult {
        let _ = frame;
        Ok(())
    }

    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

type PhaseFn = Box<dyn Fn(&mut CallFrame<'_>) -> CallbackResult + Send + Sync>;

/// Closure-backed [`MethodHook`]
pub struct FnHook {
    name: String,
    before: Option<PhaseFn>,
    after: Option<PhaseFn>,
}

impl FnHook {
    /// Create a callback with no phases
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Set the before phase
    pub fn on_before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    /// Set the after phase
    pub fn on_after<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallFrame<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    /// Finish as a shareable callback
    pub fn build(self) -> Arc<dyn MethodHook> {
        Arc::new(self)
    }
}

impl MethodHook for FnHook {
    fn before(&self, frame: &mut CallFrame<'_>) -> CallbackResult {
        match &self.before {
            Some(f) => f(frame),
            None => Ok(()),
        }
    }

    fn after(&self, frame: &mut CallFrame<'_>) -> CallbackResult {
        match &self.after {
            Some(f) => f(frame),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type ReplaceFn = Box<dyn Fn(&mut CallFrame<'_>) -> Result<Value, Throwable> + Send + Sync>;

/// Callback that replaces the original body entirely.
///
/// The closure's value becomes the call's result and its `Err` becomes the
/// call's throwable; either way the original is not invoked.
pub struct MethodReplacement {
    replace: ReplaceFn,
}

impl MethodReplacement {
    /// Replace the original with `f`
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CallFrame<'_>) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        Self {
            replace: Box::new(f),
        }
    }

    /// Replacement that returns null without doing anything
    pub fn do_nothing() -> Self {
        Self::new(|_| Ok(Value::Null))
    }

    /// Replacement that always returns `value`
    pub fn returning(value: Value) -> Self {
        Self::new(move |_| Ok(value.clone()))
    }
}

impl MethodHook for MethodReplacement {
    fn before(&self, frame: &mut CallFrame<'_>) -> CallbackResult {
        match (self.replace)(frame) {
            Ok(value) => frame.set_result(value),
            Err(t) => frame.set_throwable(t),
        }
        Ok(())
    }
}

/// Observer of registrations.
///
/// Failures of a listener are logged and never abort the registration.
pub trait HookListener: Send + Sync {
    /// Called before a callback is attached
    fn before_hook(&self, target: &Target, callback: &Arc<dyn MethodHook>) -> CallbackResult;

    /// Called after a callback is attached
    fn after_hook(&self, target: &Target, unhook: &Unhook) -> CallbackResult;
}

/// Identity comparison of callbacks, ignoring vtables
pub(crate) fn same_callback(a: &Arc<dyn MethodHook>, b: &Arc<dyn MethodHook>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
