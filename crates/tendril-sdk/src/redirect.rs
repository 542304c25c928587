//! Redirection capability consumed by the installer
//!
//! The machinery that physically routes a call into the dispatcher lives
//! outside tendril. A backend implements [`Redirector`]; when asked to
//! install, it must route every later call of the target into the supplied
//! [`Entry`] and hand back a [`Backup`] that still runs the original body.

use crate::error::{InvokeError, Throwable};
use crate::target::Target;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Result of a reflective or backup invocation
pub type InvokeResult = Result<Value, InvokeError>;

/// Runs a target's original behaviour, bypassing interception.
pub trait Backup: Send + Sync {
    /// Invoke the original body
    fn invoke(&self, this: Option<&Value>, args: &[Value]) -> InvokeResult;
}

/// Dispatcher entry a redirected call must be routed into.
///
/// `this` is `None` for static targets. The returned failure is already
/// unwrapped and should be raised to the caller as-is.
pub trait Entry: Send + Sync {
    /// Handle one redirected call
    fn call(&self, this: Option<Value>, args: Vec<Value>) -> Result<Value, Throwable>;
}

/// How a redirection is physically installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallMode {
    /// Patch the target's code entry to jump into the dispatcher, keeping the
    /// displaced instructions reachable as the original path
    Inline,
    /// Swap the target's entry point and keep a stand-in that runs the real body
    Replacement,
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallMode::Inline => f.write_str("inline"),
            InstallMode::Replacement => f.write_str("replacement"),
        }
    }
}

/// Everything a backend needs to install one redirection
pub struct InstallRequest<'a> {
    /// Target to redirect
    pub target: &'a Target,
    /// Requested mode
    pub mode: InstallMode,
    /// Target has no managed body (native or dynamic proxy)
    pub native_or_proxy: bool,
    /// Entry every redirected call must reach
    pub entry: Arc<dyn Entry>,
}

/// Outcome of a successful installation
#[derive(Clone)]
pub struct Installed {
    /// Path to the original behaviour
    pub backup: Arc<dyn Backup>,
    /// Mode actually used; a backend may downgrade inline to replacement
    pub mode: InstallMode,
}

impl fmt::Debug for Installed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installed").field("mode", &self.mode).finish()
    }
}

/// Backend failure while installing a redirection
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RedirectError {
    /// Target is not known to the backend
    #[error("unknown target {0}")]
    UnknownTarget(String),

    /// Runtime metadata for the target has not been materialised yet
    #[error("target {0} is not resolved")]
    Unresolved(String),

    /// No memory for the backup or trampoline
    #[error("out of memory allocating backup for {0}")]
    NoMemory(String),

    /// Any other backend failure
    #[error("{0}")]
    Failed(String),
}

/// The external redirection mechanism.
pub trait Redirector: Send + Sync {
    /// Route all calls of `request.target` into `request.entry`
    fn install(&self, request: InstallRequest<'_>) -> Result<Installed, RedirectError>;

    /// Force the target to machine code. `false` when it cannot be compiled.
    fn compile(&self, target: &Target) -> bool;

    /// Drop the target's machine code, optionally keeping the JIT away from it
    fn decompile(&self, target: &Target, disable_jit: bool) -> bool;

    /// Stop the JIT from inlining callees into their callers
    fn disable_jit_inline(&self) -> bool {
        false
    }

    /// Plain reflective call, routed the same way any other caller would be
    fn invoke(&self, target: &Target, this: Option<&Value>, args: &[Value]) -> InvokeResult;
}

impl<R: Redirector + ?Sized> Redirector for Arc<R> {
    fn install(&self, request: InstallRequest<'_>) -> Result<Installed, RedirectError> {
        (**self).install(request)
    }

    fn compile(&self, target: &Target) -> bool {
        (**self).compile(target)
    }

    fn decompile(&self, target: &Target, disable_jit: bool) -> bool {
        (**self).decompile(target, disable_jit)
    }

    fn disable_jit_inline(&self) -> bool {
        (**self).disable_jit_inline()
    }

    fn invoke(&self, target: &Target, this: Option<&Value>, args: &[Value]) -> InvokeResult {
        (**self).invoke(target, this, args)
    }
}
