//! Process-wide interceptor
//!
//! Descriptors live for the whole process, so most hosts want exactly one
//! interceptor. [`init`] creates it on first use; later calls return the
//! same instance and ignore their arguments.

use crate::callback::MethodHook;
use crate::config::HookConfig;
use crate::error::{HookError, HookResult};
use crate::interceptor::Interceptor;
use crate::unhook::Unhook;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tendril_sdk::{Redirector, Target};

static GLOBAL: OnceCell<Interceptor> = OnceCell::new();

/// Initialise the process-wide interceptor, or return the existing one
pub fn init(redirector: Arc<dyn Redirector>, config: HookConfig) -> &'static Interceptor {
    let mut created = false;
    let interceptor = GLOBAL.get_or_init(|| {
        created = true;
        Interceptor::new(redirector, config)
    });
    if !created {
        tracing::debug!("global interceptor already initialized");
    }
    interceptor
}

/// The process-wide interceptor
pub fn global() -> HookResult<&'static Interceptor> {
    GLOBAL.get().ok_or(HookError::NotInitialized)
}

/// Whether [`init`] has run
pub fn is_initialized() -> bool {
    GLOBAL.get().is_some()
}

/// [`Interceptor::hook`] on the process-wide interceptor
pub fn hook(target: &Target, callback: Arc<dyn MethodHook>) -> HookResult<Unhook> {
    global()?.hook(target, callback)
}
