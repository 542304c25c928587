//! Installer
//!
//! Checks that a target can be intercepted, forces static targets through
//! resolution, picks an installation mode and asks the redirection backend
//! to route the target into the dispatcher.

use crate::config::LiveConfig;
use crate::error::{HookError, HookResult};
use crate::mode::select_mode;
use std::sync::Arc;
use tendril_sdk::{Entry, InstallRequest, Installed, InvokeError, Redirector, Target, Value};

/// Reject targets that can never be intercepted.
///
/// Runs before any registry access, so a rejected target leaves no trace.
pub fn validate(target: &Target) -> HookResult<()> {
    let member = target.member();
    if member.declaring().is_interface() {
        return Err(HookError::InvalidTarget(format!(
            "Cannot hook interface method {}",
            member
        )));
    }
    if member.is_abstract() {
        return Err(HookError::InvalidTarget(format!(
            "Cannot hook abstract method {}",
            member
        )));
    }
    if member.is_constructor() && member.is_static() {
        return Err(HookError::InvalidTarget(
            "Cannot hook <clinit>".to_string(),
        ));
    }
    Ok(())
}

/// Force a static target through resolution.
///
/// The target is called once with an argument list of the wrong length. The
/// only acceptable outcome is an argument mismatch raised before the body
/// runs; anything else means the runtime does not behave as modelled.
pub fn resolve_static(redirector: &dyn Redirector, target: &Target) -> HookResult<()> {
    let bad_args: Vec<Value> = if target.member().param_count() > 0 {
        Vec::new()
    } else {
        vec![Value::Null]
    };

    match redirector.invoke(target, None, &bad_args) {
        Err(InvokeError::ArgumentMismatch(_)) => Ok(()),
        Err(other) => Err(HookError::AssertionFailure(format!(
            "resolving {} raised {} instead of an argument mismatch",
            target, other
        ))),
        Ok(value) => Err(HookError::AssertionFailure(format!(
            "resolving {} with {} argument(s) returned {}",
            target,
            bad_args.len(),
            value
        ))),
    }
}

/// Install a redirection for a target seen for the first time.
pub fn install(
    redirector: &dyn Redirector,
    config: &LiveConfig,
    target: &Target,
    entry: Arc<dyn Entry>,
) -> HookResult<Installed> {
    let native_or_proxy = target.member().is_native_or_proxy();
    let mode = select_mode(config.hook_mode(), native_or_proxy, || {
        redirector.compile(target)
    });

    if config.debug() {
        tracing::debug!(
            method = %target,
            mode = %mode,
            debuggable = config.debuggable(),
            "installing redirection"
        );
    }

    let installed = redirector
        .install(InstallRequest {
            target,
            mode,
            native_or_proxy,
            entry,
        })
        .map_err(|source| HookError::InstallationFailed {
            target: target.to_string(),
            source,
        })?;

    if installed.mode != mode {
        tracing::warn!(
            method = %target,
            requested = %mode,
            actual = %installed.mode,
            "backend changed installation mode"
        );
    }
    Ok(installed)
}
