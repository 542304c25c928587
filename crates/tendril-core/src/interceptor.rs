//! The interceptor: registration, direct invocation and JIT control

use crate::bridge::{bridge_for, Bridge};
use crate::callback::{CallbackResult, HookListener, MethodHook};
use crate::config::{HookConfig, LiveConfig};
use crate::descriptor::HookDescriptor;
use crate::dispatch;
use crate::error::{HookError, HookResult};
use crate::installer;
use crate::mode::HookMode;
use crate::registry::DescriptorRegistry;
use crate::unhook::Unhook;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tendril_sdk::{Entry, Redirector, Target, TargetId, Throwable, Value};

/// State shared between the interceptor and the entries it installs
struct Shared {
    redirector: Arc<dyn Redirector>,
    registry: DescriptorRegistry,
    config: LiveConfig,
    listener: RwLock<Option<Arc<dyn HookListener>>>,
}

/// Entry installed for one target.
///
/// Holds the interceptor weakly; the backend owns the entry and the
/// interceptor owns the backend.
struct Route {
    shared: Weak<Shared>,
    id: TargetId,
    bridge: &'static Bridge,
}

impl Entry for Route {
    fn call(&self, this: Option<Value>, args: Vec<Value>) -> Result<Value, Throwable> {
        let shared = self
            .shared
            .upgrade()
            .ok_or_else(|| Throwable::assertion("interceptor dropped while routes are installed"))?;
        let descriptor = shared.registry.get(self.id).ok_or_else(|| {
            Throwable::assertion(format!("no hook descriptor for target {}", self.id))
        })?;
        let value = dispatch::handle_call(&descriptor, &shared.config, this, args)?;
        self.bridge.adapt(value)
    }
}

/// Method interceptor.
///
/// Cloning is cheap and every clone drives the same registry.
#[derive(Clone)]
pub struct Interceptor {
    shared: Arc<Shared>,
}

impl Interceptor {
    /// Create an interceptor on top of a redirection backend
    pub fn new(redirector: Arc<dyn Redirector>, config: HookConfig) -> Self {
        tracing::debug!(
            debuggable = config.debuggable,
            hook_mode = %config.hook_mode,
            disable_hooks = config.disable_hooks,
            "interceptor created"
        );
        Self {
            shared: Arc::new(Shared {
                redirector,
                registry: DescriptorRegistry::new(),
                config: LiveConfig::new(&config),
                listener: RwLock::new(None),
            }),
        }
    }

    /// Attach `callback` to `target`, intercepting the target if this is
    /// the first registration for it.
    pub fn hook(&self, target: &Target, callback: Arc<dyn MethodHook>) -> HookResult<Unhook> {
        installer::validate(target)?;

        let listener = self.shared.listener.read().clone();
        if let Some(listener) = &listener {
            notify("before_hook", target, || listener.before_hook(target, &callback));
        }

        let descriptor = self.descriptor_for(target)?;
        if !descriptor.callbacks().add(callback.clone()) && self.shared.config.debug() {
            tracing::debug!(method = %target, callback = callback.name(), "callback already attached");
        }
        let unhook = Unhook::new(descriptor, callback);

        if self.shared.config.debug() {
            tracing::debug!(method = %target, callback = unhook.callback().name(), "callback attached");
        }

        if let Some(listener) = &listener {
            notify("after_hook", target, || listener.after_hook(target, &unhook));
        }
        Ok(unhook)
    }

    /// Return the installed descriptor for `target`, installing it if needed
    fn descriptor_for(&self, target: &Target) -> HookResult<Arc<HookDescriptor>> {
        let shared = &self.shared;
        if let Some(existing) = shared.registry.get(target.id()) {
            if existing.is_installed() {
                return Ok(existing);
            }
        }

        if target.member().is_static() {
            installer::resolve_static(&*shared.redirector, target)?;
        }

        let (descriptor, created) = shared.registry.get_or_install(target, |_| {
            let entry: Arc<dyn Entry> = Arc::new(Route {
                shared: Arc::downgrade(shared),
                id: target.id(),
                bridge: bridge_for(target.member()),
            });
            installer::install(&*shared.redirector, &shared.config, target, entry)
        })?;

        if created && shared.config.debug() {
            tracing::debug!(
                method = %target,
                mode = ?descriptor.mode(),
                bridge = bridge_for(target.member()).name,
                "target intercepted"
            );
        }
        Ok(descriptor)
    }

    /// Run one intercepted call through the dispatcher.
    ///
    /// This is what installed entries do; it is public for backends that
    /// route by identity rather than through [`Entry`].
    pub fn dispatch(
        &self,
        id: TargetId,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        let descriptor = self
            .shared
            .registry
            .get(id)
            .ok_or_else(|| Throwable::assertion(format!("no hook descriptor for target {}", id)))?;
        dispatch::handle_call(&descriptor, &self.shared.config, this, args)
    }

    /// Call the original behaviour of `target`, bypassing every callback.
    ///
    /// Falls back to a plain call when the target is not intercepted. The
    /// failure is the one the target itself raised, already unwrapped.
    ///
    /// Constructors always yield `Value::Null`, hooked or not: the body runs
    /// on `this` (or on a fresh instance when `this` is `None` and the target
    /// is not intercepted) and the instance is not handed back.
    pub fn invoke_original(
        &self,
        target: &Target,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        let member = target.member();
        let installed = self
            .shared
            .registry
            .get(target.id())
            .filter(|d| d.is_installed());

        let value = match installed {
            Some(descriptor) => {
                let backup = descriptor.backup().ok_or_else(|| {
                    Throwable::assertion(format!("descriptor for {} has no backup", target))
                })?;
                backup.invoke(this.as_ref(), &args)
            }
            None => {
                if member.is_constructor() && this.is_some() {
                    return Err(Throwable::illegal_argument(
                        "Cannot invoke a not hooked constructor with a non-null receiver",
                    ));
                }
                self.shared.redirector.invoke(target, this.as_ref(), &args)
            }
        }
        .map_err(|e| e.into_throwable())?;

        if member.is_constructor() {
            Ok(Value::Null)
        } else {
            Ok(value)
        }
    }

    /// Force `target` to machine code.
    ///
    /// `Ok(false)` for native and proxy targets, which have nothing to compile.
    pub fn compile(&self, target: &Target) -> HookResult<bool> {
        check_compilable(target, "compile")?;
        if target.member().is_native_or_proxy() {
            return Ok(false);
        }
        Ok(self.shared.redirector.compile(target))
    }

    /// Drop `target`'s machine code; `Ok(false)` for proxy targets
    pub fn decompile(&self, target: &Target, disable_jit: bool) -> HookResult<bool> {
        check_compilable(target, "decompile")?;
        if target.member().declaring().is_proxy() {
            return Ok(false);
        }
        Ok(self.shared.redirector.decompile(target, disable_jit))
    }

    /// Ask the backend to stop inlining callees into their callers
    pub fn disable_jit_inline(&self) -> bool {
        self.shared.redirector.disable_jit_inline()
    }

    /// Mode preference for targets intercepted from now on
    pub fn set_hook_mode(&self, mode: HookMode) {
        self.shared.config.set_hook_mode(mode);
    }

    /// Current mode preference
    pub fn hook_mode(&self) -> HookMode {
        self.shared.config.hook_mode()
    }

    /// Bypass every callback without unhooking anything
    pub fn set_hooks_disabled(&self, disabled: bool) {
        self.shared.config.set_hooks_disabled(disabled);
    }

    /// Whether callbacks are currently bypassed
    pub fn hooks_disabled(&self) -> bool {
        self.shared.config.hooks_disabled()
    }

    /// Toggle debug logging of registrations and calls
    pub fn set_debug(&self, debug: bool) {
        self.shared.config.set_debug(debug);
    }

    /// Install the registration observer, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn HookListener>) {
        *self.shared.listener.write() = Some(listener);
    }

    /// Remove the registration observer
    pub fn clear_listener(&self) {
        *self.shared.listener.write() = None;
    }

    /// Descriptor of an intercepted target
    pub fn descriptor(&self, id: TargetId) -> Option<Arc<HookDescriptor>> {
        self.shared.registry.get(id)
    }

    /// Whether `target` is intercepted
    pub fn is_hooked(&self, target: &Target) -> bool {
        self.descriptor(target.id())
            .map(|d| d.is_installed())
            .unwrap_or(false)
    }

    /// Identities of every intercepted target
    pub fn hooked_targets(&self) -> Vec<TargetId> {
        self.shared.registry.ids()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> HookConfig {
        self.shared.config.to_config()
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("config", &self.config())
            .field("descriptors", &self.shared.registry.len())
            .finish()
    }
}

fn check_compilable(target: &Target, action: &str) -> HookResult<()> {
    let member = target.member();
    if member.declaring().is_interface() {
        return Err(HookError::InvalidTarget(format!(
            "Cannot {} interface method {}",
            action, member
        )));
    }
    if member.is_abstract() {
        return Err(HookError::InvalidTarget(format!(
            "Cannot {} abstract method {}",
            action, member
        )));
    }
    Ok(())
}

/// Run a listener notification; its failures never abort registration
fn notify<F>(event: &str, target: &Target, f: F)
where
    F: FnOnce() -> CallbackResult,
{
    let failure = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e.to_string(),
        Err(_) => "listener panicked".to_string(),
    };
    tracing::warn!(event, method = %target, "hook listener failed: {}", failure);
}
