//! Host runtime: method table and the redirection backend over it

use crate::slot::{Alloc, Body, HostBackup, Route, Slot, SlotOptions};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tendril_sdk::{
    InstallMode, InstallRequest, Installed, InvokeError, InvokeResult, Member, RedirectError,
    Redirector, Target, TargetId, Throwable, Value,
};

/// First handle given out; keeps handles visibly distinct from small integers
const FIRST_HANDLE: u64 = 0x7000_0000;
/// Distance between consecutive handles, like method records in a table
const HANDLE_STRIDE: u64 = 0x20;

/// In-process runtime whose methods are Rust closures.
///
/// Every call made through [`call`](HostRuntime::call) or
/// [`Redirector::invoke`] honours installed redirections, so the runtime
/// behaves like a host whose call sites all go through one table.
pub struct HostRuntime {
    slots: DashMap<TargetId, Arc<Slot>>,
    next_handle: AtomicU64,
    jit_inline_disabled: AtomicBool,
}

impl HostRuntime {
    /// Create an empty runtime
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_handle: AtomicU64::new(FIRST_HANDLE),
            jit_inline_disabled: AtomicBool::new(false),
        }
    }

    /// Define a method
    pub fn define<F>(&self, member: Member, body: F) -> Target
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.define_with(member, SlotOptions::default(), body)
    }

    /// Define a method with fault injection options
    pub fn define_with<F>(&self, member: Member, options: SlotOptions, body: F) -> Target
    where
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.insert(member, Arc::new(body), None, options)
    }

    /// Define a constructor. `alloc` creates the instance a plain call of
    /// the constructor initialises and returns.
    pub fn define_constructor<A, F>(&self, member: Member, alloc: A, body: F) -> Target
    where
        A: Fn() -> Value + Send + Sync + 'static,
        F: Fn(Option<&Value>, &[Value]) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.insert(member, Arc::new(body), Some(Arc::new(alloc)), SlotOptions::default())
    }

    fn insert(
        &self,
        member: Member,
        body: Body,
        alloc: Option<Alloc>,
        options: SlotOptions,
    ) -> Target {
        let raw = self.next_handle.fetch_add(HANDLE_STRIDE, Ordering::Relaxed);
        let target = Target::new(TargetId::from_raw(raw), member);
        tracing::trace!(method = %target, id = %target.id(), "defined host method");
        self.slots.insert(
            target.id(),
            Arc::new(Slot::new(target.clone(), body, alloc, options)),
        );
        target
    }

    fn slot(&self, id: TargetId) -> Option<Arc<Slot>> {
        self.slots.get(&id).map(|entry| entry.clone())
    }

    /// Call a method the way application code would.
    ///
    /// Failures arrive unwrapped, as the caller of the method would see them.
    pub fn call(
        &self,
        target: &Target,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        self.invoke(target, this.as_ref(), &args)
            .map_err(|e| e.into_throwable())
    }

    /// Look up a defined method by identity
    pub fn target(&self, id: TargetId) -> Option<Target> {
        self.slot(id).map(|slot| slot.target.clone())
    }

    /// Whether the method has been resolved by a first call
    pub fn is_resolved(&self, target: &Target) -> bool {
        self.slot(target.id()).map(|s| s.is_resolved()).unwrap_or(false)
    }

    /// Whether the method currently has machine code
    pub fn is_compiled(&self, target: &Target) -> bool {
        self.slot(target.id())
            .map(|s| s.compiled.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Whether the JIT was told to stay away from the method
    pub fn is_jit_disabled(&self, target: &Target) -> bool {
        self.slot(target.id())
            .map(|s| s.jit_disabled.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Mode the method was redirected with, if any
    pub fn installed_mode(&self, target: &Target) -> Option<InstallMode> {
        self.slot(target.id())?.route().map(|r| r.mode)
    }

    /// Times the method's own body has run
    pub fn original_calls(&self, target: &Target) -> usize {
        self.slot(target.id()).map(|s| s.original_calls()).unwrap_or(0)
    }

    /// Whether callee inlining has been disabled
    pub fn is_jit_inline_disabled(&self) -> bool {
        self.jit_inline_disabled.load(Ordering::Acquire)
    }

    /// Number of defined methods
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no methods are defined
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for HostRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Redirector for HostRuntime {
    fn install(&self, request: InstallRequest<'_>) -> Result<Installed, RedirectError> {
        let target = request.target;
        let slot = self
            .slot(target.id())
            .ok_or_else(|| RedirectError::UnknownTarget(target.to_string()))?;

        if !slot.options.installable {
            return Err(RedirectError::Failed(format!(
                "cannot allocate trampoline for {}",
                target
            )));
        }
        if !slot.is_resolved() {
            return Err(RedirectError::Unresolved(target.to_string()));
        }

        let mode = match request.mode {
            InstallMode::Inline if !slot.options.inline_safe => {
                tracing::debug!(method = %target, "inline patch unsafe, using replacement");
                InstallMode::Replacement
            }
            mode => mode,
        };

        let route = Route {
            entry: request.entry,
            mode,
        };
        if !slot.set_route(route) {
            return Err(RedirectError::Failed(format!("{} is already redirected", target)));
        }

        tracing::trace!(method = %target, mode = %mode, "redirection installed");
        Ok(Installed {
            backup: Arc::new(HostBackup { slot }),
            mode,
        })
    }

    fn compile(&self, target: &Target) -> bool {
        let Some(slot) = self.slot(target.id()) else {
            return false;
        };
        let member = target.member();
        if !slot.options.compilable
            || member.is_native_or_proxy()
            || slot.jit_disabled.load(Ordering::Acquire)
        {
            return false;
        }
        slot.compiled.store(true, Ordering::Release);
        true
    }

    fn decompile(&self, target: &Target, disable_jit: bool) -> bool {
        let Some(slot) = self.slot(target.id()) else {
            return false;
        };
        slot.compiled.store(false, Ordering::Release);
        if disable_jit {
            slot.jit_disabled.store(true, Ordering::Release);
        }
        true
    }

    fn disable_jit_inline(&self) -> bool {
        self.jit_inline_disabled.store(true, Ordering::Release);
        true
    }

    fn invoke(&self, target: &Target, this: Option<&Value>, args: &[Value]) -> InvokeResult {
        let slot = self
            .slot(target.id())
            .ok_or_else(|| InvokeError::IllegalAccess(format!("unknown method {}", target)))?;
        slot.invoke(this, args)
    }
}
