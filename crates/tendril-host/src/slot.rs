//! Method slots: a defined callable plus its runtime state

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tendril_sdk::{
    Backup, Entry, InstallMode, InvokeError, InvokeResult, Member, Target, Throwable, TypeKind,
    Value,
};

/// Body of a host method: `(receiver, arguments) -> result`
pub type Body = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, Throwable> + Send + Sync>;

/// Allocates a fresh, uninitialised instance for a constructor
pub type Alloc = Arc<dyn Fn() -> Value + Send + Sync>;

/// Per-method fault injection switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotOptions {
    /// The JIT can compile this method
    pub compilable: bool,
    /// Inline patching is safe for this method; otherwise installation
    /// downgrades to replacement
    pub inline_safe: bool,
    /// Installation succeeds at all
    pub installable: bool,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            compilable: true,
            inline_safe: true,
            installable: true,
        }
    }
}

/// An installed redirection
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) entry: Arc<dyn Entry>,
    pub(crate) mode: InstallMode,
}

pub(crate) struct Slot {
    pub(crate) target: Target,
    body: Body,
    alloc: Option<Alloc>,
    pub(crate) options: SlotOptions,
    resolved: AtomicBool,
    pub(crate) compiled: AtomicBool,
    pub(crate) jit_disabled: AtomicBool,
    route: RwLock<Option<Route>>,
    original_calls: AtomicUsize,
}

impl Slot {
    pub(crate) fn new(target: Target, body: Body, alloc: Option<Alloc>, options: SlotOptions) -> Self {
        // Static members are resolved lazily, on their first call
        let resolved = !target.member().is_static();
        Self {
            target,
            body,
            alloc,
            options,
            resolved: AtomicBool::new(resolved),
            compiled: AtomicBool::new(false),
            jit_disabled: AtomicBool::new(false),
            route: RwLock::new(None),
            original_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    pub(crate) fn route(&self) -> Option<Route> {
        self.route.read().clone()
    }

    /// Store a route; false if one is already present
    pub(crate) fn set_route(&self, route: Route) -> bool {
        let mut guard = self.route.write();
        if guard.is_some() {
            return false;
        }
        *guard = Some(route);
        true
    }

    pub(crate) fn original_calls(&self) -> usize {
        self.original_calls.load(Ordering::Relaxed)
    }

    /// Entry point every caller goes through
    pub(crate) fn invoke(&self, this: Option<&Value>, args: &[Value]) -> InvokeResult {
        self.resolved.store(true, Ordering::Release);
        check_args(self.target.member(), args)?;

        let member = self.target.member();
        if member.is_constructor() && this.is_none() {
            return self.construct(args);
        }
        if !member.is_static() && !member.is_constructor() && this.is_none() {
            return Err(InvokeError::Target(Throwable::null_pointer(format!(
                "{} called without a receiver",
                member
            ))));
        }

        match self.route() {
            Some(route) => route
                .entry
                .call(this.cloned(), args.to_vec())
                .map_err(InvokeError::Target),
            None => self.run_original(this, args),
        }
    }

    /// Allocate, then run the (possibly redirected) constructor on the new instance
    fn construct(&self, args: &[Value]) -> InvokeResult {
        let alloc = self.alloc.as_ref().ok_or_else(|| {
            InvokeError::IllegalAccess(format!(
                "{} has no allocator",
                self.target.member().declaring().name()
            ))
        })?;
        let instance = alloc();
        self.invoke(Some(&instance), args)?;
        Ok(instance)
    }

    /// Run the body, bypassing any route
    pub(crate) fn run_original(&self, this: Option<&Value>, args: &[Value]) -> InvokeResult {
        self.original_calls.fetch_add(1, Ordering::Relaxed);
        let value = (self.body)(this, args).map_err(InvokeError::Target)?;
        check_return(self.target.member(), value).map_err(InvokeError::Target)
    }
}

/// Hold a body's result to the declared return kind.
///
/// Void methods and constructors yield null, primitives must match exactly
/// and object returns must not be primitives. Routed calls are held to the
/// same rules on their way back to the caller.
pub(crate) fn check_return(member: &Member, value: Value) -> Result<Value, Throwable> {
    if member.is_constructor() {
        return Ok(Value::Null);
    }
    match member.return_kind() {
        TypeKind::Void => Ok(Value::Null),
        TypeKind::Object if value.kind().is_primitive() => Err(Throwable::class_cast(format!(
            "{} cannot be returned as an object",
            value.type_name()
        ))),
        TypeKind::Object => Ok(value),
        kind if value.is_null() => Err(Throwable::null_pointer(format!(
            "null returned where {} was expected",
            kind
        ))),
        kind if value.kind() != kind => Err(Throwable::class_cast(format!(
            "{} cannot be returned as {}",
            value.type_name(),
            kind
        ))),
        _ => Ok(value),
    }
}

/// Reject argument lists that do not match the declaration
pub(crate) fn check_args(member: &Member, args: &[Value]) -> Result<(), InvokeError> {
    let params = member.params();
    if params.len() != args.len() {
        return Err(InvokeError::ArgumentMismatch(format!(
            "Wrong number of arguments; expected {}, got {}",
            params.len(),
            args.len()
        )));
    }
    for (i, (kind, arg)) in params.iter().zip(args).enumerate() {
        if !arg.fits(*kind) {
            return Err(InvokeError::ArgumentMismatch(format!(
                "argument {} has type {}, got {}",
                i + 1,
                kind,
                arg.type_name()
            )));
        }
    }
    Ok(())
}

/// Backup handed to the interceptor: runs the slot's own body
pub(crate) struct HostBackup {
    pub(crate) slot: Arc<Slot>,
}

impl Backup for HostBackup {
    fn invoke(&self, this: Option<&Value>, args: &[Value]) -> InvokeResult {
        check_args(self.slot.target.member(), args)?;
        self.slot.run_original(this, args)
    }
}
