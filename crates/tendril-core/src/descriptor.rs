//! Hook descriptors and their callback sets

use crate::callback::{same_callback, MethodHook};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;
use tendril_sdk::{Backup, InstallMode, Installed, Target, TypeKind};

/// Point-in-time view of a callback set, in dispatch order
pub type CallbackSnapshot = Arc<[Arc<dyn MethodHook>]>;

/// Copy-on-write set of callbacks, unique by identity.
///
/// Readers take a snapshot (an `Arc` clone under a short read lock) and
/// iterate it without holding any lock. Writers rebuild the slice, so a
/// snapshot taken before a write never changes.
pub struct CallbackSet {
    callbacks: RwLock<CallbackSnapshot>,
}

impl CallbackSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Arc::from(Vec::<Arc<dyn MethodHook>>::new())),
        }
    }

    /// Add a callback. Returns false if it was already present.
    pub fn add(&self, callback: Arc<dyn MethodHook>) -> bool {
        let mut guard = self.callbacks.write();
        if guard.iter().any(|c| same_callback(c, &callback)) {
            return false;
        }
        let mut next: Vec<_> = guard.iter().cloned().collect();
        next.push(callback);
        *guard = Arc::from(next);
        true
    }

    /// Remove a callback. Returns false if it was not present.
    pub fn remove(&self, callback: &Arc<dyn MethodHook>) -> bool {
        let mut guard = self.callbacks.write();
        if !guard.iter().any(|c| same_callback(c, callback)) {
            return false;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|c| !same_callback(c, callback))
            .cloned()
            .collect();
        *guard = Arc::from(next);
        true
    }

    /// Whether `callback` is in the set
    pub fn contains(&self, callback: &Arc<dyn MethodHook>) -> bool {
        self.callbacks.read().iter().any(|c| same_callback(c, callback))
    }

    /// Frozen view for one dispatch
    pub fn snapshot(&self) -> CallbackSnapshot {
        Arc::clone(&self.callbacks.read())
    }

    /// Number of callbacks
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

impl Default for CallbackSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry record for one intercepted target.
///
/// Created once per target and never replaced. The installation result is
/// written exactly once; only the callback set changes afterwards.
pub struct HookDescriptor {
    target: Target,
    is_non_static: bool,
    installed: OnceCell<Installed>,
    callbacks: CallbackSet,
}

impl HookDescriptor {
    pub(crate) fn new(target: Target) -> Self {
        let is_non_static = !target.member().is_static();
        Self {
            target,
            is_non_static,
            installed: OnceCell::new(),
            callbacks: CallbackSet::new(),
        }
    }

    /// The intercepted target
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Whether the first call argument is the receiver
    pub fn is_non_static(&self) -> bool {
        self.is_non_static
    }

    /// Declared parameter kinds
    pub fn param_types(&self) -> &[TypeKind] {
        self.target.member().params()
    }

    /// Declared parameter count
    pub fn param_count(&self) -> usize {
        self.target.member().param_count()
    }

    /// Path to the original behaviour; `None` until installation completes
    pub fn backup(&self) -> Option<&dyn Backup> {
        self.installed.get().map(|i| &*i.backup)
    }

    /// Mode the redirection was installed with
    pub fn mode(&self) -> Option<InstallMode> {
        self.installed.get().map(|i| i.mode)
    }

    /// Whether installation has completed
    pub fn is_installed(&self) -> bool {
        self.installed.get().is_some()
    }

    /// Attached callbacks
    pub fn callbacks(&self) -> &CallbackSet {
        &self.callbacks
    }

    pub(crate) fn set_installed(&self, installed: Installed) -> bool {
        self.installed.set(installed).is_ok()
    }
}

impl std::fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("target", &self.target.to_string())
            .field("id", &self.target.id())
            .field("mode", &self.mode())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
