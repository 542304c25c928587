//! Unhook handles

use crate::callback::MethodHook;
use crate::descriptor::HookDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tendril_sdk::Target;

/// Token binding one callback to one descriptor.
///
/// Revoking removes the callback from the descriptor; the redirection
/// itself stays installed so later registrations on the same target are
/// cheap. Revoking is idempotent and safe while calls are in flight: a
/// dispatch that already took its snapshot still runs the callback.
pub struct Unhook {
    descriptor: Arc<HookDescriptor>,
    callback: Arc<dyn MethodHook>,
    revoked: AtomicBool,
}

impl Unhook {
    pub(crate) fn new(descriptor: Arc<HookDescriptor>, callback: Arc<dyn MethodHook>) -> Self {
        Self {
            descriptor,
            callback,
            revoked: AtomicBool::new(false),
        }
    }

    /// Target the callback is attached to
    pub fn target(&self) -> &Target {
        self.descriptor.target()
    }

    /// The bound callback
    pub fn callback(&self) -> &Arc<dyn MethodHook> {
        &self.callback
    }

    /// Detach the callback. Later calls are no-ops.
    pub fn unhook(&self) {
        if self.revoked.swap(true, Ordering::AcqRel) {
            return;
        }
        self.descriptor.callbacks().remove(&self.callback);
    }

    /// Whether [`unhook`](Unhook::unhook) has been called on this handle
    pub fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Unhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unhook")
            .field("target", &self.target().to_string())
            .field("callback", &self.callback.name())
            .field("revoked", &self.is_revoked())
            .finish()
    }
}
