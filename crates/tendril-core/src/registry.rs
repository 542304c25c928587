//! Descriptor registry
//!
//! Maps target identities to their descriptors. Reads are lock-free; the
//! transition "no descriptor → installed descriptor" is serialised by one
//! installation lock so a target is never installed twice.

use crate::descriptor::HookDescriptor;
use crate::error::HookResult;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tendril_sdk::{Installed, Target, TargetId};

/// Registry of hook descriptors
pub struct DescriptorRegistry {
    /// Map of target identity to descriptor
    descriptors: DashMap<TargetId, Arc<HookDescriptor>>,
    /// Serialises descriptor creation and installation
    install_lock: Mutex<()>,
}

impl DescriptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            descriptors: DashMap::new(),
            install_lock: Mutex::new(()),
        }
    }

    /// Get a descriptor by target identity
    pub fn get(&self, id: TargetId) -> Option<Arc<HookDescriptor>> {
        self.descriptors.get(&id).map(|entry| entry.clone())
    }

    /// Return the descriptor for `target`, installing it first if needed.
    ///
    /// `install` runs only for a target seen for the first time, while the
    /// installation lock is held. The new descriptor is already published
    /// when it runs, so calls redirected mid-installation find it. If
    /// `install` fails the descriptor is withdrawn and the error returned.
    /// The second element is true when this call performed the installation.
    pub fn get_or_install<F>(
        &self,
        target: &Target,
        install: F,
    ) -> HookResult<(Arc<HookDescriptor>, bool)>
    where
        F: FnOnce(&Arc<HookDescriptor>) -> HookResult<Installed>,
    {
        let id = target.id();
        if let Some(existing) = self.get(id) {
            if existing.is_installed() {
                return Ok((existing, false));
            }
        }

        let _guard = self.install_lock.lock();

        // Re-check under the lock: another thread may have finished first
        if let Some(existing) = self.get(id) {
            return Ok((existing, false));
        }

        let descriptor = Arc::new(HookDescriptor::new(target.clone()));
        self.descriptors.insert(id, descriptor.clone());

        match install(&descriptor) {
            Ok(installed) => {
                descriptor.set_installed(installed);
                Ok((descriptor, true))
            }
            Err(e) => {
                self.descriptors.remove(&id);
                Err(e)
            }
        }
    }

    /// Number of registered descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All registered target identities
    pub fn ids(&self) -> Vec<TargetId> {
        self.descriptors.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
