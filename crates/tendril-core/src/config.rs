//! Interceptor configuration
//!
//! [`HookConfig`] is the static description (defaults, `tendril.toml`,
//! environment overlay). [`LiveConfig`] is the copy an interceptor reads on
//! every call; its switches can be flipped while calls are in flight.

use crate::mode::HookMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use thiserror::Error;

/// Environment variable enabling debug logging
pub const ENV_DEBUG: &str = "TENDRIL_DEBUG";
/// Environment variable forcing the dispatch fast path
pub const ENV_DISABLE_HOOKS: &str = "TENDRIL_DISABLE_HOOKS";
/// Environment variable selecting the hook mode
pub const ENV_HOOK_MODE: &str = "TENDRIL_HOOK_MODE";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is present but not acceptable
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Interceptor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HookConfig {
    /// Log every registration and dispatch at debug level
    pub debug: bool,

    /// The host process is debuggable; reported in diagnostics
    pub debuggable: bool,

    /// Bypass all callbacks and call originals directly
    pub disable_hooks: bool,

    /// Mode preference for new installations
    pub hook_mode: HookMode,
}

impl HookConfig {
    /// Parse a `tendril.toml` document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Overlay `TENDRIL_*` variables from the process environment
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `TENDRIL_*` variables using a custom lookup
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DEBUG) {
            self.debug = parse_flag(ENV_DEBUG, &v)?;
        }
        if let Some(v) = lookup(ENV_DISABLE_HOOKS) {
            self.disable_hooks = parse_flag(ENV_DISABLE_HOOKS, &v)?;
        }
        if let Some(v) = lookup(ENV_HOOK_MODE) {
            self.hook_mode = v
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("{}: {}", ENV_HOOK_MODE, e)))?;
        }
        Ok(self)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::ValidationError(format!(
            "{}: expected a boolean, got {:?}",
            key, other
        ))),
    }
}

/// Configuration as read by a running interceptor
#[derive(Debug)]
pub struct LiveConfig {
    debug: AtomicBool,
    debuggable: bool,
    disable_hooks: AtomicBool,
    hook_mode: AtomicU8,
}

impl LiveConfig {
    /// Snapshot a static configuration
    pub fn new(config: &HookConfig) -> Self {
        Self {
            debug: AtomicBool::new(config.debug),
            debuggable: config.debuggable,
            disable_hooks: AtomicBool::new(config.disable_hooks),
            hook_mode: AtomicU8::new(config.hook_mode.code()),
        }
    }

    /// Debug logging enabled
    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Toggle debug logging
    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    /// Host is debuggable
    pub fn debuggable(&self) -> bool {
        self.debuggable
    }

    /// Callbacks globally bypassed
    pub fn hooks_disabled(&self) -> bool {
        self.disable_hooks.load(Ordering::Acquire)
    }

    /// Toggle the global bypass
    pub fn set_hooks_disabled(&self, disabled: bool) {
        self.disable_hooks.store(disabled, Ordering::Release);
    }

    /// Current mode preference
    pub fn hook_mode(&self) -> HookMode {
        HookMode::try_from(self.hook_mode.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Change the mode preference for future installations
    pub fn set_hook_mode(&self, mode: HookMode) {
        self.hook_mode.store(mode.code(), Ordering::Relaxed);
    }

    /// Rebuild a static configuration from the current values
    pub fn to_config(&self) -> HookConfig {
        HookConfig {
            debug: self.debug(),
            debuggable: self.debuggable,
            disable_hooks: self.hooks_disabled(),
            hook_mode: self.hook_mode(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self::new(&HookConfig::default())
    }
}
