//! Interception mode selection
//!
//! Inline patching is preferred: a replaced entry point can be bypassed by
//! code that cached the old entry, so replacement is only used when inline
//! cannot be. Native and dynamic-proxy targets have no managed body to patch,
//! and an ordinary target must be compiled to machine code before it can be
//! patched inline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tendril_sdk::InstallMode;

/// Process-wide mode preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// Pick per target, preferring inline
    #[default]
    Auto,
    /// Force inline where the target allows it
    Inline,
    /// Always replace the entry point
    Replacement,
}

impl HookMode {
    /// Integer code of the mode (0 auto, 1 inline, 2 replacement)
    pub fn code(&self) -> u8 {
        match self {
            HookMode::Auto => 0,
            HookMode::Inline => 1,
            HookMode::Replacement => 2,
        }
    }
}

/// Rejected mode value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal hook mode {0}")]
pub struct IllegalHookMode(pub String);

impl TryFrom<u8> for HookMode {
    type Error = IllegalHookMode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HookMode::Auto),
            1 => Ok(HookMode::Inline),
            2 => Ok(HookMode::Replacement),
            other => Err(IllegalHookMode(other.to_string())),
        }
    }
}

impl FromStr for HookMode {
    type Err = IllegalHookMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "0" => Ok(HookMode::Auto),
            "inline" | "1" => Ok(HookMode::Inline),
            "replacement" | "2" => Ok(HookMode::Replacement),
            _ => Err(IllegalHookMode(s.to_string())),
        }
    }
}

impl fmt::Display for HookMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookMode::Auto => f.write_str("auto"),
            HookMode::Inline => f.write_str("inline"),
            HookMode::Replacement => f.write_str("replacement"),
        }
    }
}

/// Choose the installation mode for one target.
///
/// `compile` is only called when inline is still a candidate for an ordinary
/// target; a `false` from it downgrades to replacement.
pub fn select_mode(
    preference: HookMode,
    native_or_proxy: bool,
    compile: impl FnOnce() -> bool,
) -> InstallMode {
    let wants_inline = match preference {
        HookMode::Auto | HookMode::Inline => true,
        HookMode::Replacement => false,
    };

    if !wants_inline || native_or_proxy {
        return InstallMode::Replacement;
    }

    if compile() {
        InstallMode::Inline
    } else {
        tracing::warn!("failed to compile target method, forcing replacement mode");
        InstallMode::Replacement
    }
}
