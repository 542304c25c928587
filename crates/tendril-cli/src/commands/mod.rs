//! Subcommand implementations

pub mod demo;
pub mod modes;

use anyhow::Context;
use std::path::Path;
use tendril_core::{HookConfig, HookMode};

/// Options shared by every subcommand that builds an interceptor
#[derive(Debug, Default)]
pub struct ConfigOptions<'a> {
    pub config: Option<&'a Path>,
    pub mode: Option<HookMode>,
    pub disable_hooks: bool,
    pub debug: bool,
}

/// Defaults, then the config file, then `TENDRIL_*`, then flags
pub fn load_config(options: &ConfigOptions<'_>) -> anyhow::Result<HookConfig> {
    let mut config = match options.config {
        Some(path) => HookConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => HookConfig::default(),
    };
    config = config
        .apply_env()
        .context("invalid TENDRIL_* environment")?;

    if let Some(mode) = options.mode {
        config.hook_mode = mode;
    }
    if options.disable_hooks {
        config.disable_hooks = true;
    }
    if options.debug {
        config.debug = true;
    }
    Ok(config)
}
