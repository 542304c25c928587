//! `tendril modes` - print the installation mode selection table

use serde_json::json;
use tendril_core::{select_mode, HookConfig, HookMode};

static PREFERENCES: [HookMode; 3] = [HookMode::Auto, HookMode::Inline, HookMode::Replacement];

/// (label, native_or_proxy, compiles)
static TARGET_KINDS: [(&str, bool, bool); 3] = [
    ("ordinary", false, true),
    ("uncompilable", false, false),
    ("native/proxy", true, false),
];

pub fn execute(config: &HookConfig, as_json: bool) -> anyhow::Result<()> {
    let rows: Vec<_> = PREFERENCES
        .iter()
        .flat_map(|&preference| {
            TARGET_KINDS
                .iter()
                .map(move |&(kind, native_or_proxy, compiles)| {
                    let mode = select_mode(preference, native_or_proxy, || compiles);
                    (preference, kind, mode)
                })
        })
        .collect();

    if as_json {
        let table: Vec<_> = rows
            .iter()
            .map(|(preference, kind, mode)| {
                json!({
                    "preference": preference,
                    "target": kind,
                    "installed": mode.to_string(),
                })
            })
            .collect();
        let out = json!({
            "configured": config.hook_mode,
            "table": table,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Configured preference: {}", config.hook_mode);
    println!();
    println!("{:<14} {:<14} {}", "PREFERENCE", "TARGET", "INSTALLED");
    for (preference, kind, mode) in rows {
        let marker = if preference == config.hook_mode { "*" } else { " " };
        println!(
            "{}{:<13} {:<14} {}",
            marker,
            preference.to_string(),
            kind,
            mode
        );
    }
    Ok(())
}
