//! Tendril command-line driver
//!
//! Runs the interception engine against the in-process reference host:
//! a scripted demo, and the mode selection table.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use commands::ConfigOptions;
use std::path::PathBuf;
use tendril_core::HookMode;

#[derive(Parser)]
#[command(name = "tendril")]
#[command(about = "Method interception demo driver", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (tendril.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Intercept a few reference methods and show their calls
    Demo {
        /// Mode preference: auto, inline or replacement
        #[arg(short, long)]
        mode: Option<HookMode>,
        /// Bypass every callback
        #[arg(long)]
        disable_hooks: bool,
        /// Log registrations and calls
        #[arg(long)]
        debug: bool,
    },

    /// Print which installation mode each kind of target gets
    Modes {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            mode,
            disable_hooks,
            debug,
        } => {
            logging::init(cli.verbose, debug);
            let config = commands::load_config(&ConfigOptions {
                config: cli.config.as_deref(),
                mode,
                disable_hooks,
                debug,
            })?;
            commands::demo::execute(config)?;
        }

        Commands::Modes { json } => {
            logging::init(cli.verbose, false);
            let config = commands::load_config(&ConfigOptions {
                config: cli.config.as_deref(),
                ..ConfigOptions::default()
            })?;
            commands::modes::execute(&config, json)?;
        }
    }

    Ok(())
}
