// SPDX-FileCopyrightText: 2026 Leadwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leadwire - WhatsApp lead engagement for wholesale sales teams.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use leadwire_config::{ConfigError, LeadwireConfig};

/// Leadwire - WhatsApp lead engagement for wholesale sales teams.
#[derive(Parser, Debug)]
#[command(name = "leadwire", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Link the WhatsApp account and process inbound messages until stopped.
    Serve,
    /// Show the persisted connection state.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Manage Leadwire configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration, printing any problems.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<LeadwireConfig, Vec<ConfigError>> {
    match path {
        Some(path) => leadwire_config::load_and_validate_path(path),
        None => leadwire_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            leadwire_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Config {
            action: ConfigCommand::Check,
        }) => {
            println!(
                "leadwire: configuration OK (agent.name={}, specialists={}, language service={})",
                config.agent.name,
                config.specialists.len(),
                if config.openai.api_key.is_some() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            Ok(())
        }
        None => {
            println!("leadwire: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_config_check() {
        let cli = Cli::try_parse_from(["leadwire", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigCommand::Check
            })
        ));
    }

    #[test]
    fn cli_accepts_global_config_path() {
        let cli =
            Cli::try_parse_from(["leadwire", "serve", "--config", "/tmp/leadwire.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/leadwire.toml")));
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadwire.toml");
        std::fs::write(
            &path,
            "[agent]\nname = \"mayorista\"\n\n[whatsapp]\nmax_reconnect_attempts = 3\n",
        )
        .unwrap();
        let config = load(Some(&path)).unwrap();
        assert_eq!(config.agent.name, "mayorista");
        assert_eq!(config.whatsapp.max_reconnect_attempts, 3);
    }

    #[test]
    #[serial_test::serial]
    fn environment_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leadwire.toml");
        std::fs::write(&path, "[pipeline]\nauto_reply = false\n").unwrap();

        // SAFETY: serialized with every other test that touches the environment.
        unsafe { std::env::set_var("LEADWIRE_PIPELINE_AUTO_REPLY", "true") };
        let config = load(Some(&path));
        unsafe { std::env::remove_var("LEADWIRE_PIPELINE_AUTO_REPLY") };

        assert!(config.unwrap().pipeline.auto_reply);
    }
}
