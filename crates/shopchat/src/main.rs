// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shopchat - conversational flows and an omnichannel inbox for retail.
//!
//! This is the binary entry point.

mod flows;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shopchat_config::ShopchatConfig;
use shopchat_storage::SqliteStorage;

/// Shopchat - conversational flows and an omnichannel inbox for retail.
#[derive(Parser, Debug)]
#[command(name = "shopchat", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook gateway, inbox API and dashboard feed.
    Serve,
    /// Validate configuration and exit.
    CheckConfig,
    /// Manage conversational flows.
    Flows {
        #[command(subcommand)]
        action: FlowsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum FlowsCommand {
    /// Import flow bundles from a JSON file (one object or an array).
    Import {
        /// Path to the bundle file.
        file: PathBuf,
    },
    /// Lint stored flows and report overlapping triggers.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> ShopchatConfig {
    let loaded = match path {
        Some(path) => shopchat_config::load_and_validate_path(path),
        None => shopchat_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            shopchat_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

async fn open_storage(config: &ShopchatConfig) -> SqliteStorage {
    match SqliteStorage::open(config.storage.clone()).await {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!(
                "error: cannot open database {}: {e}",
                config.storage.database_path
            );
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    serve::init_tracing(&config.server.log_level);

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "shopchat: config ok (server.name={}, database={})",
                config.server.name, config.storage.database_path
            );
        }
        Some(Commands::Flows { action }) => {
            let storage = open_storage(&config).await;
            match action {
                FlowsCommand::Import { file } => match flows::import(&storage, &file).await {
                    Ok(ids) => println!("imported {} flow(s): {ids:?}", ids.len()),
                    Err(e) => {
                        eprintln!("error: {e}");
                        std::process::exit(1);
                    }
                },
                FlowsCommand::Check => match flows::check(&storage).await {
                    Ok(issues) => {
                        if !flows::report(&issues) {
                            std::process::exit(2);
                        }
                    }
                    Err(e) => {
                        eprintln!("error: {e}");
                        std::process::exit(1);
                    }
                },
            }
        }
        None => {
            println!("shopchat: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flows_import() {
        let cli = Cli::parse_from(["shopchat", "flows", "import", "bundle.json"]);
        match cli.command {
            Some(Commands::Flows {
                action: FlowsCommand::Import { file },
            }) => assert_eq!(file, PathBuf::from("bundle.json")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = shopchat_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.server.name, "shopchat");
    }
}
