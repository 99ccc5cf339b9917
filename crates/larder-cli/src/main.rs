#![forbid(unsafe_code)]

//! Larder CLI
//!
//! Lists the operation catalog and runs one-shot dispatches through the
//! same gateway a server transport would use.

mod app;
mod cli;
mod config;
mod providers;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CliArgs, Command, ConfigAction};
use config::LarderConfig;
use larder_auth::Credentials;
use serde_json::Value;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    let config = LarderConfig::load(args.config.as_deref())?;
    init_logging(&config, args.verbose);

    match args.command {
        Command::Tools => {
            let gateway = app::build_gateway(&config)?;
            let catalog = gateway.dispatcher().list_operations();
            println!("{}", serde_json::to_string_pretty(&catalog)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { name, args, token } => {
            let gateway = app::build_gateway(&config)?;
            let arguments: Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let credentials = match token {
                Some(token) => Credentials::bearer(token),
                None => Credentials::anonymous(),
            };
            let result = gateway.handle(&credentials, &name, arguments).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Config(cmd) => {
            match cmd.command {
                ConfigAction::Path => {
                    let path = LarderConfig::resolve_config_path(args.config.as_deref())
                        .context("could not determine config directory for this platform")?;
                    println!("{}", path.display());
                    if !path.exists() {
                        eprintln!("(file does not exist, built-in defaults apply)");
                    }
                }
                ConfigAction::Show { env } => {
                    let shown = config.redacted();
                    if env {
                        for (key, value) in shown.to_env_vars()? {
                            println!("{key}={value}");
                        }
                    } else {
                        print!("{}", shown.to_toml_string()?);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over the configured level;
/// `--verbose` forces debug. Output goes to stderr so stdout stays JSON.
fn init_logging(config: &LarderConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(level = %config.logging.level, "logging initialized");
}
