//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

/// Larder tool dispatcher.
#[derive(Parser, Debug)]
#[command(name = "larder", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "LARDER_CONFIG")]
    pub config: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the operation catalog as JSON.
    Tools,

    /// Invoke one operation and print the result envelope.
    Call {
        /// Operation name, e.g. `pantry.items.list`.
        name: String,

        /// Arguments as a JSON object.
        #[arg(short, long, default_value = "{}")]
        args: String,

        /// Bearer token identifying the caller.
        #[arg(short, long, env = "LARDER_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration with tokens masked.
    Show {
        /// Print the environment-overridable settings as `LARDER_*` pairs.
        #[arg(long)]
        env: bool,
    },
}
