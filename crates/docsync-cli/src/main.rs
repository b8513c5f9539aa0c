//! docsync CLI
//!
//! Command-line interface for docsync - push local documents to a remote
//! target, follow them as they change, and resolve conflicts.

use std::fs::{self, File};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docsync_core::{Config, ConflictChoice};

mod commands;
mod documents;
mod output;

use commands::Engine;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "docsync")]
#[command(about = "docsync - Keep local documents in sync with a remote target")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection, target and pending snapshot
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Sign in or out
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Select or clear the target directory
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Sync a file now
    Push {
        /// File to sync
        file: PathBuf,
        /// Resolve a conflict with local, remote or both
        #[arg(long, value_name = "CHOICE")]
        resolve: Option<ConflictChoice>,
    },
    /// Follow a file and sync it after every save
    Watch {
        /// File to follow
        file: PathBuf,
        /// How often to check the file, in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Push the snapshot left pending by an earlier failure
    Retry,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (sync_enabled, remote_dir, debounce_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Sign in
    Login,
    /// Sign out
    Logout,
}

#[derive(Subcommand)]
enum TargetCommands {
    /// Use a directory as the target
    Set {
        /// Target directory (created if missing)
        dir: PathBuf,
    },
    /// Forget the target
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work even when the config file is broken
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Config { command } => handle_config_command(command, config_path, &output),
        Commands::Status => commands::status::show(&Engine::open(&config)?, &output),
        Commands::Auth { command } => match command {
            AuthCommands::Login => commands::auth::login(&config, &output),
            AuthCommands::Logout => commands::auth::logout(&config, &output),
        },
        Commands::Target { command } => match command {
            TargetCommands::Set { dir } => commands::target::set(dir, config_path, &output),
            TargetCommands::Clear => commands::target::clear(config_path, &output),
        },
        Commands::Push { file, resolve } => {
            commands::sync::push(&Engine::open(&config)?, &file, resolve, &output).await
        }
        Commands::Watch { file, interval_ms } => {
            commands::sync::watch(&Engine::open(&config)?, &file, interval_ms, &output).await
        }
        Commands::Retry => commands::sync::retry(&Engine::open(&config)?, &output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over `-v`. Logs go to `log_file` when
/// configured, otherwise to stderr.
fn init_logging(config: &Config, verbose: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("docsync_core={},docsync_cli={}", level, level))
    });

    let Some(log_path) = &config.log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let log_file = match File::create(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging to {:?}", log_path);
}
