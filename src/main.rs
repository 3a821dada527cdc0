//! APK Drop - serialized APK installs onto an attached Android device
//!
//! Main application entry point that loads configuration, sets up logging
//! and dispatches the CLI subcommands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apk_drop::commands::{DevicesCommand, InstallCommand, LocateCommand, WatchCommand};
use apk_drop::core::{AppConfig, APP_NAME, VERSION};
use apk_drop::session::SessionManager;

#[derive(Parser)]
#[command(name = "apk-drop", version, about = "Install APKs onto an attached Android device")]
struct Cli {
    /// Configuration file to use instead of the platform default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Install one or more packages, one after another
    Install {
        #[arg(required = true, value_name = "APK")]
        paths: Vec<PathBuf>,
        /// Device id to install on when several are connected
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List authorized devices
    Devices {
        #[arg(long)]
        json: bool,
    },
    /// Print connection status changes until Ctrl-C
    Watch,
    /// Print the resolved ADB path
    Locate,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().await.context("failed to load config")?,
    };

    let _log_guard = init_logging(&config)?;
    info!("{} v{} starting...", APP_NAME, VERSION);

    let mut session = SessionManager::new(config);

    let code = match cli.command {
        Command::Install { paths, device } => {
            let failures = InstallCommand { paths, device }.execute(&session).await?;
            if failures == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Devices { json } => {
            DevicesCommand { json }.execute(&session).await?;
            ExitCode::SUCCESS
        }
        Command::Watch => {
            WatchCommand.execute(&mut session).await?;
            ExitCode::SUCCESS
        }
        Command::Locate => {
            if LocateCommand.execute(&session) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    session.shutdown().await;
    Ok(code)
}

/// Console output plus an append-only diagnostic log file
fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid log level")?;

    let log_file = config.log_file();
    let log_dir = log_file.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;
    let file_name = log_file
        .file_name()
        .context("log file path has no file name")?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .context("failed to set tracing subscriber")?;

    Ok(guard)
}
