//! mlbench: time machine-learning estimators and emit standardized reports.

mod args;
mod commands;

use args::SharedArgs;
use clap::Parser;
use mlbench_algos::{ForestParams, KMeansParams};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// mlbench: benchmark linfa K-means and random forest fit/predict
#[derive(Parser, Debug)]
#[command(name = "mlbench", version, about, long_about = None)]
struct Cli {
    /// Workspace directory searched for mlbench.toml
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write JSON logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Time K-means fit and predict
    Kmeans {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        kmeans: KMeansParams,
    },
    /// Time random forest classification fit and predict
    #[command(name = "df-clsf")]
    DfClsf {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        forest: ForestParams,
    },
    /// Write a seeded synthetic train/test split to .npy files
    GenData {
        /// Directory receiving x_train.npy, x_test.npy, y_train.npy and y_test.npy
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        shared: SharedArgs,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default mlbench.toml in the workspace
    Init,
    /// Show the resolved configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr; stdout carries the report
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let (json_layer, _guard) = match &cli.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "mlbench.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let ctx = commands::Context {
        workspace: cli
            .workspace
            .canonicalize()
            .unwrap_or_else(|_| cli.workspace.clone()),
        config: cli.config,
    };
    commands::handle_command(cli.command, &ctx)
}
