//! TaskSync CLI
//!
//! Command-line tools for inspecting the TaskSync sync engine.
//!
//! # Commands
//!
//! - `backoff` - Print the retry schedule for a backoff configuration
//! - `simulate` - Run the engine against an in-process server with faults

mod commands;

use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tasksync_engine::{RetryClassification, RetryConfig};
use tracing_subscriber::EnvFilter;

/// TaskSync command-line tools.
#[derive(Parser)]
#[command(name = "tasksync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Backoff parameters.
#[derive(Args)]
struct BackoffArgs {
    /// Delay before the first retry, in milliseconds
    #[arg(long, default_value = "2000")]
    min_ms: u64,

    /// Delay ceiling, in milliseconds
    #[arg(long, default_value = "120000")]
    max_ms: u64,

    /// Growth factor per attempt
    #[arg(long, default_value = "1.5")]
    factor: f64,

    /// Jitter fraction of the base delay
    #[arg(long, default_value = "0.05")]
    jitter: f64,

    /// Stop on auth, not-found and invalid-request failures
    #[arg(long)]
    transient_only: bool,
}

impl BackoffArgs {
    fn retry_config(&self) -> RetryConfig {
        let classification = if self.transient_only {
            RetryClassification::TransientOnly
        } else {
            RetryClassification::All
        };
        RetryConfig::new(
            Duration::from_millis(self.min_ms),
            Duration::from_millis(self.max_ms),
        )
        .with_factor(self.factor)
        .with_jitter(self.jitter)
        .with_classification(classification)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the retry schedule for a backoff configuration
    Backoff {
        #[command(flatten)]
        backoff: BackoffArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run the engine against an in-process server with injected faults
    Simulate {
        #[command(flatten)]
        backoff: BackoffArgs,

        /// Number of items to create concurrently
        #[arg(short, long, default_value = "5")]
        items: usize,

        /// Number of requests the server fails before recovering
        #[arg(long, default_value = "3")]
        fail: usize,

        /// Status code of the injected failures
        #[arg(long, default_value = "503")]
        fail_status: u16,

        /// Number of responses the server corrupts after the failures
        #[arg(long, default_value = "0")]
        corrupt: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Backoff { backoff, format } => {
            commands::backoff::run(&backoff.retry_config(), &format)?;
        }
        Commands::Simulate {
            backoff,
            items,
            fail,
            fail_status,
            corrupt,
            format,
        } => {
            let options = commands::simulate::SimulateOptions {
                retry: backoff.retry_config(),
                items,
                fail,
                fail_status,
                corrupt,
            };
            commands::simulate::run(options, &format)?;
        }
        Commands::Version => {
            println!("TaskSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
