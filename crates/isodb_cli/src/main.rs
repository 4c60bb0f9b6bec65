//! isodb CLI
//!
//! Scripted walkthroughs of the classic transaction isolation
//! anomalies, run against the in-memory engine.
//!
//! # Scenarios
//!
//! - `atomicity` - A transfer that commits whole or vanishes whole
//! - `dirty-read` - An uncommitted raise leaks into a report
//! - `non-repeatable-read` - One report, two answers for the same rows
//! - `phantom-read` - A rescan grows a row nobody locked
//! - `deadlock` - Two writers cross and the newest waiter dies

mod render;
mod scenarios;

use clap::{Parser, Subcommand};
use isodb_core::IsolationLevel;
use tracing_subscriber::EnvFilter;

/// Transaction isolation walkthroughs.
#[derive(Parser)]
#[command(name = "isodb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose engine logging
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the all-or-nothing transfer demo
    Atomicity,

    /// Show an uncommitted write leaking into a report
    DirtyRead {
        /// Isolation level for the reporting transaction
        #[arg(short, long, default_value = "read uncommitted")]
        isolation: IsolationLevel,
    },

    /// Show one transaction reading two different answers
    NonRepeatableRead {
        /// Isolation level for the reporting transaction
        #[arg(short, long, default_value = "read committed")]
        isolation: IsolationLevel,
    },

    /// Show a rescan picking up a freshly inserted row
    PhantomRead {
        /// Isolation level for the shopping transaction
        #[arg(short, long, default_value = "repeatable read")]
        isolation: IsolationLevel,
    },

    /// Cross two writers and watch the victim get picked
    Deadlock,

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
        Commands::Atomicity => scenarios::atomicity::run()?,
        Commands::DirtyRead { isolation } => scenarios::dirty_read::run(isolation)?,
        Commands::NonRepeatableRead { isolation } => scenarios::non_repeatable::run(isolation)?,
        Commands::PhantomRead { isolation } => scenarios::phantom::run(isolation)?,
        Commands::Deadlock => scenarios::deadlock::run()?,
        Commands::Version => {
            println!("isodb CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
