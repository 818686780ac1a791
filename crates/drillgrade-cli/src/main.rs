//! drillgrade CLI, the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "drillgrade", version, about = "Communications drill message grader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify and score every message for one exercise
    Grade {
        /// Exercise date: yyyy-mm-dd, today, last or next (overrides config)
        #[arg(long)]
        date: Option<String>,

        /// Exported messages JSON (overrides config)
        #[arg(long)]
        messages: Option<PathBuf>,

        /// Output directory (overrides config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip persistence even when a backend is configured
        #[arg(long)]
        no_persist: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check the reference message for an exercise
    Validate {
        /// Exercise date (overrides config)
        #[arg(long)]
        date: Option<String>,

        /// Validate this reference file instead of the one for the date
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show participation history from the configured store
    History {
        /// Only exercises of this kind (e.g. "Practice")
        #[arg(long)]
        kind: Option<String>,

        /// Only exercises on or after this date (yyyy-mm-dd)
        #[arg(long)]
        since: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write "we missed you" messages for lapsed participants
    Missed {
        /// Date of the next exercise, whose instructions are included (overrides config)
        #[arg(long)]
        date: Option<String>,

        /// Output CSV path
        #[arg(long, default_value = "missedMessages.csv")]
        output: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config, reference tree and sample messages
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drillgrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Grade {
            date,
            messages,
            output,
            no_persist,
            config,
        } => commands::grade::execute(date, messages, output, no_persist, config),
        Commands::Validate {
            date,
            reference,
            config,
        } => commands::validate::execute(date, reference, config),
        Commands::History {
            kind,
            since,
            config,
        } => commands::history::execute(kind, since, config),
        Commands::Missed {
            date,
            output,
            config,
        } => commands::missed::execute(date, output, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
