use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Recurring task service: HTTP API plus admin commands
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./cadence.toml)
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server
    Serve,
    /// Materialize due occurrences into tasks
    Process(ProcessCommand),
    /// Preview upcoming occurrences of a recurring task
    Upcoming(UpcomingCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct ProcessCommand {
    /// Report what would be created without writing anything
    #[clap(long)]
    pub dry_run: bool,
    /// Stop after creating this many tasks
    #[clap(long)]
    pub max_tasks: Option<usize>,
    /// Only process these recurring tasks
    #[clap(long = "id")]
    pub ids: Vec<Uuid>,
    /// Materialize occurrences up to this date instead of now
    #[clap(long, help = "Upper bound (RFC 3339 or YYYY-MM-DD)")]
    pub until: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct UpcomingCommand {
    /// The recurring task ID
    pub id: Uuid,
    /// Number of occurrences to show
    #[clap(short = 'n', long, default_value_t = 10)]
    pub count: usize,
    /// Start of the preview (defaults to now)
    #[clap(long)]
    pub from: Option<String>,
    /// End of the preview
    #[clap(long)]
    pub to: Option<String>,
}
