use anyhow::{Context, Result};
use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod dto;
mod error;
mod routes;
mod server;
mod state;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    if let Err(e) = run(cli).await {
        handle_error(e);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> Result<()> {
    let config = config::Config::new(cli.config.as_deref()).context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let pool = db::establish_connection(&config.database_path).await?;
    let state = state::AppState::new(SqliteRepository::new(pool.clone()), config);

    let result = match cli.command {
        cli::Commands::Serve => server::serve(state).await,
        cli::Commands::Process(command) => commands::process::process(&state, command).await,
        cli::Commands::Upcoming(command) => commands::upcoming::upcoming(&state, command).await,
    };

    pool.close().await;
    result
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    match err.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(s)) => eprintln!("{} {}", "Error:".style(error_style), s),
        Some(CoreError::Validation(errors)) => {
            eprintln!("{} Validation failed:", "Error:".style(error_style));
            for field in errors.errors() {
                eprintln!("  {}: {}", field.field.yellow(), field.message);
            }
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
