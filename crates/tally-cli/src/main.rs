//! Tally CLI - Expense analyzer
//!
//! Usage:
//!   tally serve --port 8000         Start the HTTP API
//!   tally classify "<sms text>"     Classify one transaction message
//!   tally insights --file m.json    Summarize one to three months
//!   tally import --file stmt.csv    Classify a bank statement export
//!   tally check                     Verify the model backend is reachable

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            allow_origin,
        } => commands::cmd_serve(&host, port, allow_origin).await,
        Commands::Classify { text, json } => {
            let client = commands::load_client()?;
            commands::cmd_classify(client, &text, json).await
        }
        Commands::Insights { file, json } => {
            let client = commands::load_client()?;
            commands::cmd_insights(client, &file, json).await
        }
        Commands::Import {
            file,
            limit,
            json,
            summary,
        } => {
            let client = commands::load_client()?;
            commands::cmd_import(client, &file, limit, json, summary.as_deref()).await
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Taxonomy => commands::cmd_taxonomy(),
        Commands::Check => {
            let client = commands::load_client()?;
            commands::cmd_check(&client).await
        }
    }
}
