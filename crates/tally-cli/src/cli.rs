//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Categorize bank messages and summarize monthly spending
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "LLM-backed expense analyzer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        ///
        /// Without this flag only same-origin browser requests are allowed.
        /// Example: --allow-origin http://localhost:5173
        #[arg(long)]
        allow_origin: Vec<String>,
    },

    /// Classify a single transaction message
    Classify {
        /// Raw message text, e.g. an SMS debit alert
        text: String,

        /// Print the raw JSON result instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Summarize one to three monthly expense summaries
    Insights {
        /// JSON file holding an array of monthly summaries
        #[arg(short, long)]
        file: PathBuf,

        /// Print the raw JSON result instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Classify every row of a bank statement CSV
    Import {
        /// Statement CSV (S No., Value Date, Transaction Date, ... Balance (INR))
        #[arg(short, long)]
        file: PathBuf,

        /// Only classify the first N rows
        #[arg(long)]
        limit: Option<usize>,

        /// Print classified rows as JSON
        #[arg(long)]
        json: bool,

        /// Write the latest monthly summaries here for `tally insights`
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Show the active category taxonomy
    Taxonomy,

    /// Check that the configured model backend is reachable
    Check,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., classify_transaction, analyze_insights)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
