//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - One-shot classification and insight commands
//! - `check` - Upstream connectivity check
//! - `import` - Bank statement import and bulk classification
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command
//! - `taxonomy` - Category taxonomy inspection

pub mod analyze;
pub mod check;
pub mod import;
pub mod prompts;
pub mod serve;
pub mod taxonomy;

// Re-export command functions for main.rs
pub use analyze::*;
pub use check::*;
pub use import::*;
pub use prompts::*;
pub use serve::*;
pub use taxonomy::*;

use anyhow::{Context, Result};
use tally_core::{ModelBackend, ModelClient};

/// Build the model client from the environment and settings file
pub fn load_client() -> Result<ModelClient> {
    let client = ModelClient::from_env().context("Failed to configure model backend")?;
    tracing::debug!(
        backend = client.name(),
        model = client.model(),
        "Model client ready"
    );
    Ok(client)
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
