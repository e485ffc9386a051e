//! Upstream connectivity check

use anyhow::{bail, Result};
use tally_core::{ModelBackend, ModelClient};

/// Report the configured backend and fail if it cannot be reached
pub async fn cmd_check(client: &ModelClient) -> Result<()> {
    println!("Model backend: {}", client.name());
    println!("   Host:  {}", client.host());
    println!("   Model: {}", client.model());
    println!(
        "   Credential: {}",
        if client.credential_configured() {
            "configured"
        } else {
            "missing"
        }
    );
    println!();

    if !client.health_check().await {
        println!("❌ Backend is not responding");
        bail!("model backend {} is unreachable", client.host());
    }

    println!("✅ Backend is reachable");
    Ok(())
}
