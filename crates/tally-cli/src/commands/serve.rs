//! Server command implementation

use anyhow::Result;
use tally_server::ServerConfig;

pub async fn cmd_serve(host: &str, port: u16, allowed_origins: Vec<String>) -> Result<()> {
    println!("🚀 Starting Tally web server...");
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Backend: {}",
        std::env::var("TALLY_BACKEND").unwrap_or_else(|_| "gemini".to_string())
    );

    if allowed_origins.is_empty() {
        println!("   🔒 CORS: same-origin only");
    } else {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }

    if host != "127.0.0.1" && host != "localhost" {
        println!();
        println!("   ⚠️  The API has no authentication - only bind to trusted networks!");
    }
    println!();

    let config = ServerConfig { allowed_origins };
    tally_server::serve_with_config(host, port, config).await
}
