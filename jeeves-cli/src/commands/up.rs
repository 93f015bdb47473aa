//! `jeeves up` command - Start the HTTP server

use anyhow::Result;
use jeeves_core::{server, Backend, Config, Gateway, OpenAiBackend, Translator, UsageLog};
use std::sync::Arc;
use tracing::info;

pub async fn run(config: Config) -> Result<()> {
    info!("Starting Jeeves server...");

    // Initialize usage log
    let db_path = Config::default_db_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine database path"))?;
    let usage = Arc::new(UsageLog::new(&db_path).await?);

    // Create backend client
    let backend = Arc::new(OpenAiBackend::new(&config.backend)?);

    // Check if the backend is reachable
    if !backend.is_reachable().await {
        eprintln!(
            "⚠️  Warning: backend not reachable at '{}'",
            config.backend.base_url
        );
        eprintln!("   Requests will be retried and may fall back to static answers.");
    }

    // Build the gateway
    let mut gateway = Gateway::new(backend, config.backend.clone(), config.gateway.clone())
        .with_usage_log(Arc::clone(&usage));
    if config.translation.enabled {
        gateway = gateway.with_translator(Translator::new(&config.translation)?);
    }

    // Create app state
    let state = Arc::new(server::AppState::new(gateway, usage, config.clone()));

    println!("🚀 Jeeves server starting on {}", config.server_url());
    println!("   Answer endpoint: {}/v1/answer", config.server_url());
    println!("   Status: {}/v1/status", config.server_url());
    println!("   Press Ctrl+C to stop");

    server::start_server(state).await?;

    Ok(())
}
