//! `jeeves config` commands - View and manage configuration

use anyhow::Result;
use jeeves_core::Config;

/// Show current configuration
pub fn show(config: Config) -> Result<()> {
    println!("╭─────────────────────────────────────────╮");
    println!("│         Jeeves Configuration            │");
    println!("├─────────────────────────────────────────┤");
    println!("│ Backend                                 │");
    println!("│   Base URL:     {:<23} │", truncate(&config.backend.base_url, 23));
    println!("│   Model:        {:<23} │", truncate(&config.backend.model, 23));
    println!(
        "│   API key:      {:<23} │",
        if config.backend.api_key.is_some() {
            "set"
        } else {
            "(not set)"
        }
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Gateway                                 │");
    println!("│   Max retries:  {:<23} │", config.gateway.max_retries);
    println!("│   Retry delay:  {:<23} │", config.gateway.retry_delay);
    println!("│   Call spacing: {:<23} │", config.gateway.rate_limit_delay);
    println!("│   Cache TTL:    {:<23} │", config.gateway.cache_expire_time);
    println!(
        "│   Cache:        {:<23} │",
        if config.gateway.enable_cache { "enabled" } else { "disabled" }
    );
    println!(
        "│   Fallback:     {:<23} │",
        if config.gateway.enable_fallback { "enabled" } else { "disabled" }
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Server                                  │");
    println!("│   Host:         {:<23} │", config.server.host);
    println!("│   Port:         {:<23} │", config.server.port);
    println!("│   URL:          {:<23} │", truncate(&config.server_url(), 23));
    println!("├─────────────────────────────────────────┤");
    println!("│ Translation                             │");
    println!(
        "│   Enabled:      {:<23} │",
        if config.translation.enabled { "yes" } else { "no" }
    );
    println!(
        "│   Endpoint:     {:<23} │",
        truncate(&config.translation.endpoint, 23)
    );
    println!("├─────────────────────────────────────────┤");
    println!("│ Logging                                 │");
    println!("│   Level:        {:<23} │", config.logging.level);
    println!("╰─────────────────────────────────────────╯");

    // Show paths
    println!("\n📁 Paths:");
    if let Some(path) = Config::default_config_path() {
        let exists = path.exists();
        println!(
            "   Config:   {} {}",
            path.display(),
            if exists { "✓" } else { "(not created)" }
        );
    }
    if let Some(path) = Config::default_db_path() {
        let exists = path.exists();
        println!(
            "   Database: {} {}",
            path.display(),
            if exists { "✓" } else { "(not created)" }
        );
    }

    Ok(())
}

/// Initialize default configuration
pub fn init(force: bool) -> Result<()> {
    let path = Config::default_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

    if path.exists() && !force {
        println!(
            "⚠️  Configuration file already exists at: {}",
            path.display()
        );
        println!("   Use --force to overwrite.");
        return Ok(());
    }

    // Ensure directory exists
    Config::ensure_dirs()?;

    // Create default config
    let config = Config::default();
    config.save_to_file(&path)?;

    println!("✅ Created configuration file at: {}", path.display());
    println!("\n📝 Default configuration:");
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}…", &s[..max_len - 1])
    }
}
