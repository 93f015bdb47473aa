//! `jeeves usage` command - View recent gateway usage

use anyhow::Result;
use jeeves_core::{Config, UsageLog};
use tracing::info;

pub async fn run(last: u32, json_output: bool) -> Result<()> {
    let db_path = Config::default_db_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine database path"))?;

    let usage = UsageLog::new(&db_path).await?;
    let stats = usage.stats().await?;
    let events = usage.recent(last).await?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "stats": stats,
                "events": events,
            }))?
        );
        return Ok(());
    }

    println!("╭─────────────────────────────────────────╮");
    println!("│           Jeeves Usage Today            │");
    println!("├─────────────────────────────────────────┤");
    println!("│  Requests:          {:>10}          │", stats.requests_today);
    println!("│  Live answers:      {:>10}          │", stats.live_today);
    println!("│  Cache hits:        {:>10}          │", stats.cached_today);
    println!("│  Fallbacks:         {:>10}          │", stats.fallback_today);
    println!("├─────────────────────────────────────────┤");
    println!(
        "│  Input tokens:      {:>10}          │",
        stats.approx_input_tokens_today
    );
    println!(
        "│  Output tokens:     {:>10}          │",
        stats.approx_output_tokens_today
    );
    if let Some(error) = &stats.last_error {
        println!("├─────────────────────────────────────────┤");
        println!("│  Last error: {:<26} │", truncate(error, 26));
    }
    println!("╰─────────────────────────────────────────╯");

    if events.is_empty() {
        println!("\nNo usage events recorded yet.");
        return Ok(());
    }

    println!("\n╭──────────────────────────────────────────────────────────────────────────────╮");
    println!("│                              Recent Usage Log                                │");
    println!("├────────────────────┬────────────────┬──────────┬────────┬───────────────────┤");
    println!("│ Time               │ Model          │ Source   │ Status │ Tokens (in/out)   │");
    println!("├────────────────────┼────────────────┼──────────┼────────┼───────────────────┤");

    for event in &events {
        let time = chrono::DateTime::parse_from_rfc3339(&event.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "???".to_string());

        let status = if event.success { "✓" } else { "✗" };

        println!(
            "│ {:<18} │ {:<14} │ {:<8} │   {}    │ {:>6} / {:<6}   │",
            time,
            truncate(&event.model, 14),
            truncate(&event.source, 8),
            status,
            event.approx_input_tokens,
            event.approx_output_tokens
        );
    }

    println!("╰────────────────────┴────────────────┴──────────┴────────┴───────────────────╯");

    info!("Displayed {} recent events", events.len());
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}…", &s[..max_len - 1])
    }
}
