//! `jeeves status` command - Check server status

use anyhow::Result;
use jeeves_core::Config;

pub async fn run(config: Config) -> Result<()> {
    let url = format!("{}/health", config.server_url());

    println!("Checking Jeeves server status...");
    println!("URL: {}", url);

    // Try to connect to the server
    match reqwest::get(&url).await {
        Ok(response) => {
            if response.status().is_success() {
                let health: serde_json::Value = response.json().await?;

                println!("\n✅ Jeeves server is running");
                println!(
                    "   Status:   {}",
                    health
                        .get("status")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                );
                println!(
                    "   Version:  {}",
                    health
                        .get("version")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                );
                println!(
                    "   Backend:  {}",
                    if health
                        .get("backend_reachable")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false)
                    {
                        "reachable ✓"
                    } else {
                        "not reachable ⚠"
                    }
                );

                // Get usage info too
                let status_url = format!("{}/v1/status", config.server_url());
                if let Ok(status_response) = reqwest::get(&status_url).await {
                    if let Ok(status) = status_response.json::<serde_json::Value>().await {
                        println!("\n📊 Today:");
                        println!(
                            "   Requests: {}",
                            status
                                .get("requests_today")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0)
                        );
                        println!(
                            "   Live / cached / fallback: {} / {} / {}",
                            status
                                .get("live_today")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0),
                            status
                                .get("cached_today")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0),
                            status
                                .get("fallback_today")
                                .and_then(|v| v.as_u64())
                                .unwrap_or(0)
                        );
                    }
                }
            } else {
                println!(
                    "\n⚠️  Jeeves server responded with status: {}",
                    response.status()
                );
            }
        }
        Err(_) => {
            println!("\n❌ Jeeves server is not running");
            println!("   Start it with: jeeves up");
        }
    }

    Ok(())
}
