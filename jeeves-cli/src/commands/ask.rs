//! `jeeves ask` command - Send a one-shot prompt through the gateway

use anyhow::{bail, Result};
use jeeves_core::{
    AnswerRequest, AnswerSource, Config, Gateway, OpenAiBackend, Translator, UsageLog,
};
use std::io::{self, BufRead};
use std::sync::Arc;
use tracing::debug;

/// Read prompt from stdin if available
fn read_stdin() -> Option<String> {
    if atty::is(atty::Stream::Stdin) {
        // Stdin is a terminal, not piped
        None
    } else {
        let stdin = io::stdin();
        let lines: Vec<String> = stdin.lock().lines().map_while(Result::ok).collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

pub async fn run(config: Config, prompt: Option<String>, lang: Option<String>) -> Result<()> {
    // Get prompt from argument or stdin
    let prompt = match prompt {
        Some(p) => p,
        None => match read_stdin() {
            Some(p) => p,
            None => {
                bail!("No prompt provided. Usage: jeeves ask \"your prompt\" or echo \"prompt\" | jeeves ask");
            }
        },
    };

    debug!("Prompt: {} chars", prompt.len());

    // Initialize usage log
    let db_path = Config::default_db_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine database path"))?;
    let usage = Arc::new(UsageLog::new(&db_path).await?);

    // Build the gateway
    let backend = Arc::new(OpenAiBackend::new(&config.backend)?);
    let mut gateway =
        Gateway::new(backend, config.backend.clone(), config.gateway.clone()).with_usage_log(usage);
    if config.translation.enabled {
        gateway = gateway.with_translator(Translator::new(&config.translation)?);
    }

    // Build request
    let mut request = AnswerRequest::new(&prompt);
    if let Some(lang) = lang {
        request = request.with_target_lang(lang);
    }

    let response = gateway.answer(&request).await?;

    match response.source {
        AnswerSource::Cached => eprintln!("(cached answer)"),
        AnswerSource::Fallback => eprintln!("(fallback answer - backend unavailable)"),
        AnswerSource::Live => {}
    }
    println!("{}", response.text);

    Ok(())
}
