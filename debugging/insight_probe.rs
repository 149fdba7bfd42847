//! Print the prompt and module chosen for a calculator payload, then ask the
//! live AI gateway for an insight when a key is configured.
//! Usage:
//!   cargo run --bin insight_probe -- <payload.json>
//!   cargo run --bin insight_probe -- --prompt-only <payload.json>
//! Reads AI_GATEWAY_API_KEY / AI_GATEWAY_URL / AI_MODEL from the environment (.env supported).

use anyhow::{Context, Result};
use calc_insight::app::compose_prompt;
use calc_insight::config::Settings;
use calc_insight::gateway::{CompletionApi, GatewayClient, UpstreamReply};
use calc_insight::prompts::{select_module, Category};
use calc_insight::validate::validate_payload;
use dotenvy::dotenv;
use serde_json::Value;
use std::env;
use std::fs;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let prompt_only = match args.iter().position(|a| a == "--prompt-only") {
        Some(idx) => {
            args.remove(idx);
            true
        }
        None => false,
    };
    let path = args
        .first()
        .context("Usage: insight_probe [--prompt-only] <payload.json>")?;

    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let payload: Value = serde_json::from_str(&raw).context("Payload is not valid JSON")?;
    let request = validate_payload(&payload)?;

    let category = Category::parse(&request.category);
    let module = select_module(category, request.region);
    let prompt = compose_prompt(&request, category)?;

    println!("module: {} {}", module.icon, module.name);
    println!("max_tokens: {}", prompt.max_tokens);
    println!("--- system ---\n{}", prompt.system);
    println!("--- user ---\n{}", prompt.user);

    if prompt_only {
        return Ok(());
    }

    let settings = Settings::from_env()?;
    if settings.gateway.api_key.is_none() {
        println!("(AI_GATEWAY_API_KEY not set, skipping upstream call)");
        return Ok(());
    }

    let client = GatewayClient::new(&settings.gateway)?;
    println!("--- reply ({}) ---", client.model());
    match client.complete(&prompt).await? {
        UpstreamReply::Text(text) => println!("{}", text),
        UpstreamReply::RateLimited => println!("upstream returned 429 (rate limited)"),
        UpstreamReply::QuotaExhausted => println!("upstream returned 402 (quota exhausted)"),
    }

    Ok(())
}
