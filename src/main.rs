use anyhow::Result;
use calc_insight::config::{Settings, API_KEY_VAR};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn check_env(settings: &Settings) {
    // Missing key is not fatal: each request degrades to the generic fallback.
    if settings.gateway.api_key.is_none() {
        warn!(
            "{} is not set - every insight request will return the fallback message",
            API_KEY_VAR
        );
    } else {
        info!("AI gateway credentials found");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenv();
    init_tracing();
    match dotenv_result {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    let settings = Settings::from_env()?;
    check_env(&settings);
    calc_insight::app::run_server(settings).await
}
