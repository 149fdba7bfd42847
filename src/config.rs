//! Environment-driven settings. `.env` is loaded by the binaries before this runs.
use crate::gateway::{DEFAULT_GATEWAY_URL, DEFAULT_MODEL};
use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub const API_KEY_VAR: &str = "AI_GATEWAY_API_KEY";
const DEFAULT_PORT: u16 = 8787;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub gateway: GatewaySettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = parse_or(&non_empty, "INSIGHT_PORT", DEFAULT_PORT)?;
        let rate_limit_max = parse_or(&non_empty, "RATE_LIMIT_MAX", DEFAULT_MAX_REQUESTS)?;
        if rate_limit_max == 0 {
            anyhow::bail!("RATE_LIMIT_MAX must be at least 1");
        }
        let window_secs = parse_or(
            &non_empty,
            "RATE_LIMIT_WINDOW_SECS",
            DEFAULT_WINDOW.as_secs(),
        )?;
        if window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be at least 1");
        }
        let timeout_secs = parse_or(
            &non_empty,
            "UPSTREAM_TIMEOUT_SECS",
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )?;

        Ok(Self {
            port,
            rate_limit_max,
            rate_limit_window: Duration::from_secs(window_secs),
            gateway: GatewaySettings {
                endpoint: non_empty("AI_GATEWAY_URL")
                    .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
                model: non_empty("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key: non_empty(API_KEY_VAR),
                timeout: Duration::from_secs(timeout_secs.max(1)),
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
