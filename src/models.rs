use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    Uk,
    Us,
    #[default]
    Global,
}

impl Region {
    /// Lenient parse: anything that is not `uk` or `us` is treated as global.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "uk" => Region::Uk,
            "us" => Region::Us,
            _ => Region::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Uk => "uk",
            Region::Us => "us",
            Region::Global => "global",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized insight request. Built per HTTP request and dropped with it.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRequest {
    pub calculator_name: String,
    pub category: String,
    pub inputs: Map<String, Value>,
    pub results: Map<String, Value>,
    pub region: Region,
    pub locale: String,
    pub currency: String,
    pub currency_symbol: String,
    pub is_simplified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Module {
    pub name: &'static str,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub interpretation: String,
    pub module_name: String,
    pub module_icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl InsightResponse {
    pub fn success(interpretation: String, module: Module) -> Self {
        Self {
            interpretation,
            module_name: module.name.to_string(),
            module_icon: module.icon.to_string(),
            error: None,
        }
    }
}

/// Degraded outcomes. Each one is still answered with HTTP 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    RateLimited,
    InvalidPayload,
    UpstreamBusy,
    QuotaExhausted,
    Unavailable,
}

impl Fallback {
    pub fn message(&self) -> &'static str {
        match self {
            Fallback::RateLimited => {
                "You're requesting insights a little too quickly. Please wait a moment and try again."
            }
            Fallback::InvalidPayload => {
                "We were unable to process this calculation for an AI insight. Your results above are still accurate."
            }
            Fallback::UpstreamBusy => {
                "We're processing a lot of requests right now. Your result is ready above; try again shortly for a tailored insight."
            }
            Fallback::QuotaExhausted => {
                "AI insights are temporarily unavailable. Your calculation results above are complete and accurate."
            }
            Fallback::Unavailable => {
                "Your calculation is complete. Check the results above for the full breakdown."
            }
        }
    }

    pub fn into_response(self, module: Module) -> InsightResponse {
        InsightResponse {
            interpretation: self.message().to_string(),
            module_name: module.name.to_string(),
            module_icon: module.icon.to_string(),
            error: Some(true),
        }
    }
}
