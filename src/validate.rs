//! Inbound payload validation for insight requests.
use crate::models::{InsightRequest, Region};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MAX_NAME_CHARS: usize = 100;
const MAX_OPTION_CHARS: usize = 16;

const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_CURRENCY_SYMBOL: &str = "$";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid insight payload: {reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub fn validate_payload(payload: &Value) -> Result<InsightRequest, ValidationError> {
    let body = payload
        .as_object()
        .ok_or_else(|| ValidationError::new("body must be a JSON object"))?;

    let raw_name = required_str(body, "calculatorName")?;
    let raw_category = required_str(body, "category")?;
    let inputs = required_object(body, "inputs")?;
    let results = required_object(body, "results")?;

    let category = raw_category.trim().to_lowercase();

    let region = body
        .get("region")
        .and_then(|v| v.as_str())
        .map(Region::parse)
        .unwrap_or_default();

    Ok(InsightRequest {
        calculator_name: sanitize_calculator_name(raw_name),
        category,
        inputs: inputs.clone(),
        results: results.clone(),
        region,
        locale: optional_str(body, "locale", DEFAULT_LOCALE),
        currency: optional_str(body, "currency", DEFAULT_CURRENCY),
        currency_symbol: optional_str(body, "currencySymbol", DEFAULT_CURRENCY_SYMBOL),
        is_simplified: body
            .get("isSimplified")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

/// Truncates to [`MAX_NAME_CHARS`] characters, then keeps only ASCII
/// letters, digits, spaces and hyphens.
pub fn sanitize_calculator_name(raw: &str) -> String {
    raw.chars()
        .take(MAX_NAME_CHARS)
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect()
}

fn required_str<'a>(body: &'a Map<String, Value>, field: &str) -> Result<&'a str, ValidationError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(ValidationError::new(format!("missing field `{field}`"))),
        Some(Value::String(s)) if s.is_empty() => {
            Err(ValidationError::new(format!("field `{field}` must not be empty")))
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ValidationError::new(format!("field `{field}` must be a string"))),
    }
}

fn required_object<'a>(
    body: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Map<String, Value>, ValidationError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(ValidationError::new(format!("missing field `{field}`"))),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ValidationError::new(format!("field `{field}` must be an object"))),
    }
}

fn optional_str(body: &Map<String, Value>, field: &str, default: &str) -> String {
    body.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().chars().take(MAX_OPTION_CHARS).collect::<String>())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
