//! JSON parsing helpers for model responses
//!
//! Providers in JSON mode usually return a bare object, but some wrap it in a
//! markdown fence or add a sentence around it. These helpers pull the object
//! out and map the field and value variants seen in practice onto the
//! canonical result types.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{CategoryResult, InsightResult, MAX_SUGGESTIONS};

/// Decode the model's text output into a JSON object
pub fn parse_json_object(response: &str) -> Result<Value> {
    let response = response.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(response) {
        return Ok(value);
    }

    // Look for an embedded JSON object
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::MalformedResponse(format!(
                    "invalid JSON from model: {} | Raw: {}",
                    e,
                    truncate(json_str)
                ))
            })
        }
        _ => Err(Error::MalformedResponse(format!(
            "no JSON object in model response | Raw: {}",
            truncate(response)
        ))),
    }
}

/// Map a decoded classification onto [`CategoryResult`]
pub fn normalize_classification(value: &Value) -> Result<CategoryResult> {
    let obj = as_object(value)?;

    let category = match field(obj, &["category"]) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => {
            return Err(Error::SchemaMismatch("category is empty".into()));
        }
        Some(other) => {
            return Err(Error::SchemaMismatch(format!(
                "category must be a string, got {}",
                type_name(other)
            )));
        }
        None => return Err(Error::SchemaMismatch("missing field 'category'".into())),
    };

    let merchant = match field(obj, &["merchant"]) {
        Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() || ["none", "null", "n/a"].iter().any(|n| s.eq_ignore_ascii_case(n)) {
                None
            } else {
                Some(s.to_string())
            }
        }
        Some(other) => {
            return Err(Error::SchemaMismatch(format!(
                "merchant must be a string or null, got {}",
                type_name(other)
            )));
        }
        None => return Err(Error::SchemaMismatch("missing field 'merchant'".into())),
    };

    let transaction = match field(obj, &["transaction", "status"]) {
        Some(v) => transaction_flag(v)?,
        None => return Err(Error::SchemaMismatch("missing field 'transaction'".into())),
    };

    Ok(CategoryResult {
        category,
        merchant,
        transaction,
    })
}

/// Map a decoded insight onto [`InsightResult`]
///
/// Blank suggestions are dropped and at most [`MAX_SUGGESTIONS`] are kept.
pub fn normalize_insight(value: &Value) -> Result<InsightResult> {
    let obj = as_object(value)?;

    let monthly_summary = match field(obj, &["monthly_summary", "summary"]) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) => {
            return Err(Error::SchemaMismatch("monthly_summary is empty".into()));
        }
        Some(other) => {
            return Err(Error::SchemaMismatch(format!(
                "monthly_summary must be a string, got {}",
                type_name(other)
            )));
        }
        None => {
            return Err(Error::SchemaMismatch(
                "missing field 'monthly_summary'".into(),
            ));
        }
    };

    let raw = match field(obj, &["suggestions"]) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(Error::SchemaMismatch(format!(
                "suggestions must be an array, got {}",
                type_name(other)
            )));
        }
        None => return Err(Error::SchemaMismatch("missing field 'suggestions'".into())),
    };

    let mut suggestions = Vec::with_capacity(MAX_SUGGESTIONS);
    for item in raw {
        let text = item.as_str().ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "suggestions must contain strings, got {}",
                type_name(item)
            ))
        })?;
        let text = text.trim();
        if !text.is_empty() && suggestions.len() < MAX_SUGGESTIONS {
            suggestions.push(text.to_string());
        }
    }

    if suggestions.is_empty() {
        return Err(Error::SchemaMismatch("no suggestions returned".into()));
    }

    Ok(InsightResult {
        monthly_summary,
        suggestions,
    })
}

fn as_object(value: &Value) -> Result<&Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::SchemaMismatch(format!("expected a JSON object, got {}", type_name(value)))
    })
}

/// Look up the first present key, exact match before case-insensitive
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| obj.get(*name))
        .or_else(|| {
            names.iter().find_map(|name| {
                obj.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
        })
}

fn transaction_flag(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "debit" | "credit" | "purchase" | "transaction" => Ok(true),
            "false" | "no" | "info" | "informational" | "promotional" | "none" => Ok(false),
            other => Err(Error::SchemaMismatch(format!(
                "unrecognized transaction flag '{}'",
                other
            ))),
        },
        other => Err(Error::SchemaMismatch(format!(
            "transaction must be a boolean, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    const LIMIT: usize = 200;
    if s.chars().count() > LIMIT {
        format!("{}...", s.chars().take(LIMIT).collect::<String>())
    } else {
        s.to_string()
    }
}
