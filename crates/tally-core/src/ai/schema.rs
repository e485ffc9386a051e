//! Output schemas requested from the model
//!
//! Both backends ask the provider for JSON-mode output constrained to one of
//! these schemas. The schemas are written in plain JSON Schema; Gemini wants
//! its OpenAPI subset, which [`OutputSchema::gemini_schema`] derives.

use serde_json::{json, Map, Value};

/// Which structured result a generation call must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSchema {
    /// `{category, merchant, transaction}`
    Classification,
    /// `{monthly_summary, suggestions}`
    Insight,
}

impl OutputSchema {
    /// Schema name, matches the `schema` key in prompt frontmatter
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classification => "category_result",
            Self::Insight => "insight_result",
        }
    }

    /// JSON Schema for OpenAI-style `response_format`
    pub fn json_schema(&self) -> Value {
        match self {
            Self::Classification => json!({
                "type": "object",
                "properties": {
                    "category": { "type": "string" },
                    "merchant": { "type": "string" },
                    "transaction": { "type": "boolean" }
                },
                "required": ["category", "merchant", "transaction"],
                "additionalProperties": false
            }),
            Self::Insight => json!({
                "type": "object",
                "properties": {
                    "monthly_summary": { "type": "string" },
                    "suggestions": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                },
                "required": ["monthly_summary", "suggestions"],
                "additionalProperties": false
            }),
        }
    }

    /// Same schema in Gemini's `responseSchema` dialect
    ///
    /// Type names are upper-cased and `additionalProperties` is dropped,
    /// since the Generative Language API rejects it.
    pub fn gemini_schema(&self) -> Value {
        to_gemini(self.json_schema())
    }
}

fn to_gemini(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                match (key.as_str(), inner) {
                    ("additionalProperties", _) => {}
                    ("type", Value::String(t)) => {
                        out.insert(key, Value::String(t.to_ascii_uppercase()));
                    }
                    (_, inner) => {
                        out.insert(key, to_gemini(inner));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(to_gemini).collect()),
        other => other,
    }
}
