//! Mock backend for testing
//!
//! Produces deterministic, schema-shaped output without any network access.
//! Useful for unit tests, handler tests, and offline development
//! (`TALLY_BACKEND=mock`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, ErrorKind, Result};

use super::{GenerationRequest, ModelBackend, OutputSchema};

/// Mock model backend
///
/// Clones share one call counter so tests can assert how often the
/// upstream would have been hit.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Fail every call with this kind instead of answering
    pub fail_with: Option<ErrorKind>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            fail_with: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// A backend whose every call fails with `kind`
    pub fn failing(kind: ErrorKind) -> Self {
        Self {
            fail_with: Some(kind),
            ..Self::new()
        }
    }

    /// Number of generation calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn simulated_error(kind: ErrorKind) -> Error {
    match kind {
        ErrorKind::InvalidInput => Error::InvalidInput("mock rejected input".into()),
        ErrorKind::UpstreamUnavailable => {
            Error::UpstreamUnavailable("mock transport failure".into())
        }
        ErrorKind::UpstreamAuthFailure => Error::UpstreamAuth("mock credential rejected".into()),
        ErrorKind::UpstreamMalformedResponse => {
            Error::MalformedResponse("mock returned non-JSON text".into())
        }
        ErrorKind::Internal => Error::Config("mock internal failure".into()),
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn generate_json(&self, request: &GenerationRequest) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = self.fail_with {
            return Err(simulated_error(kind));
        }

        Ok(match request.schema {
            OutputSchema::Classification => classify_mock(&request.user),
            OutputSchema::Insight => insight_mock(&request.user),
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }

    fn credential_configured(&self) -> bool {
        true
    }
}

/// Keyword rules standing in for the model
fn classify_mock(text: &str) -> Value {
    let t = text.to_lowercase();

    let moves_money = ["debited", "credited", "spent", "paid", "purchase", "sent rs"]
        .iter()
        .any(|k| t.contains(k));
    let informational = ["otp", "available balance", "offer", "cashback offer", "reminder"]
        .iter()
        .any(|k| t.contains(k));

    if !moves_money || (informational && !t.contains("debited") && !t.contains("credited")) {
        return json!({
            "category": "Miscellaneous",
            "merchant": "NONE",
            "transaction": false
        });
    }

    let (merchant, category) = if t.contains("zomato") {
        ("Zomato", "Food & Drinks")
    } else if t.contains("swiggy") {
        ("Swiggy", "Food & Drinks")
    } else if t.contains("amazon") {
        ("Amazon", "Shopping")
    } else if t.contains("flipkart") {
        ("Flipkart", "Shopping")
    } else if t.contains("uber") {
        ("Uber", "Travel & Transport")
    } else if t.contains("irctc") {
        ("IRCTC", "Travel & Transport")
    } else if t.contains("netflix") {
        ("Netflix", "Entertainment")
    } else if t.contains("bigbasket") {
        ("BigBasket", "Groceries")
    } else if t.contains("salary") {
        ("NONE", "Income")
    } else {
        ("NONE", "Miscellaneous")
    };

    json!({
        "category": category,
        "merchant": merchant,
        "transaction": true
    })
}

/// Summarize the months embedded in the user turn
///
/// The insight prompt carries the months as a JSON array; anything that
/// does not parse yields a generic answer.
fn insight_mock(text: &str) -> Value {
    let totals: Vec<(String, f64)> = text
        .find('[')
        .zip(text.rfind(']'))
        .and_then(|(s, e)| serde_json::from_str::<Vec<Value>>(&text[s..=e]).ok())
        .map(|months| {
            months
                .iter()
                .map(|m| {
                    let label = format!(
                        "{} {}",
                        m["month_name"].as_str().unwrap_or("?"),
                        m["year"].as_i64().unwrap_or_default()
                    );
                    (label, m["total_amount"].as_f64().unwrap_or_default())
                })
                .collect()
        })
        .unwrap_or_default();

    let summary = match (totals.first(), totals.last()) {
        (Some((first_label, first)), Some((last_label, last))) if totals.len() > 1 => {
            let direction = if last < first {
                "decreased"
            } else if last > first {
                "increased"
            } else {
                "stayed flat"
            };
            let change = if *first > 0.0 {
                (last - first) / first * 100.0
            } else {
                0.0
            };
            format!(
                "Total spending {} from {:.2} in {} to {:.2} in {} ({:+.1}%).",
                direction, first, first_label, last, last_label, change
            )
        }
        (Some((label, total)), _) => format!("Total spending in {} was {:.2}.", label, total),
        _ => "No monthly data was provided.".to_string(),
    };

    json!({
        "monthly_summary": summary,
        "suggestions": [
            "Set a monthly budget for your largest category.",
            "Review recurring payments and cancel unused subscriptions."
        ]
    })
}
