//! Domain models for Tally
//!
//! Request and response shapes shared by the classifier, the insight
//! summarizer, the HTTP server, and the CLI. Nothing here is persisted.

use std::collections::BTreeMap;

use chrono::Month;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum number of months accepted in one insight request
pub const MAX_INSIGHT_MONTHS: usize = 3;

/// Maximum number of suggestions returned with an insight
pub const MAX_SUGGESTIONS: usize = 3;

/// A raw transaction message to classify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// Raw bank text, e.g. an SMS debit alert.
    /// Older clients send this field as `transaction`.
    #[serde(alias = "transaction")]
    pub description: String,
}

impl TransactionQuery {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Trimmed description, or `InvalidInput` if nothing is left
    pub fn validated(&self) -> Result<&str> {
        let trimmed = self.description.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }
}

/// Classification of a single transaction message
///
/// This is the one canonical response shape. Model output using the legacy
/// `Merchant` / `Transaction` / `status` fields is normalized into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    /// Category label from the configured taxonomy (not enforced)
    pub category: String,
    /// Merchant name, or null when none could be identified
    pub merchant: Option<String>,
    /// True for real money movement, false for informational messages
    pub transaction: bool,
}

/// One month of aggregated spending supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyExpenseSummary {
    pub year: i32,
    /// Calendar month, 1-12
    pub month: u32,
    #[serde(default)]
    pub month_name: String,
    pub total_amount: f64,
    /// Spend per category label; labels differ from month to month
    #[serde(default)]
    pub categories: BTreeMap<String, f64>,
}

impl MonthlyExpenseSummary {
    /// Sort key for chronological ordering
    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    /// English month name derived from `month`, ignoring the caller's label
    pub fn canonical_month_name(&self) -> Option<&'static str> {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name())
    }

    /// Check the structural invariants of a single entry
    pub fn validate(&self) -> Result<()> {
        if self.canonical_month_name().is_none() {
            return Err(Error::InvalidInput(format!(
                "month must be between 1 and 12, got {}",
                self.month
            )));
        }

        check_amount(self.total_amount, || {
            format!("total_amount for {}-{:02}", self.year, self.month)
        })?;

        for (label, amount) in &self.categories {
            if label.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "empty category label in {}-{:02}",
                    self.year, self.month
                )));
            }
            check_amount(*amount, || {
                format!("category '{}' in {}-{:02}", label, self.year, self.month)
            })?;
        }

        Ok(())
    }
}

fn check_amount(value: f64, what: impl FnOnce() -> String) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} must be a non-negative number",
            what()
        )));
    }
    Ok(())
}

/// Narrative comparison of the supplied months
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightResult {
    pub monthly_summary: String,
    pub suggestions: Vec<String>,
}
