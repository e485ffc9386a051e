//! Expense insight summarizer
//!
//! Takes one to three monthly expense summaries, puts them in calendar
//! order, and asks the model for a short comparison plus suggestions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::ai::parsing::normalize_insight;
use crate::ai::{GenerationRequest, ModelBackend, ModelClient, OutputSchema};
use crate::error::{Error, Result};
use crate::models::{InsightResult, MonthlyExpenseSummary, MAX_INSIGHT_MONTHS};
use crate::prompts::{PromptId, PromptLibrary};

/// Validate, deduplicate-check, and sort monthly summaries
///
/// The returned entries are in ascending (year, month) order with
/// `month_name` replaced by the English name for `month`.
pub fn prepare_months(
    mut months: Vec<MonthlyExpenseSummary>,
) -> Result<Vec<MonthlyExpenseSummary>> {
    if months.is_empty() {
        return Err(Error::InvalidInput(
            "at least one monthly summary is required".into(),
        ));
    }
    if months.len() > MAX_INSIGHT_MONTHS {
        return Err(Error::InvalidInput(format!(
            "at most {} monthly summaries are accepted, got {}",
            MAX_INSIGHT_MONTHS,
            months.len()
        )));
    }

    let mut seen = HashSet::with_capacity(months.len());
    for month in &months {
        month.validate()?;
        if !seen.insert(month.period()) {
            return Err(Error::InvalidInput(format!(
                "duplicate entry for {}-{:02}",
                month.year, month.month
            )));
        }
    }

    months.sort_by_key(MonthlyExpenseSummary::period);
    for month in &mut months {
        if let Some(name) = month.canonical_month_name() {
            month.month_name = name.to_string();
        }
    }

    Ok(months)
}

/// Summarizes monthly spending through a [`ModelClient`]
#[derive(Clone)]
pub struct InsightSummarizer {
    client: ModelClient,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl InsightSummarizer {
    pub fn new(client: ModelClient, prompts: Arc<RwLock<PromptLibrary>>) -> Self {
        Self { client, prompts }
    }

    /// Assemble the generation request for already prepared months
    pub fn build_request(&self, months: &[MonthlyExpenseSummary]) -> Result<GenerationRequest> {
        let months_json = serde_json::to_string_pretty(months)?;
        let month_count = months.len().to_string();

        let mut vars = HashMap::new();
        vars.insert("months_json", months_json.as_str());
        vars.insert("month_count", month_count.as_str());

        let rendered = self
            .prompts
            .write()
            .map_err(|_| Error::Config("prompt library lock poisoned".into()))?
            .render(PromptId::AnalyzeInsights, &vars)?;

        Ok(GenerationRequest {
            system: rendered.system,
            user: rendered.user,
            schema: OutputSchema::Insight,
        })
    }

    /// Compare the given months and suggest improvements
    pub async fn summarize(&self, months: Vec<MonthlyExpenseSummary>) -> Result<InsightResult> {
        let months = prepare_months(months)?;
        let request = self.build_request(&months)?;

        let value = self.client.generate_json(&request).await?;
        let result = normalize_insight(&value)?;

        debug!(
            months = months.len(),
            suggestions = result.suggestions.len(),
            "Generated spending insight"
        );
        Ok(result)
    }
}
