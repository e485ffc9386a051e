//! Monthly spending insight handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::{ApiJson, AppError, AppState};
use tally_core::{InsightResult, MonthlyExpenseSummary};

/// POST /analyze_insights - Compare one to three months of spending
///
/// Months may arrive in any order; they are analyzed oldest first.
pub async fn analyze_insights(
    State(state): State<Arc<AppState>>,
    ApiJson(months): ApiJson<Vec<MonthlyExpenseSummary>>,
) -> Result<Json<InsightResult>, AppError> {
    let result = state.summarizer.summarize(months).await?;
    Ok(Json(result))
}
