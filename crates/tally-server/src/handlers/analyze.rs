//! Transaction classification handler

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::debug;

use crate::{ApiJson, AppError, AppState};
use tally_core::{CategoryResult, TransactionQuery};

/// POST /analyze - Classify one transaction message
///
/// Accepts `{"description": "..."}` (or the older `{"transaction": "..."}`).
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    ApiJson(query): ApiJson<TransactionQuery>,
) -> Result<Json<CategoryResult>, AppError> {
    debug!(chars = query.description.len(), "Classifying transaction");
    let result = state.classifier.classify(&query).await?;
    Ok(Json(result))
}
