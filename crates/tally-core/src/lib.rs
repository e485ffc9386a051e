//! Tally Core Library
//!
//! Shared functionality for the Tally expense service:
//! - Request/response models and input validation
//! - Category taxonomy (versioned, overridable)
//! - Model settings with retry policy
//! - Prompt library for customizable model prompts
//! - Model invocation adapter (Gemini, OpenAI-compatible, mock)
//! - Transaction classifier and expense insight summarizer
//! - Bank statement import (CSV) with per-row classification

pub mod ai;
pub mod classifier;
pub mod error;
pub mod insights;
pub mod models;
pub mod prompts;
pub mod settings;
pub mod statement;
pub mod taxonomy;

/// Test utilities including mock Gemini server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    GeminiBackend, GenerationRequest, MockBackend, ModelBackend, ModelClient,
    OpenAICompatibleBackend, OutputSchema, RetryPolicy,
};
pub use classifier::TransactionClassifier;
pub use error::{Error, ErrorKind, Result};
pub use insights::{prepare_months, InsightSummarizer};
pub use models::{
    CategoryResult, InsightResult, MonthlyExpenseSummary, TransactionQuery, MAX_INSIGHT_MONTHS,
    MAX_SUGGESTIONS,
};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary, RenderedPrompt};
pub use settings::ModelSettings;
pub use statement::{
    classify_rows, monthly_summaries, parse_statement_csv, ClassifiedRow, StatementImport,
    StatementRow,
};
pub use taxonomy::CategoryTaxonomy;
