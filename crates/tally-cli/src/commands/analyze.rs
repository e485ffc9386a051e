//! One-shot classification and insight commands
//!
//! These run the same pipeline as `POST /analyze` and
//! `POST /analyze_insights` without starting the server.

use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tally_core::{
    CategoryTaxonomy, InsightSummarizer, ModelClient, MonthlyExpenseSummary, PromptLibrary,
    TransactionClassifier, TransactionQuery,
};

use super::truncate;

/// Classify one message and print the result
pub async fn cmd_classify(client: ModelClient, text: &str, json: bool) -> Result<()> {
    let taxonomy = CategoryTaxonomy::load().context("Failed to load category taxonomy")?;
    let prompts = Arc::new(RwLock::new(PromptLibrary::new()));
    let classifier = TransactionClassifier::new(client, taxonomy, prompts);

    let result = classifier.classify(&TransactionQuery::new(text)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("🔍 {}", truncate(text.trim(), 70));
    println!();
    println!("   Category:    {}", result.category);
    println!(
        "   Merchant:    {}",
        result.merchant.as_deref().unwrap_or("(none)")
    );
    println!(
        "   Transaction: {}",
        if result.transaction {
            "yes"
        } else {
            "no (informational)"
        }
    );
    if !classifier.taxonomy().contains(&result.category) {
        println!();
        println!(
            "   ⚠️  '{}' is not in taxonomy v{}",
            result.category,
            classifier.taxonomy().version
        );
    }

    Ok(())
}

/// Read monthly summaries from a JSON file
pub fn read_months(path: &Path) -> Result<Vec<MonthlyExpenseSummary>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| {
        format!(
            "{} must contain a JSON array of monthly summaries",
            path.display()
        )
    })
}

/// Summarize monthly spending from a file and print the result
pub async fn cmd_insights(client: ModelClient, file: &Path, json: bool) -> Result<()> {
    let months = read_months(file)?;
    let summarizer = InsightSummarizer::new(client, Arc::new(RwLock::new(PromptLibrary::new())));

    let result = summarizer.summarize(months).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("📊 Spending summary\n");
    println!("{}", result.monthly_summary);
    println!();
    println!("💡 Suggestions:");
    for (i, suggestion) in result.suggestions.iter().enumerate() {
        println!("   {}. {}", i + 1, suggestion);
    }

    Ok(())
}
