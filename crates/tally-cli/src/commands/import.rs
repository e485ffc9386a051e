//! Statement import command
//!
//! Classifies every row of a bank statement CSV and optionally writes the
//! latest months as summaries ready for `tally insights --file`.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use tally_core::{
    classify_rows, monthly_summaries, parse_statement_csv, CategoryTaxonomy, ModelClient,
    PromptLibrary, TransactionClassifier, MAX_INSIGHT_MONTHS,
};

use super::truncate;

pub async fn cmd_import(
    client: ModelClient,
    file: &Path,
    limit: Option<usize>,
    json: bool,
    summary_out: Option<&Path>,
) -> Result<()> {
    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let mut import = parse_statement_csv(reader)
        .with_context(|| format!("Failed to read statement {}", file.display()))?;

    if let Some(limit) = limit {
        import.rows.truncate(limit);
    }

    if !json {
        println!("📥 Importing statement: {}", file.display());
        println!("   Rows: {}", import.rows.len());
        if import.skipped > 0 {
            println!("   Skipped: {} (unparseable date or balance)", import.skipped);
        }
        println!();
    }

    let taxonomy = CategoryTaxonomy::load().context("Failed to load category taxonomy")?;
    let classifier =
        TransactionClassifier::new(client, taxonomy, Arc::new(RwLock::new(PromptLibrary::new())));
    let rows = classify_rows(&classifier, import.rows).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!(
            "{:<10} {:>12}  {:<20}  {:<16}  {}",
            "DATE", "WITHDRAWAL", "CATEGORY", "MERCHANT", "REMARKS"
        );
        println!("{}", "-".repeat(90));

        for classified in &rows {
            let (category, merchant) = match &classified.result {
                Some(r) if r.transaction => (
                    r.category.as_str(),
                    r.merchant.as_deref().unwrap_or("-"),
                ),
                Some(_) => ("(info)", "-"),
                None => ("(failed)", "-"),
            };
            println!(
                "{:<10} {:>12.2}  {:<20}  {:<16}  {}",
                classified.row.transaction_date.format("%Y-%m-%d").to_string(),
                classified.row.withdrawal,
                truncate(category, 20),
                truncate(merchant, 16),
                truncate(&classified.row.remarks, 40)
            );
        }

        let failed = rows.iter().filter(|r| r.result.is_none()).count();
        if failed > 0 {
            println!();
            println!("⚠️  {} row(s) could not be classified", failed);
        }
    }

    if let Some(path) = summary_out {
        let mut months = monthly_summaries(&rows);
        let keep_from = months.len().saturating_sub(MAX_INSIGHT_MONTHS);
        let months = months.split_off(keep_from);

        std::fs::write(path, serde_json::to_string_pretty(&months)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !json {
            println!();
            println!(
                "📊 Wrote {} monthly summar{} to {}",
                months.len(),
                if months.len() == 1 { "y" } else { "ies" },
                path.display()
            );
            println!("   Run: tally insights --file {}", path.display());
        }
    }

    Ok(())
}
