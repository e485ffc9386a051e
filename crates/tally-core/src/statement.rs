//! Bank statement import
//!
//! Reads statement exports with ICICI-style columns (`S No.`, `Value Date`,
//! `Transaction Date`, `Cheque Number`, `Transaction Remarks`,
//! `Withdrawal Amount (INR)`, `Deposit Amount (INR)`, `Balance (INR)`),
//! classifies each remark, and rolls withdrawals up into monthly summaries
//! that can be fed straight into the insight summarizer.
//!
//! Columns are located by header name, so extra or reordered columns are fine.
//! Rows whose transaction date or balance does not parse are skipped and
//! counted, matching how statement extractors emit page headers and footers
//! as stray rows.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::{debug, warn};

use crate::classifier::TransactionClassifier;
use crate::error::{Error, ErrorKind, Result};
use crate::models::{CategoryResult, MonthlyExpenseSummary, TransactionQuery};

/// One validated statement line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementRow {
    /// Serial number as printed, if the export has one
    pub serial: Option<String>,
    pub value_date: NaiveDate,
    pub transaction_date: NaiveDate,
    pub cheque_number: Option<String>,
    /// Remarks with internal whitespace collapsed
    pub remarks: String,
    pub withdrawal: f64,
    pub deposit: f64,
    pub balance: f64,
}

/// Result of reading a statement file
#[derive(Debug, Clone, Default)]
pub struct StatementImport {
    pub rows: Vec<StatementRow>,
    /// Rows dropped because a required field did not parse
    pub skipped: usize,
}

/// Column positions resolved from the header row
#[derive(Debug)]
struct Columns {
    serial: Option<usize>,
    value_date: Option<usize>,
    transaction_date: usize,
    cheque_number: Option<usize>,
    remarks: usize,
    withdrawal: usize,
    deposit: usize,
    balance: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |needle: &str| {
            headers
                .iter()
                .position(|h| h.to_lowercase().contains(needle))
        };
        let require = |needle: &str| {
            find(needle).ok_or_else(|| {
                Error::Statement(format!("missing a '{}' column in statement header", needle))
            })
        };

        Ok(Self {
            serial: find("s no"),
            value_date: find("value date"),
            transaction_date: require("transaction date")?,
            cheque_number: find("cheque"),
            remarks: require("remarks")?,
            withdrawal: require("withdrawal")?,
            deposit: require("deposit")?,
            balance: require("balance")?,
        })
    }
}

/// Parse a statement CSV export
pub fn parse_statement_csv<R: Read>(reader: R) -> Result<StatementImport> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut import = StatementImport::default();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        match parse_row(&columns, &record) {
            Some(row) => import.rows.push(row),
            None => {
                warn!(line = line + 2, "Skipping statement row: {:?}", record);
                import.skipped += 1;
            }
        }
    }

    debug!(
        rows = import.rows.len(),
        skipped = import.skipped,
        "Parsed statement"
    );
    Ok(import)
}

fn parse_row(columns: &Columns, record: &StringRecord) -> Option<StatementRow> {
    let field = |idx: usize| record.get(idx).unwrap_or("");
    let optional = |idx: Option<usize>| {
        idx.map(field)
            .filter(|s| !s.is_empty() && *s != "-")
            .map(str::to_string)
    };

    let transaction_date = parse_date(field(columns.transaction_date))?;
    let balance = parse_amount(field(columns.balance))?;
    let value_date = columns
        .value_date
        .and_then(|idx| parse_date(field(idx)))
        .unwrap_or(transaction_date);

    let remarks = field(columns.remarks)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Some(StatementRow {
        serial: optional(columns.serial),
        value_date,
        transaction_date,
        cheque_number: optional(columns.cheque_number),
        remarks,
        withdrawal: parse_optional_amount(field(columns.withdrawal))?,
        deposit: parse_optional_amount(field(columns.deposit))?,
        balance,
    })
}

/// Statement dates are DD/MM/YYYY; re-exported files may use ISO dates
fn parse_date(s: &str) -> Option<NaiveDate> {
    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

/// Parse an amount, handling currency markers and thousands separators
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned = s
        .trim()
        .trim_start_matches("INR")
        .trim_start_matches("Rs.")
        .replace(['₹', ',', ' '], "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Blank and "-" mean zero in the withdrawal/deposit columns
fn parse_optional_amount(s: &str) -> Option<f64> {
    match s.trim() {
        "" | "-" => Some(0.0),
        other => parse_amount(other),
    }
}

/// A statement row with its classification
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRow {
    pub row: StatementRow,
    /// `None` when the remark could not be classified
    pub result: Option<CategoryResult>,
}

/// Classify every row's remarks, one model call per row
///
/// Per-row failures are logged and leave `result` empty. A credential
/// failure aborts the run, since every remaining row would fail the same way.
pub async fn classify_rows(
    classifier: &TransactionClassifier,
    rows: Vec<StatementRow>,
) -> Result<Vec<ClassifiedRow>> {
    let mut classified = Vec::with_capacity(rows.len());

    for row in rows {
        let result = match classifier
            .classify(&TransactionQuery::new(row.remarks.as_str()))
            .await
        {
            Ok(result) => Some(result),
            Err(err) if err.kind() == ErrorKind::UpstreamAuthFailure => return Err(err),
            Err(err) => {
                warn!(remarks = %row.remarks, error = %err, "Could not classify statement row");
                None
            }
        };
        classified.push(ClassifiedRow { row, result });
    }

    Ok(classified)
}

/// Roll classified withdrawals up into per-month category totals
///
/// Only rows the model flagged as real transactions with a non-zero
/// withdrawal count. Months come back oldest first.
pub fn monthly_summaries(rows: &[ClassifiedRow]) -> Vec<MonthlyExpenseSummary> {
    let mut months: BTreeMap<(i32, u32), BTreeMap<String, f64>> = BTreeMap::new();

    for classified in rows {
        let Some(result) = classified.result.as_ref().filter(|r| r.transaction) else {
            continue;
        };
        if classified.row.withdrawal <= 0.0 {
            continue;
        }

        let date = classified.row.transaction_date;
        *months
            .entry((date.year(), date.month()))
            .or_default()
            .entry(result.category.clone())
            .or_insert(0.0) += classified.row.withdrawal;
    }

    months
        .into_iter()
        .map(|((year, month), categories)| {
            let mut summary = MonthlyExpenseSummary {
                year,
                month,
                month_name: String::new(),
                total_amount: categories.values().sum(),
                categories,
            };
            if let Some(name) = summary.canonical_month_name() {
                summary.month_name = name.to_string();
            }
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockBackend, ModelClient};
    use crate::prompts::PromptLibrary;
    use crate::taxonomy::CategoryTaxonomy;
    use std::sync::{Arc, RwLock};

    const STATEMENT: &str = "\
S No.,Value Date,Transaction Date,Cheque Number,Transaction Remarks,Withdrawal Amount (INR),Deposit Amount (INR),Balance (INR)
1,02/01/2024,02/01/2024,-,UPI/ZOMATO/payment   debited,425.50,0.0,\"12,574.50\"
2,05/01/2024,05/01/2024,-,NEFT salary credited,,\"50,000.00\",\"62,574.50\"
Page 1 of 3,,,,,,,
3,03/02/2024,03/02/2024,000123,Amazon purchase debited,\"1,299.00\",-,\"61,275.50\"
";

    fn classifier(mock: MockBackend) -> TransactionClassifier {
        TransactionClassifier::new(
            ModelClient::Mock(mock),
            CategoryTaxonomy::embedded().unwrap(),
            Arc::new(RwLock::new(PromptLibrary::embedded_only())),
        )
    }

    fn row(date: (i32, u32, u32), withdrawal: f64) -> StatementRow {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        StatementRow {
            serial: None,
            value_date: date,
            transaction_date: date,
            cheque_number: None,
            remarks: "test".into(),
            withdrawal,
            deposit: 0.0,
            balance: 0.0,
        }
    }

    fn classified(row: StatementRow, category: &str, transaction: bool) -> ClassifiedRow {
        ClassifiedRow {
            row,
            result: Some(CategoryResult {
                category: category.into(),
                merchant: None,
                transaction,
            }),
        }
    }

    #[test]
    fn test_parse_statement() {
        let import = parse_statement_csv(STATEMENT.as_bytes()).unwrap();
        assert_eq!(import.rows.len(), 3);
        assert_eq!(import.skipped, 1);

        let first = &import.rows[0];
        assert_eq!(first.serial.as_deref(), Some("1"));
        assert_eq!(
            first.transaction_date,
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert_eq!(first.remarks, "UPI/ZOMATO/payment debited");
        assert_eq!(first.withdrawal, 425.50);
        assert_eq!(first.balance, 12574.50);
        assert_eq!(first.cheque_number, None);

        assert_eq!(import.rows[1].withdrawal, 0.0);
        assert_eq!(import.rows[1].deposit, 50000.0);
        assert_eq!(import.rows[2].deposit, 0.0);
        assert_eq!(import.rows[2].cheque_number.as_deref(), Some("000123"));
    }

    #[test]
    fn test_parse_reordered_iso_columns() {
        let csv = "\
Transaction Remarks,Balance (INR),Transaction Date,Deposit Amount (INR),Withdrawal Amount (INR)
Swiggy order debited,900.00,2024-03-09,0,100.00
";
        let import = parse_statement_csv(csv.as_bytes()).unwrap();
        assert_eq!(import.rows.len(), 1);
        let row = &import.rows[0];
        assert_eq!(row.value_date, row.transaction_date);
        assert_eq!(row.withdrawal, 100.0);
        assert_eq!(row.serial, None);
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "Date,Description,Amount\n01/01/2024,Coffee,3.50\n";
        let err = parse_statement_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Statement(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("₹ 99.00"), Some(99.0));
        assert_eq!(parse_amount("Rs.50"), Some(50.0));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_optional_amount("-"), Some(0.0));
        assert_eq!(parse_optional_amount("abc"), None);
    }

    #[test]
    fn test_monthly_summaries() {
        let rows = vec![
            classified(row((2024, 2, 3), 1299.0), "Shopping", true),
            classified(row((2024, 1, 2), 425.5), "Food & Drinks", true),
            classified(row((2024, 1, 9), 74.5), "Food & Drinks", true),
            // Informational and deposit-only rows do not count
            classified(row((2024, 1, 10), 500.0), "Miscellaneous", false),
            classified(row((2024, 1, 11), 0.0), "Income", true),
            ClassifiedRow {
                row: row((2024, 1, 12), 80.0),
                result: None,
            },
        ];

        let months = monthly_summaries(&rows);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].period(), (2024, 1));
        assert_eq!(months[0].month_name, "January");
        assert_eq!(months[0].total_amount, 500.0);
        assert_eq!(months[0].categories.len(), 1);
        assert_eq!(months[0].categories["Food & Drinks"], 500.0);
        assert_eq!(months[1].categories["Shopping"], 1299.0);
        assert!(months.iter().all(|m| m.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_classify_rows_with_mock() {
        let mock = MockBackend::new();
        let import = parse_statement_csv(STATEMENT.as_bytes()).unwrap();
        let rows = classify_rows(&classifier(mock.clone()), import.rows)
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(mock.call_count(), 3);
        assert!(rows.iter().all(|r| r.result.is_some()));
    }

    #[tokio::test]
    async fn test_classify_rows_skips_blank_remarks() {
        let mock = MockBackend::new();
        let mut blank = row((2024, 1, 1), 10.0);
        blank.remarks = String::new();

        let rows = classify_rows(&classifier(mock.clone()), vec![blank])
            .await
            .unwrap();
        assert!(rows[0].result.is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_classify_rows_stops_on_auth_failure() {
        let mock = MockBackend::failing(ErrorKind::UpstreamAuthFailure);
        let err = classify_rows(
            &classifier(mock.clone()),
            vec![row((2024, 1, 1), 10.0), row((2024, 1, 2), 20.0)],
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamAuthFailure);
        assert_eq!(mock.call_count(), 1);
    }
}
