use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use ledgermatch_core::{Money, Transaction, TransactionType};

/// Card exports in the wild use US-style dates; everything else is fallback.
const PRIMARY_DATE_FORMAT: &str = "%m/%d/%Y";
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y"];

const REQUIRED_COLUMNS: &[&str] = &[
    "Transaction Date",
    "Post Date",
    "Description",
    "Type",
    "Amount",
];
const OPTIONAL_COLUMNS: &[&str] = &["Category", "Memo"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required columns: {0}")]
    MissingColumns(String),
}

struct ColumnIndex {
    transaction_date: usize,
    post_date: usize,
    description: usize,
    tx_type: usize,
    amount: usize,
    category: Option<usize>,
    memo: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, ImportError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&name| find(name).is_none())
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing.join(", ")));
        }

        for &name in OPTIONAL_COLUMNS {
            if find(name).is_none() {
                tracing::warn!(column = name, "optional column missing from input");
            }
        }

        let required = |name: &str| {
            find(name).ok_or_else(|| ImportError::MissingColumns(name.to_string()))
        };
        Ok(ColumnIndex {
            transaction_date: required("Transaction Date")?,
            post_date: required("Post Date")?,
            description: required("Description")?,
            tx_type: required("Type")?,
            amount: required("Amount")?,
            category: find("Category"),
            memo: find("Memo"),
        })
    }
}

/// Read a transaction batch from CSV. Rows that fail to convert (bad date,
/// non-numeric amount) are skipped with a warning; the batch continues.
pub fn read_transactions<R: Read>(data: R) -> Result<Vec<Transaction>, ImportError> {
    let mut reader = csv::Reader::from_reader(data);
    let columns = ColumnIndex::from_headers(reader.headers()?)?;

    let mut transactions = Vec::new();
    for result in reader.records() {
        let record = result?;
        match parse_row(&columns, &record) {
            Ok(tx) => transactions.push(tx),
            Err(reason) => {
                let line = record.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!(line, %reason, "skipping invalid row");
            }
        }
    }
    tracing::info!(count = transactions.len(), "read transaction batch");
    Ok(transactions)
}

pub fn read_transactions_file(path: impl AsRef<Path>) -> Result<Vec<Transaction>, ImportError> {
    read_transactions(std::fs::File::open(path)?)
}

fn parse_row(columns: &ColumnIndex, record: &csv::StringRecord) -> Result<Transaction, String> {
    let field = |idx: usize| record.get(idx).unwrap_or_default().trim();

    let transaction_date = parse_date(field(columns.transaction_date))?;
    let post_date = parse_date(field(columns.post_date))?;
    let description = field(columns.description);
    if description.is_empty() {
        return Err("empty description".to_string());
    }
    let tx_type = TransactionType::from(field(columns.tx_type));
    let amount: Money = field(columns.amount)
        .parse()
        .map_err(|e| format!("{e}"))?;

    let optional = |idx: Option<usize>| {
        idx.and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    Ok(Transaction::new(
        transaction_date,
        post_date,
        description,
        optional(columns.category),
        tx_type,
        amount,
        optional(columns.memo),
    ))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, PRIMARY_DATE_FORMAT) {
        return Ok(date);
    }
    for fmt in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(format!("invalid date: {s}"))
}
