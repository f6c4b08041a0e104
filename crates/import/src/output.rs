use std::io::Write;
use std::path::Path;

use ledgermatch_core::{ChartOfAccounts, Transaction};

use crate::input::ImportError;

const DATE_FORMAT: &str = "%m/%d/%Y";

const OUTPUT_COLUMNS: &[&str] = &[
    "Transaction Date",
    "Post Date",
    "Description",
    "Category",
    "Type",
    "Amount",
    "Memo",
    "Account Number",
    "Account Name",
    "Account Full Path",
    "Match Confidence",
    "Match Source",
    "Alternative Matches",
    "Needs Review",
];

/// Write the annotated batch as CSV: the original columns plus the match
/// results, confidence as a display percentage, and the runner-up list.
pub fn write_transactions<W: Write>(
    writer: W,
    transactions: &[Transaction],
    chart: &ChartOfAccounts,
) -> Result<(), ImportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(OUTPUT_COLUMNS)?;

    for tx in transactions {
        let (number, name, full_path) = match tx.matched_account() {
            Some(id) => {
                let account = chart.account(id);
                (
                    account.number.clone(),
                    account.name.clone(),
                    chart.full_name(id),
                )
            }
            None => (String::new(), String::new(), String::new()),
        };

        csv_writer.write_record([
            tx.transaction_date.format(DATE_FORMAT).to_string(),
            tx.post_date.format(DATE_FORMAT).to_string(),
            tx.description.clone(),
            tx.category.clone().unwrap_or_default(),
            tx.tx_type.to_string(),
            tx.amount.to_string(),
            tx.memo.clone().unwrap_or_default(),
            number,
            name,
            full_path,
            format_percent(tx.match_confidence()),
            tx.match_source().to_string(),
            format_alternatives(tx, chart),
            if tx.needs_review() { "Yes" } else { "No" }.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn write_transactions_file(
    path: impl AsRef<Path>,
    transactions: &[Transaction],
    chart: &ChartOfAccounts,
) -> Result<(), ImportError> {
    write_transactions(std::fs::File::create(path)?, transactions, chart)
}

fn format_percent(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

fn format_alternatives(tx: &Transaction, chart: &ChartOfAccounts) -> String {
    tx.alternative_matches()
        .iter()
        .map(|&(id, confidence)| {
            let account = chart.account(id);
            format!(
                "{} - {} ({})",
                account.number,
                account.name,
                format_percent(confidence)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgermatch_core::{MatchSource, Money, TransactionType};

    fn chart() -> ChartOfAccounts {
        let mut chart = ChartOfAccounts::new();
        let root = chart.add_root("6000", "Expenses");
        chart.add_child(root, "6010", "Office Supplies");
        chart.add_child(root, "6020", "Software");
        chart
    }

    fn tx(description: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap(),
            description,
            Some("Shopping"),
            TransactionType::Sale,
            Money::from_cents(-5525),
            None,
        )
    }

    fn render(transactions: &[Transaction]) -> String {
        let mut buffer = Vec::new();
        write_transactions(&mut buffer, transactions, &chart()).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn writes_header_and_original_fields() {
        let output = render(&[tx("STAPLES")]);
        let mut lines = output.lines();
        assert_eq!(lines.next().unwrap(), OUTPUT_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("04/02/2025,04/03/2025,STAPLES,Shopping,Sale,-55.25,"));
    }

    #[test]
    fn matched_transaction_includes_account_and_percentage() {
        let c = chart();
        let supplies = c.find_account("6010").unwrap();
        let mut t = tx("STAPLES");
        t.add_match(supplies, 0.925, MatchSource::Rule);
        let output = render(&[t]);
        assert!(output.contains("6010,Office Supplies,Expenses > Office Supplies,92.50%,Rule"));
        assert!(output.contains(",No\n") || output.ends_with(",No"));
    }

    #[test]
    fn unmatched_transaction_has_empty_account_fields_and_review_flag() {
        let output = render(&[tx("UNKNOWN VENDOR")]);
        assert!(output.contains(",,,,0.00%,Unknown,,Yes"));
    }

    #[test]
    fn alternatives_formatted_and_joined() {
        let c = chart();
        let supplies = c.find_account("6010").unwrap();
        let software = c.find_account("6020").unwrap();
        let mut t = tx("AMBIGUOUS");
        t.add_match(supplies, 0.90, MatchSource::Rule);
        t.add_match(software, 0.80, MatchSource::Llm);
        let output = render(&[t]);
        assert!(output.contains("6020 - Software (80.00%)"));
    }

    #[test]
    fn row_per_transaction() {
        let output = render(&[tx("A"), tx("B"), tx("C")]);
        assert_eq!(output.lines().count(), 4);
    }
}
