use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use ledgermatch_core::{AccountId, ChartOfAccounts};

use crate::StoreError;

/// Wire format: `{"chartOfAccounts": [{number, name, children: [...]}]}`.
#[derive(Debug, Serialize, Deserialize)]
struct ChartDocument {
    #[serde(rename = "chartOfAccounts")]
    chart_of_accounts: Vec<AccountRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccountRecord {
    number: String,
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<AccountRecord>,
}

/// Loads and saves the chart of accounts as nested JSON.
pub struct ChartStore {
    path: PathBuf,
}

impl ChartStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        ChartStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<ChartOfAccounts, StoreError> {
        let content = std::fs::read_to_string(&self.path)?;
        let document: ChartDocument = serde_json::from_str(&content)?;

        let mut chart = ChartOfAccounts::new();
        for record in &document.chart_of_accounts {
            let root = chart.add_root(&record.number, &record.name);
            add_children(&mut chart, root, &record.children);
        }
        tracing::info!(
            path = %self.path.display(),
            accounts = chart.len(),
            "loaded chart of accounts"
        );
        Ok(chart)
    }

    pub fn save(&self, chart: &ChartOfAccounts) -> Result<(), StoreError> {
        let document = ChartDocument {
            chart_of_accounts: chart.roots().iter().map(|&id| to_record(chart, id)).collect(),
        };
        std::fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }
}

fn add_children(chart: &mut ChartOfAccounts, parent: AccountId, records: &[AccountRecord]) {
    for record in records {
        let child = chart.add_child(parent, &record.number, &record.name);
        add_children(chart, child, &record.children);
    }
}

fn to_record(chart: &ChartOfAccounts, id: AccountId) -> AccountRecord {
    let account = chart.account(id);
    AccountRecord {
        number: account.number.clone(),
        name: account.name.clone(),
        children: account
            .children()
            .iter()
            .map(|&child| to_record(chart, child))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chartOfAccounts": [
            {
                "number": "6000",
                "name": "Expenses",
                "children": [
                    {"number": "6010", "name": "Office Supplies"},
                    {"number": "6020", "name": "Software", "children": [
                        {"number": "6021", "name": "Subscriptions"}
                    ]}
                ]
            },
            {"number": "4000", "name": "Services Revenue"}
        ]
    }"#;

    fn store_with(content: &str) -> (tempfile::TempDir, ChartStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart_of_accounts.json");
        std::fs::write(&path, content).unwrap();
        (dir, ChartStore::new(path))
    }

    #[test]
    fn load_builds_hierarchy() {
        let (_dir, store) = store_with(SAMPLE);
        let chart = store.load().unwrap();
        assert_eq!(chart.len(), 5);
        let sub = chart.find_account("6021").unwrap();
        assert_eq!(chart.full_name(sub), "Expenses > Software > Subscriptions");
        assert!(chart.is_leaf(sub));
        assert!(!chart.is_leaf(chart.find_account("6020").unwrap()));
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChartStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(StoreError::Io(_))));
    }

    #[test]
    fn load_malformed_json_errors() {
        let (_dir, store) = store_with("{not json");
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn save_round_trips() {
        let (_dir, store) = store_with(SAMPLE);
        let chart = store.load().unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let store2 = ChartStore::new(dir2.path().join("out.json"));
        store2.save(&chart).unwrap();
        let reloaded = store2.load().unwrap();

        assert_eq!(reloaded.len(), chart.len());
        let leaves: Vec<String> = reloaded
            .get_leaf_accounts()
            .iter()
            .map(|&id| reloaded.account(id).number.clone())
            .collect();
        assert_eq!(leaves, vec!["6010", "6021", "4000"]);
    }
}
