use std::path::{Path, PathBuf};

use ledgermatch_matching::Rule;

use crate::StoreError;

/// Whole-file JSON persistence for the rule set. `save` overwrites the file
/// with the complete in-memory list; there is no incremental log.
pub struct RuleStore {
    path: PathBuf,
}

impl RuleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        RuleStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the rule list. A missing or empty file is an empty rule set, not
    /// an error; malformed JSON or a non-array document is. Individual
    /// records that fail to deserialize are dropped with a warning, the rest
    /// of the set stays active.
    pub fn load(&self) -> Result<Vec<Rule>, StoreError> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "rules file not found; no rules loaded");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "rules file is empty");
            return Ok(Vec::new());
        }

        let value: serde_json::Value = serde_json::from_str(&content)?;
        let Some(records) = value.as_array() else {
            return Err(StoreError::Shape("a JSON array of rule records"));
        };
        let mut rules = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match serde_json::from_value::<Rule>(record.clone()) {
                Ok(rule) => rules.push(rule),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        index,
                        error = %e,
                        "dropping malformed rule record"
                    );
                }
            }
        }
        tracing::info!(path = %self.path.display(), count = rules.len(), "loaded rules");
        Ok(rules)
    }

    /// Like `load`, but degrades to an empty rule set on failure so matching
    /// can continue with reduced quality.
    pub fn load_or_default(&self) -> Vec<Rule> {
        match self.load() {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to load rules; continuing with none");
                Vec::new()
            }
        }
    }

    pub fn save(&self, rules: &[Rule]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(rules)?)?;
        tracing::info!(path = %self.path.display(), count = rules.len(), "saved rules");
        Ok(())
    }
}
