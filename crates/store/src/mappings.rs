use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::StoreError;

/// Whole-file JSON persistence for exact description→account mappings.
/// The document is a flat string-to-string object.
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        MappingStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the mapping table. A missing file is an empty table; malformed
    /// JSON or a non-object document is an error.
    pub fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "mappings file not found; no mappings loaded");
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let value: serde_json::Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(StoreError::Shape("a JSON object of description -> account number"));
        }
        let mappings: HashMap<String, String> = serde_json::from_value(value)?;
        tracing::info!(path = %self.path.display(), count = mappings.len(), "loaded mappings");
        Ok(mappings)
    }

    /// Like `load`, but degrades to an empty table on failure.
    pub fn load_or_default(&self) -> HashMap<String, String> {
        match self.load() {
            Ok(mappings) => mappings,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to load mappings; continuing with none");
                HashMap::new()
            }
        }
    }

    pub fn save(&self, mappings: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(mappings)?)?;
        tracing::info!(path = %self.path.display(), count = mappings.len(), "saved mappings");
        Ok(())
    }

    /// Add or replace a single mapping and rewrite the whole file.
    pub fn add_mapping(&self, description: &str, account_number: &str) -> Result<(), StoreError> {
        let mut mappings = self.load()?;
        if let Some(previous) = mappings.get(description) {
            if previous != account_number {
                tracing::info!(
                    %description,
                    from = %previous,
                    to = %account_number,
                    "updating mapping"
                );
            }
        }
        mappings.insert(description.to_string(), account_number.to_string());
        self.save(&mappings)
    }
}
