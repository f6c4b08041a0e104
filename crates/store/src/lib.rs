pub mod chart;
pub mod mappings;
pub mod rules;

pub use chart::ChartStore;
pub use mappings::MappingStore;
pub use rules::RuleStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected top-level shape: expected {0}")]
    Shape(&'static str),
}
