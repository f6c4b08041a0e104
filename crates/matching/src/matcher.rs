use thiserror::Error;

use ledgermatch_core::{AccountId, ChartOfAccounts, Transaction};

#[derive(Debug, Clone, Error)]
pub enum MatchError {
    #[error("matcher failure: {0}")]
    Internal(String),
}

/// A single matching stage of the pipeline.
///
/// Implementations record results on the transaction exclusively through
/// [`Transaction::add_match`] and must only target leaf accounts. A matcher
/// that finds nothing simply leaves the transaction untouched.
pub trait Matcher {
    /// Stage name used in engine logs.
    fn name(&self) -> &'static str;

    /// Attempt to categorize one transaction, updating its match state.
    fn match_transaction(&self, tx: &mut Transaction) -> Result<(), MatchError>;

    /// Confidence this matcher would assign to pairing `tx` with `account`,
    /// without mutating anything. 0.0 means "would not match".
    fn match_confidence(&self, tx: &Transaction, account: AccountId) -> f64;
}

/// Leaf-only validation shared by all matchers: postings may never land on
/// an account that has children.
pub(crate) fn validate_match(chart: &ChartOfAccounts, account: AccountId) -> bool {
    chart.is_leaf(account)
}
