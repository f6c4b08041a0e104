use thiserror::Error;

use ledgermatch_core::Transaction;

use crate::matcher::Matcher;

/// Default cutoff below which a primary match is retried by the secondary.
pub const DEFAULT_SECONDARY_THRESHOLD: f64 = 0.80;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("no primary matcher registered with the engine")]
    NoPrimaryMatcher,
    #[error("secondary confidence threshold {0} is outside [0.0, 1.0]")]
    InvalidThreshold(f64),
}

/// Two-pass orchestrator: a required primary matcher runs over the whole
/// batch, then an optional secondary matcher retries transactions that are
/// unmatched or below the confidence threshold.
#[derive(Default)]
pub struct MatchingEngine {
    primary: Option<Box<dyn Matcher>>,
    secondary: Option<Box<dyn Matcher>>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a matcher: the first becomes primary, the second secondary.
    /// Further calls are ignored with a warning.
    pub fn add_matcher(&mut self, matcher: Box<dyn Matcher>) {
        if self.primary.is_none() {
            tracing::info!(matcher = matcher.name(), "registered primary matcher");
            self.primary = Some(matcher);
        } else if self.secondary.is_none() {
            tracing::info!(matcher = matcher.name(), "registered secondary matcher");
            self.secondary = Some(matcher);
        } else {
            tracing::warn!(
                matcher = matcher.name(),
                "engine supports only primary and secondary matchers; ignoring"
            );
        }
    }

    /// Run the pipeline over the batch, mutating transactions in place.
    ///
    /// Configuration problems (no primary matcher, threshold outside [0,1])
    /// fail before anything is processed. Per-transaction matcher failures
    /// are logged and the batch continues; `add_match` semantics guarantee
    /// the secondary pass only overrides on strictly higher confidence.
    pub fn process_transactions(
        &self,
        transactions: &mut [Transaction],
        secondary_confidence_threshold: f64,
    ) -> Result<(), EngineError> {
        if !(0.0..=1.0).contains(&secondary_confidence_threshold) {
            return Err(EngineError::InvalidThreshold(secondary_confidence_threshold));
        }
        let primary = self.primary.as_ref().ok_or(EngineError::NoPrimaryMatcher)?;

        tracing::info!(
            count = transactions.len(),
            matcher = primary.name(),
            "pass 1: primary matcher"
        );
        for tx in transactions.iter_mut() {
            if let Err(e) = primary.match_transaction(tx) {
                tracing::error!(
                    matcher = primary.name(),
                    description = %tx.description,
                    error = %e,
                    "primary matcher failed; continuing"
                );
            }
        }

        let Some(secondary) = self.secondary.as_ref() else {
            tracing::info!("pass 2: no secondary matcher configured; skipping");
            return Ok(());
        };

        let selected: Vec<&mut Transaction> = transactions
            .iter_mut()
            .filter(|t| !t.is_matched() || t.match_confidence() < secondary_confidence_threshold)
            .collect();

        if selected.is_empty() {
            tracing::info!("pass 2: no transactions below threshold");
            return Ok(());
        }

        tracing::info!(
            count = selected.len(),
            matcher = secondary.name(),
            threshold = secondary_confidence_threshold,
            "pass 2: secondary matcher"
        );
        for tx in selected {
            if let Err(e) = secondary.match_transaction(tx) {
                tracing::error!(
                    matcher = secondary.name(),
                    description = %tx.description,
                    error = %e,
                    "secondary matcher failed; continuing"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchError;
    use chrono::NaiveDate;
    use ledgermatch_core::{AccountId, ChartOfAccounts, MatchSource, Money, TransactionType};
    use std::sync::Arc;

    fn chart() -> Arc<ChartOfAccounts> {
        let mut chart = ChartOfAccounts::new();
        let root = chart.add_root("6000", "Expenses");
        chart.add_child(root, "6010", "Office Supplies");
        chart.add_child(root, "6020", "Software");
        Arc::new(chart)
    }

    fn tx(description: &str) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            description,
            None,
            TransactionType::Sale,
            Money::from_cents(-1000),
            None,
        )
    }

    /// Applies a fixed match to every transaction it sees.
    struct FixedMatcher {
        account: AccountId,
        confidence: f64,
    }

    impl FixedMatcher {
        fn new(account: AccountId, confidence: f64) -> Self {
            FixedMatcher { account, confidence }
        }
    }

    impl Matcher for FixedMatcher {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn match_transaction(&self, tx: &mut Transaction) -> Result<(), MatchError> {
            tx.add_match(self.account, self.confidence, MatchSource::Rule);
            Ok(())
        }

        fn match_confidence(&self, _tx: &Transaction, _account: AccountId) -> f64 {
            self.confidence
        }
    }

    struct FailingMatcher;

    impl Matcher for FailingMatcher {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn match_transaction(&self, _tx: &mut Transaction) -> Result<(), MatchError> {
            Err(MatchError::Internal("boom".to_string()))
        }

        fn match_confidence(&self, _tx: &Transaction, _account: AccountId) -> f64 {
            0.0
        }
    }

    /// Matches only transactions whose description contains a keyword.
    struct KeywordMatcher {
        keyword: &'static str,
        account: AccountId,
        confidence: f64,
    }

    impl Matcher for KeywordMatcher {
        fn name(&self) -> &'static str {
            "keyword"
        }

        fn match_transaction(&self, tx: &mut Transaction) -> Result<(), MatchError> {
            if tx.description.contains(self.keyword) {
                tx.add_match(self.account, self.confidence, MatchSource::Rule);
            }
            Ok(())
        }

        fn match_confidence(&self, tx: &Transaction, _account: AccountId) -> f64 {
            if tx.description.contains(self.keyword) {
                self.confidence
            } else {
                0.0
            }
        }
    }

    #[test]
    fn no_primary_matcher_is_fatal() {
        let engine = MatchingEngine::new();
        let mut txs = vec![tx("A")];
        let err = engine.process_transactions(&mut txs, 0.8).unwrap_err();
        assert!(matches!(err, EngineError::NoPrimaryMatcher));
        assert!(!txs[0].is_matched());
    }

    #[test]
    fn invalid_threshold_is_fatal_before_processing() {
        let chart = chart();
        let leaf = chart.find_account("6010").unwrap();
        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(FixedMatcher::new(leaf, 0.9)));
        let mut txs = vec![tx("A")];
        let err = engine.process_transactions(&mut txs, 1.5).unwrap_err();
        assert!(matches!(err, EngineError::InvalidThreshold(_)));
        assert!(!txs[0].is_matched());
    }

    #[test]
    fn primary_runs_over_all_transactions_in_order() {
        let chart = chart();
        let leaf = chart.find_account("6010").unwrap();
        let primary = Box::new(FixedMatcher::new(leaf, 0.9));
        let mut engine = MatchingEngine::new();
        engine.add_matcher(primary);
        let mut txs = vec![tx("A"), tx("B"), tx("C")];
        engine.process_transactions(&mut txs, 0.8).unwrap();
        assert!(txs.iter().all(|t| t.is_matched()));
    }

    #[test]
    fn secondary_only_sees_low_confidence_subset() {
        let chart = chart();
        let supplies = chart.find_account("6010").unwrap();
        let software = chart.find_account("6020").unwrap();

        let mut engine = MatchingEngine::new();
        // Primary matches only "GITHUB" at 0.85; everything else unmatched.
        engine.add_matcher(Box::new(KeywordMatcher {
            keyword: "GITHUB",
            account: software,
            confidence: 0.85,
        }));
        engine.add_matcher(Box::new(FixedMatcher::new(supplies, 0.75)));

        let mut txs = vec![tx("GITHUB SUBSCRIPTION"), tx("STAPLES"), tx("UNKNOWN")];
        engine.process_transactions(&mut txs, 0.80).unwrap();

        // 0.85 >= threshold: untouched by pass 2.
        assert_eq!(txs[0].matched_account(), Some(software));
        assert_eq!(txs[0].match_confidence(), 0.85);
        // The other two were picked up by the secondary.
        assert_eq!(txs[1].matched_account(), Some(supplies));
        assert_eq!(txs[2].matched_account(), Some(supplies));
    }

    #[test]
    fn threshold_selection_boundaries() {
        let chart = chart();
        let supplies = chart.find_account("6010").unwrap();
        let software = chart.find_account("6020").unwrap();

        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(KeywordMatcher {
            keyword: "LOW",
            account: software,
            confidence: 0.75,
        }));
        engine.add_matcher(Box::new(FixedMatcher::new(supplies, 0.99)));

        // Matched at 0.75 with threshold 0.80: selected for pass 2.
        let mut txs = vec![tx("LOW CONFIDENCE")];
        engine.process_transactions(&mut txs, 0.80).unwrap();
        assert_eq!(txs[0].matched_account(), Some(supplies));

        // Matched at 0.85 with threshold 0.80: excluded from pass 2.
        let mut engine2 = MatchingEngine::new();
        engine2.add_matcher(Box::new(KeywordMatcher {
            keyword: "HIGH",
            account: software,
            confidence: 0.85,
        }));
        engine2.add_matcher(Box::new(FixedMatcher::new(supplies, 0.99)));
        let mut txs = vec![tx("HIGH CONFIDENCE")];
        engine2.process_transactions(&mut txs, 0.80).unwrap();
        assert_eq!(txs[0].matched_account(), Some(software));
    }

    #[test]
    fn secondary_cannot_downgrade_primary_match() {
        let chart = chart();
        let supplies = chart.find_account("6010").unwrap();
        let software = chart.find_account("6020").unwrap();

        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(FixedMatcher::new(software, 0.70)));
        engine.add_matcher(Box::new(FixedMatcher::new(supplies, 0.60)));

        let mut txs = vec![tx("A")];
        engine.process_transactions(&mut txs, 0.80).unwrap();
        // Selected for pass 2 (0.70 < 0.80) but the weaker suggestion only
        // lands in the alternatives.
        assert_eq!(txs[0].matched_account(), Some(software));
        assert_eq!(txs[0].alternative_matches(), &[(supplies, 0.60)]);
    }

    #[test]
    fn third_matcher_is_ignored() {
        let chart = chart();
        let supplies = chart.find_account("6010").unwrap();
        let software = chart.find_account("6020").unwrap();

        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(FixedMatcher::new(software, 0.5)));
        engine.add_matcher(Box::new(FixedMatcher::new(supplies, 0.6)));
        engine.add_matcher(Box::new(FixedMatcher::new(supplies, 0.99)));

        let mut txs = vec![tx("A")];
        engine.process_transactions(&mut txs, 0.80).unwrap();
        // Third matcher (0.99) never ran.
        assert_eq!(txs[0].match_confidence(), 0.6);
    }

    #[test]
    fn failing_primary_does_not_abort_batch() {
        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(FailingMatcher));
        let mut txs = vec![tx("A"), tx("B")];
        engine.process_transactions(&mut txs, 0.80).unwrap();
        assert!(txs.iter().all(|t| !t.is_matched()));
    }

    #[test]
    fn batch_length_is_preserved() {
        let chart = chart();
        let leaf = chart.find_account("6010").unwrap();
        let mut engine = MatchingEngine::new();
        engine.add_matcher(Box::new(FixedMatcher::new(leaf, 0.9)));
        let mut txs = vec![tx("A"), tx("B")];
        engine.process_transactions(&mut txs, 0.80).unwrap();
        assert_eq!(txs.len(), 2);
    }
}
