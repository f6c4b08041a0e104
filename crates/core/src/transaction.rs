use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use super::account::AccountId;
use super::money::Money;

/// Matches below this confidence are flagged for manual review.
pub const REVIEW_CONFIDENCE_FLOOR: f64 = 0.70;
/// An alternative strictly within this margin of the primary triggers review.
pub const REVIEW_ALTERNATIVE_MARGIN: f64 = 0.10;
/// Alternatives at or below this confidence are not worth keeping.
pub const ALTERNATIVE_CONFIDENCE_FLOOR: f64 = 0.30;
/// Bound on the runner-up list.
pub const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionType {
    Sale,
    Payment,
    Return,
    Fee,
    Adjustment,
    Other(String),
}

impl From<&str> for TransactionType {
    fn from(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("sale") => TransactionType::Sale,
            s if s.eq_ignore_ascii_case("payment") => TransactionType::Payment,
            s if s.eq_ignore_ascii_case("return") => TransactionType::Return,
            s if s.eq_ignore_ascii_case("fee") => TransactionType::Fee,
            s if s.eq_ignore_ascii_case("adjustment") => TransactionType::Adjustment,
            other => TransactionType::Other(other.to_string()),
        }
    }
}

impl FromStr for TransactionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TransactionType::from(s))
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Sale => write!(f, "Sale"),
            TransactionType::Payment => write!(f, "Payment"),
            TransactionType::Return => write!(f, "Return"),
            TransactionType::Fee => write!(f, "Fee"),
            TransactionType::Adjustment => write!(f, "Adjustment"),
            TransactionType::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Which stage of the pipeline produced the current primary match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Unknown,
    Manual,
    Rule,
    Mapping,
    Llm,
}

impl fmt::Display for MatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchSource::Unknown => write!(f, "Unknown"),
            MatchSource::Manual => write!(f, "Manual"),
            MatchSource::Rule => write!(f, "Rule"),
            MatchSource::Mapping => write!(f, "Mapping"),
            MatchSource::Llm => write!(f, "LLM"),
        }
    }
}

/// A bank/credit-card transaction plus its categorization state.
///
/// The imported fields are fixed for the life of the run; the match state is
/// mutated exclusively through [`Transaction::add_match`].
#[derive(Debug, Clone)]
pub struct Transaction {
    pub transaction_date: NaiveDate,
    pub post_date: NaiveDate,
    pub description: String,
    pub category: Option<String>,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub memo: Option<String>,

    matched_account: Option<AccountId>,
    match_confidence: f64,
    match_source: MatchSource,
    alternative_matches: Vec<(AccountId, f64)>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_date: NaiveDate,
        post_date: NaiveDate,
        description: &str,
        category: Option<&str>,
        tx_type: TransactionType,
        amount: Money,
        memo: Option<&str>,
    ) -> Self {
        Transaction {
            transaction_date,
            post_date,
            description: description.to_string(),
            category: category.map(str::to_string),
            tx_type,
            amount,
            memo: memo.map(str::to_string),
            matched_account: None,
            match_confidence: 0.0,
            match_source: MatchSource::Unknown,
            alternative_matches: Vec::new(),
        }
    }

    pub fn matched_account(&self) -> Option<AccountId> {
        self.matched_account
    }

    pub fn match_confidence(&self) -> f64 {
        self.match_confidence
    }

    pub fn match_source(&self) -> MatchSource {
        self.match_source
    }

    pub fn alternative_matches(&self) -> &[(AccountId, f64)] {
        &self.alternative_matches
    }

    pub fn is_matched(&self) -> bool {
        self.matched_account.is_some()
    }

    /// Sole mutator of match state; every matcher funnels through here.
    ///
    /// A strictly higher confidence replaces the primary (the old primary is
    /// demoted to the alternatives). A tie on the same account refreshes the
    /// source but never the account; a tie on a different account is treated
    /// like any other runner-up. Idempotent under identical repeated calls.
    pub fn add_match(&mut self, account: AccountId, confidence: f64, source: MatchSource) {
        let confidence = confidence.clamp(0.0, 1.0);

        if self.matched_account.is_none() || confidence > self.match_confidence {
            if let Some(previous) = self.matched_account {
                if previous != account {
                    self.push_alternative(previous, self.match_confidence);
                }
            }
            self.matched_account = Some(account);
            self.match_confidence = confidence;
            self.match_source = source;
        } else if self.matched_account == Some(account) && confidence >= self.match_confidence {
            // Re-confirmation by another stage at equal confidence.
            self.match_source = source;
        } else if self.matched_account != Some(account)
            && confidence > ALTERNATIVE_CONFIDENCE_FLOOR
            && !self.alternative_matches.iter().any(|(a, _)| *a == account)
        {
            self.push_alternative(account, confidence);
        }
    }

    fn push_alternative(&mut self, account: AccountId, confidence: f64) {
        self.alternative_matches.push((account, confidence));
        self.alternative_matches
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.alternative_matches.truncate(MAX_ALTERNATIVES);
    }

    /// True when a human should look at this transaction: no match, a weak
    /// match, or a runner-up close enough to contest the primary.
    pub fn needs_review(&self) -> bool {
        if !self.is_matched() {
            return true;
        }
        if self.match_confidence < REVIEW_CONFIDENCE_FLOOR {
            return true;
        }
        self.alternative_matches
            .iter()
            .any(|(_, c)| *c > self.match_confidence - REVIEW_ALTERNATIVE_MARGIN)
    }
}
