use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use ledgermatch_core::{AccountId, ChartOfAccounts, MatchSource, Transaction};

use crate::confidence::rule_match_confidence;
use crate::matcher::{validate_match, MatchError, Matcher};

/// Confidence assigned to an exact description→account mapping hit.
pub const DEFAULT_MAPPING_CONFIDENCE: f64 = 0.95;

const EQUALS_DEFAULT_CONFIDENCE: f64 = 0.95;
const CONTAINS_DEFAULT_CONFIDENCE: f64 = 0.85;
const REGEX_DEFAULT_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    DescriptionEquals,
    DescriptionContains,
    DescriptionRegex,
}

impl ConditionType {
    fn default_confidence(self) -> f64 {
        match self {
            ConditionType::DescriptionEquals => EQUALS_DEFAULT_CONFIDENCE,
            ConditionType::DescriptionContains => CONTAINS_DEFAULT_CONFIDENCE,
            ConditionType::DescriptionRegex => REGEX_DEFAULT_CONFIDENCE,
        }
    }
}

/// A single categorization rule. Higher priority wins over higher confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub condition_type: ConditionType,
    pub condition_value: String,
    pub account_number: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Rule {
    pub fn new(condition_type: ConditionType, condition_value: &str, account_number: &str) -> Self {
        Rule {
            condition_type,
            condition_value: condition_value.to_string(),
            account_number: account_number.to_string(),
            priority: 0,
            confidence: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Explicit confidence override if present, else the per-type default.
    pub fn resolved_confidence(&self) -> f64 {
        self.confidence
            .unwrap_or_else(|| self.condition_type.default_confidence())
    }
}

/// A rule paired with its precompiled regex (regex conditions only).
#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    compiled_regex: Option<regex::Regex>,
}

impl CompiledRule {
    fn condition_matches(&self, text: &str) -> bool {
        match self.rule.condition_type {
            ConditionType::DescriptionEquals => text.eq_ignore_ascii_case(&self.rule.condition_value),
            ConditionType::DescriptionContains => text
                .to_lowercase()
                .contains(&self.rule.condition_value.to_lowercase()),
            ConditionType::DescriptionRegex => self
                .compiled_regex
                .as_ref()
                .is_some_and(|re| re.is_match(text)),
        }
    }
}

/// First-pass matcher: exact description mappings plus prioritized rules.
///
/// Rules and mappings are loaded once per instance; `add_rule` appends to the
/// in-memory set and is not safe under concurrent mutation.
pub struct RuleMatcher {
    chart: Arc<ChartOfAccounts>,
    rules: Vec<CompiledRule>,
    mappings: HashMap<String, String>,
    mapping_confidence: f64,
}

impl RuleMatcher {
    pub fn new(
        chart: Arc<ChartOfAccounts>,
        rules: Vec<Rule>,
        mappings: HashMap<String, String>,
    ) -> Self {
        let mut matcher = RuleMatcher {
            chart,
            rules: Vec::with_capacity(rules.len()),
            mappings,
            mapping_confidence: DEFAULT_MAPPING_CONFIDENCE,
        };
        for rule in rules {
            matcher.add_rule(rule);
        }
        matcher
    }

    pub fn with_mapping_confidence(mut self, confidence: f64) -> Self {
        self.mapping_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Append one rule. Invalid rules (blank condition, out-of-range
    /// confidence, malformed regex) are dropped here, at load time, so the
    /// match path never sees them.
    pub fn add_rule(&mut self, rule: Rule) {
        if rule.condition_value.trim().is_empty() {
            tracing::warn!(account = %rule.account_number, "dropping rule with empty condition value");
            return;
        }
        if let Some(c) = rule.confidence {
            if !(0.0..=1.0).contains(&c) {
                tracing::warn!(
                    account = %rule.account_number,
                    confidence = c,
                    "dropping rule with out-of-range confidence"
                );
                return;
            }
        }
        let compiled_regex = match rule.condition_type {
            ConditionType::DescriptionRegex => {
                match regex::RegexBuilder::new(&rule.condition_value)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(
                            pattern = %rule.condition_value,
                            error = %e,
                            "dropping rule with invalid regex"
                        );
                        return;
                    }
                }
            }
            _ => None,
        };
        self.rules.push(CompiledRule { rule, compiled_regex });
    }

    /// The live rule set, for persisting back to a rule store.
    pub fn rules(&self) -> Vec<Rule> {
        self.rules.iter().map(|cr| cr.rule.clone()).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The description text rules evaluate against: when the description is a
    /// mapped key, the mapping target substitutes for the raw text even if
    /// the mapping candidate itself ends up losing the selection.
    fn substituted_description<'a>(&'a self, description: &'a str) -> &'a str {
        self.mappings
            .get(description)
            .map(String::as_str)
            .unwrap_or(description)
    }

    /// Resolve the mapping for a description to a leaf account, if any.
    fn mapping_candidate(&self, description: &str) -> Option<AccountId> {
        let number = self.mappings.get(description)?;
        match self.chart.find_account(number) {
            Some(id) if validate_match(&self.chart, id) => Some(id),
            Some(_) => {
                tracing::warn!(%number, "mapping targets a non-leaf account; ignoring");
                None
            }
            None => {
                tracing::warn!(%number, "mapping targets an unknown account; ignoring");
                None
            }
        }
    }

    /// Best rule candidate for `text`: highest priority wins, ties broken by
    /// higher resolved confidence.
    fn best_rule_candidate(&self, text: &str) -> Option<(AccountId, f64, i32)> {
        let mut best: Option<(AccountId, f64, i32)> = None;
        for cr in &self.rules {
            if !cr.condition_matches(text) {
                continue;
            }
            let Some(account) = self.chart.find_account(&cr.rule.account_number) else {
                tracing::debug!(
                    account = %cr.rule.account_number,
                    "rule targets an unknown account; skipping"
                );
                continue;
            };
            if !validate_match(&self.chart, account) {
                continue;
            }
            let acc = self.chart.account(account);
            let confidence = rule_match_confidence(
                text,
                &acc.number,
                &acc.name,
                Some((&cr.rule.condition_value, cr.rule.resolved_confidence())),
            );
            let replace = match best {
                None => true,
                Some((_, best_conf, best_prio)) => {
                    cr.rule.priority > best_prio
                        || (cr.rule.priority == best_prio && confidence > best_conf)
                }
            };
            if replace {
                best = Some((account, confidence, cr.rule.priority));
            }
        }
        best
    }
}

impl Matcher for RuleMatcher {
    fn name(&self) -> &'static str {
        "rules"
    }

    fn match_transaction(&self, tx: &mut Transaction) -> Result<(), MatchError> {
        let mapping = self.mapping_candidate(&tx.description);
        let text = self.substituted_description(&tx.description).to_string();
        let rule = self.best_rule_candidate(&text);

        // A rule overrides the mapping only on strictly higher confidence;
        // the loser still lands in the alternatives via add_match.
        let (winner, loser) = match (mapping, rule) {
            (Some(m), Some((acc, conf, _))) => {
                if conf > self.mapping_confidence {
                    (
                        Some((acc, conf, MatchSource::Rule)),
                        Some((m, self.mapping_confidence, MatchSource::Mapping)),
                    )
                } else {
                    (
                        Some((m, self.mapping_confidence, MatchSource::Mapping)),
                        Some((acc, conf, MatchSource::Rule)),
                    )
                }
            }
            (Some(m), None) => (Some((m, self.mapping_confidence, MatchSource::Mapping)), None),
            (None, Some((acc, conf, _))) => (Some((acc, conf, MatchSource::Rule)), None),
            (None, None) => (None, None),
        };

        if let Some((account, confidence, source)) = winner {
            tx.add_match(account, confidence, source);
            tracing::debug!(
                description = %tx.description,
                account = %self.chart.account(account).number,
                confidence,
                %source,
                "rule matcher applied match"
            );
        }
        if let Some((account, confidence, source)) = loser {
            if tx.matched_account() != Some(account) {
                tx.add_match(account, confidence, source);
            }
        }
        Ok(())
    }

    fn match_confidence(&self, tx: &Transaction, account: AccountId) -> f64 {
        if !validate_match(&self.chart, account) {
            return 0.0;
        }
        let text = self.substituted_description(&tx.description);
        let acc = self.chart.account(account);

        let mut max = 0.0f64;
        if self.mapping_candidate(&tx.description) == Some(account) {
            max = self.mapping_confidence;
        }
        for cr in &self.rules {
            if cr.rule.account_number != acc.number || !cr.condition_matches(text) {
                continue;
            }
            let c = rule_match_confidence(
                text,
                &acc.number,
                &acc.name,
                Some((&cr.rule.condition_value, cr.rule.resolved_confidence())),
            );
            max = max.max(c);
        }
        max
    }
}
