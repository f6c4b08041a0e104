//! Confidence scoring for rule-based matches.
//!
//! One scoring model serves every rule path: the matcher resolves a rule's
//! base confidence (explicit override or condition-type default) and this
//! function applies the situational boosts on top.

/// Score a rule match for a transaction/account pair.
///
/// Returns 0.0 when no rule matched. Otherwise starts from the rule's base
/// confidence and boosts:
/// - +0.10 when the rule pattern is the account name and the entire
///   description equals it (case-insensitive full match, not substring);
/// - else +0.05 when the pattern is the account number and that number
///   appears anywhere in the description.
///
/// The result is always clamped to [0.0, 1.0].
pub fn rule_match_confidence(
    description: &str,
    account_number: &str,
    account_name: &str,
    matched_rule: Option<(&str, f64)>,
) -> f64 {
    let Some((pattern, base_confidence)) = matched_rule else {
        return 0.0;
    };

    let mut confidence = base_confidence;

    if pattern.eq_ignore_ascii_case(account_name) && description.eq_ignore_ascii_case(pattern) {
        confidence = (confidence + 0.10).min(1.0);
    } else if pattern == account_number && description.contains(pattern) {
        confidence = (confidence + 0.05).min(1.0);
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBER: &str = "6000";
    const NAME: &str = "Office Supplies";

    #[test]
    fn no_matched_rule_is_zero() {
        assert_eq!(
            rule_match_confidence("STAPLES STORE 1234", NUMBER, NAME, None),
            0.0
        );
    }

    #[test]
    fn plain_match_keeps_base_confidence() {
        let c = rule_match_confidence("STAPLES STORE 1234", NUMBER, NAME, Some(("STAPLES", 0.7)));
        assert!((c - 0.7).abs() < 1e-9);
    }

    #[test]
    fn exact_name_full_description_boosts() {
        let c = rule_match_confidence("office supplies", NUMBER, NAME, Some((NAME, 0.8)));
        assert!((c - 0.9).abs() < 1e-9);
    }

    #[test]
    fn exact_name_partial_description_no_boost() {
        let c = rule_match_confidence(
            "Purchase of Office Supplies",
            NUMBER,
            NAME,
            Some((NAME, 0.8)),
        );
        assert!((c - 0.8).abs() < 1e-9);
    }

    #[test]
    fn account_number_in_description_boosts() {
        let c = rule_match_confidence("Invoice #6000 Payment", NUMBER, NAME, Some((NUMBER, 0.9)));
        assert!((c - 0.95).abs() < 1e-9);
    }

    #[test]
    fn boost_capped_at_one() {
        let c = rule_match_confidence("Test", "1000", "Test", Some(("Test", 0.95)));
        assert_eq!(c, 1.0);
    }

    #[test]
    fn low_base_stays_low() {
        let c = rule_match_confidence("Test", "1000", "Test", Some(("SomethingElse", 0.1)));
        assert!((c - 0.1).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_base_clamped() {
        assert_eq!(
            rule_match_confidence("x", NUMBER, NAME, Some(("y", 1.5))),
            1.0
        );
        assert_eq!(
            rule_match_confidence("x", NUMBER, NAME, Some(("y", -0.2))),
            0.0
        );
    }
}
