// src/services/reconcile.rs

//! Classifier reconciler: merges rule signals with the external verdict
//! into a final classification record.
//!
//! Deterministic given fixed inputs; the only wall-clock dependence is
//! `processed_at`.

use chrono::Utc;

use crate::models::{
    ClassificationRecord, Label, PagePackage, ThresholdConfig, Verdict,
};
use crate::services::rules::RuleMatch;

/// Builds classification records from rule matches and external verdicts.
pub struct Reconciler {
    thresholds: ThresholdConfig,
    ruleset_version: String,
    model_version: String,
}

impl Reconciler {
    pub fn new(
        thresholds: ThresholdConfig,
        ruleset_version: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            thresholds,
            ruleset_version: ruleset_version.into(),
            model_version: model_version.into(),
        }
    }

    /// Merge rule matches with the external verdict.
    ///
    /// `verdict` is `None` when the classifier was unavailable (timeout,
    /// error, or no credentials); the record is then built from rule
    /// signals alone with confidence forced to zero and needs_review set.
    pub fn reconcile(
        &self,
        page: &PagePackage,
        rule_matches: &[RuleMatch],
        verdict: Option<&Verdict>,
    ) -> ClassificationRecord {
        let matched_rules: Vec<String> =
            rule_matches.iter().map(|m| m.rule_id.clone()).collect();

        let (labels, confidence, needs_review, rationale, evidence) = match verdict {
            Some(verdict) => self.merge(rule_matches, verdict),
            None => self.rule_only(rule_matches),
        };

        ClassificationRecord {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            http_status: page.http_status,
            labels,
            confidence,
            matched_rules,
            rationale,
            evidence,
            needs_review,
            ruleset_version: self.ruleset_version.clone(),
            model_version: self.model_version.clone(),
            processed_at: Utc::now(),
            fetch_mode: page.fetch_mode,
            content_hash: page.content_hash.clone(),
        }
    }

    fn merge(
        &self,
        rule_matches: &[RuleMatch],
        verdict: &Verdict,
    ) -> (Vec<Label>, f64, bool, String, Vec<String>) {
        // Union: verdict labels plus rule labels whose term score clears
        // the agreement threshold.
        let mut union: Vec<Label> = verdict.labels.clone();
        for m in rule_matches {
            if m.term_scores_snapshot.get(m.label) >= self.thresholds.agreement {
                union.push(m.label);
            }
        }
        Label::sort_by_priority(&mut union);

        let empty_pre_fallback = union.is_empty();
        let labels = apply_other_exclusivity(union);

        let rule_labels: Vec<Label> = {
            let mut labels: Vec<Label> = rule_matches.iter().map(|m| m.label).collect();
            Label::sort_by_priority(&mut labels);
            labels
        };
        let disagreement = !rule_labels.is_empty()
            && !verdict.labels.is_empty()
            && rule_labels.iter().all(|l| !verdict.labels.contains(l));

        let mut confidence = verdict.confidence.clamp(0.0, 1.0);
        if disagreement {
            confidence = confidence.min(self.thresholds.disagreement_cap);
        }

        let needs_review =
            disagreement || confidence < self.thresholds.low_confidence || empty_pre_fallback;

        (
            labels,
            confidence,
            needs_review,
            verdict.rationale.clone(),
            verdict.evidence.clone(),
        )
    }

    fn rule_only(
        &self,
        rule_matches: &[RuleMatch],
    ) -> (Vec<Label>, f64, bool, String, Vec<String>) {
        let mut labels: Vec<Label> = rule_matches.iter().map(|m| m.label).collect();
        Label::sort_by_priority(&mut labels);
        let labels = apply_other_exclusivity(labels);

        (
            labels,
            0.0,
            true,
            "External classifier unavailable; labels derived from rules only.".to_string(),
            rule_matches
                .iter()
                .map(|m| format!("rule={}", m.rule_id))
                .collect(),
        )
    }
}

/// Enforce the exclusivity invariant: OTHER never appears alongside other
/// labels, and an empty set falls back to exactly {OTHER}.
fn apply_other_exclusivity(mut labels: Vec<Label>) -> Vec<Label> {
    if labels.len() > 1 {
        labels.retain(|&l| l != Label::Other);
    }
    if labels.is_empty() {
        labels.push(Label::Other);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchMode, PageMeta, TermScores};

    fn page() -> PagePackage {
        PagePackage {
            url: "https://example.com/page".to_string(),
            final_url: "https://example.com/page".to_string(),
            http_status: 200,
            fetch_mode: FetchMode::Static,
            raw_text: String::new(),
            normalized_text: String::new(),
            meta: PageMeta::default(),
            term_scores: TermScores::default(),
            content_hash: "hash".to_string(),
            extracted_links: vec![],
        }
    }

    fn rule_match(id: &str, label: Label, score: f64) -> RuleMatch {
        let mut snapshot = TermScores::default();
        snapshot.set(label, score);
        RuleMatch {
            rule_id: id.to_string(),
            label,
            priority_rank: label.priority_rank(),
            term_scores_snapshot: snapshot,
        }
    }

    fn verdict(labels: Vec<Label>, confidence: f64) -> Verdict {
        Verdict {
            labels,
            confidence,
            rationale: "llm says so".to_string(),
            evidence: vec!["title=x".to_string()],
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(ThresholdConfig::default(), "rs-v1", "model-v1")
    }

    #[test]
    fn test_scenario_a_agreeing_rule_joins_union() {
        let matches = vec![
            rule_match("R1", Label::Professional, 0.05),
            rule_match("R3", Label::IssuerAdvanced, 0.05),
        ];
        let v = verdict(vec![Label::Professional], 0.9);
        let record = reconciler().reconcile(&page(), &matches, Some(&v));
        assert_eq!(
            record.labels,
            vec![Label::Professional, Label::IssuerAdvanced]
        );
        assert!(!record.needs_review);
        assert_eq!(record.confidence, 0.9);
    }

    #[test]
    fn test_scenario_a_below_threshold_rule_excluded() {
        let matches = vec![
            rule_match("R1", Label::Professional, 0.05),
            // Below the 0.01 default agreement threshold
            rule_match("R3", Label::IssuerAdvanced, 0.001),
        ];
        let v = verdict(vec![Label::Professional], 0.9);
        let record = reconciler().reconcile(&page(), &matches, Some(&v));
        assert_eq!(record.labels, vec![Label::Professional]);
    }

    #[test]
    fn test_scenario_b_other_verdict_no_rules() {
        let v = verdict(vec![Label::Other], 0.8);
        let record = reconciler().reconcile(&page(), &[], Some(&v));
        assert_eq!(record.labels, vec![Label::Other]);
        assert!(!record.needs_review);
    }

    #[test]
    fn test_scenario_c_total_disagreement() {
        let matches = vec![rule_match("R1", Label::Professional, 0.05)];
        let v = verdict(vec![Label::InvestorBeginner], 0.9);
        let record = reconciler().reconcile(&page(), &matches, Some(&v));

        assert!(record.needs_review);
        assert_eq!(record.confidence, 0.3); // capped by disagreement_cap
        assert_eq!(
            record.labels,
            vec![Label::Professional, Label::InvestorBeginner]
        );
    }

    #[test]
    fn test_scenario_d_unavailable_verdict() {
        let matches = vec![rule_match("R1", Label::IssuerBeginner, 0.05)];
        let record = reconciler().reconcile(&page(), &matches, None);

        assert_eq!(record.labels, vec![Label::IssuerBeginner]);
        assert!(record.needs_review);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.matched_rules, vec!["R1".to_string()]);
    }

    #[test]
    fn test_other_dropped_from_mixed_union() {
        let matches = vec![rule_match("R1", Label::Professional, 0.05)];
        let v = verdict(vec![Label::Other], 0.9);
        let record = reconciler().reconcile(&page(), &matches, Some(&v));
        assert_eq!(record.labels, vec![Label::Professional]);
    }

    #[test]
    fn test_empty_union_falls_back_to_other_with_review() {
        let v = verdict(vec![], 0.9);
        let record = reconciler().reconcile(&page(), &[], Some(&v));
        assert_eq!(record.labels, vec![Label::Other]);
        assert!(record.needs_review);
    }

    #[test]
    fn test_low_confidence_forces_review() {
        let v = verdict(vec![Label::InvestorQualified], 0.2);
        let record = reconciler().reconcile(&page(), &[], Some(&v));
        assert_eq!(record.labels, vec![Label::InvestorQualified]);
        assert!(record.needs_review);
        assert_eq!(record.confidence, 0.2);
    }

    #[test]
    fn test_matched_rules_preserve_engine_order() {
        let matches = vec![
            rule_match("R1", Label::Professional, 0.05),
            rule_match("R4", Label::IssuerAdvanced, 0.05),
            rule_match("R8", Label::InvestorBeginner, 0.05),
        ];
        let v = verdict(vec![Label::Professional], 0.9);
        let record = reconciler().reconcile(&page(), &matches, Some(&v));
        assert_eq!(record.matched_rules, vec!["R1", "R4", "R8"]);
    }

    #[test]
    fn test_no_rules_unavailable_verdict_yields_other() {
        let record = reconciler().reconcile(&page(), &[], None);
        assert_eq!(record.labels, vec![Label::Other]);
        assert!(record.needs_review);
    }
}
