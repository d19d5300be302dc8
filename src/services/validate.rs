// src/services/validate.rs

//! Record validation against schema and business invariants.
//!
//! Rejection is non-fatal to the pipeline: a rejected record is logged
//! with its reasons and the URL is marked FAILED; the crawl continues.

use std::collections::HashSet;

use crate::error::{AppError, Result};
use crate::models::{ClassificationRecord, Label, Ruleset};

/// Validates classification records before they reach storage.
pub struct Validator {
    rule_ids: HashSet<String>,
    ruleset_version: String,
}

impl Validator {
    /// Build a validator pinned to the active ruleset version.
    pub fn new(ruleset: &Ruleset) -> Self {
        Self {
            rule_ids: ruleset.rule_ids().into_iter().collect(),
            ruleset_version: ruleset.version.clone(),
        }
    }

    /// Collect every invariant violation. Empty means the record is valid.
    pub fn check(&self, record: &ClassificationRecord) -> Vec<String> {
        let mut reasons = Vec::new();

        if record.labels.is_empty() {
            reasons.push("labels is empty".to_string());
        }

        let unique: HashSet<Label> = record.labels.iter().copied().collect();
        if unique.len() != record.labels.len() {
            reasons.push("labels contains duplicates".to_string());
        }

        if record.labels.contains(&Label::Other) && record.labels.len() > 1 {
            reasons.push("OTHER must be the only label when present".to_string());
        }

        if !record.confidence.is_finite() || !(0.0..=1.0).contains(&record.confidence) {
            reasons.push(format!("confidence {} not in [0, 1]", record.confidence));
        }

        for rule_id in &record.matched_rules {
            if !self.rule_ids.contains(rule_id) {
                reasons.push(format!(
                    "matched rule {} not in ruleset {}",
                    rule_id, self.ruleset_version
                ));
            }
        }

        for (field, value) in [
            ("url", &record.url),
            ("final_url", &record.final_url),
            ("content_hash", &record.content_hash),
            ("ruleset_version", &record.ruleset_version),
            ("model_version", &record.model_version),
        ] {
            if value.trim().is_empty() {
                reasons.push(format!("{field} is empty"));
            }
        }

        reasons
    }

    /// Validate, returning the joined reasons as an error on rejection.
    pub fn validate(&self, record: &ClassificationRecord) -> Result<()> {
        let reasons = self.check(record);
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(reasons.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{FetchMode, Rule, Ruleset};

    fn ruleset() -> Ruleset {
        Ruleset {
            version: "v1".to_string(),
            rules: vec![Rule {
                id: "R1".to_string(),
                label: Label::Professional,
                url_pattern: Some(".*".to_string()),
                meta_contains: None,
                min_term_score: None,
            }],
        }
    }

    fn record() -> ClassificationRecord {
        ClassificationRecord {
            url: "https://example.com/page".to_string(),
            final_url: "https://example.com/page".to_string(),
            http_status: 200,
            labels: vec![Label::Professional],
            confidence: 0.8,
            matched_rules: vec!["R1".to_string()],
            rationale: "r".to_string(),
            evidence: vec![],
            needs_review: false,
            ruleset_version: "v1".to_string(),
            model_version: "m1".to_string(),
            processed_at: Utc::now(),
            fetch_mode: FetchMode::Static,
            content_hash: "hash".to_string(),
        }
    }

    #[test]
    fn test_valid_record_passes() {
        let validator = Validator::new(&ruleset());
        assert!(validator.check(&record()).is_empty());
        assert!(validator.validate(&record()).is_ok());
    }

    #[test]
    fn test_empty_labels_rejected() {
        let mut r = record();
        r.labels.clear();
        assert!(!Validator::new(&ruleset()).check(&r).is_empty());
    }

    #[test]
    fn test_other_exclusivity_enforced() {
        let mut r = record();
        r.labels = vec![Label::Professional, Label::Other];
        let reasons = Validator::new(&ruleset()).check(&r);
        assert!(reasons.iter().any(|m| m.contains("OTHER")));

        r.labels = vec![Label::Other];
        assert!(Validator::new(&ruleset()).check(&r).is_empty());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let mut r = record();
        r.labels = vec![Label::Professional, Label::Professional];
        assert!(!Validator::new(&ruleset()).check(&r).is_empty());
    }

    #[test]
    fn test_confidence_bounds() {
        let validator = Validator::new(&ruleset());
        for bad in [-0.1, 1.1, f64::NAN] {
            let mut r = record();
            r.confidence = bad;
            assert!(!validator.check(&r).is_empty(), "confidence {bad}");
        }
    }

    #[test]
    fn test_unknown_rule_id_rejected() {
        let mut r = record();
        r.matched_rules.push("R404".to_string());
        let reasons = Validator::new(&ruleset()).check(&r);
        assert!(reasons.iter().any(|m| m.contains("R404")));
    }

    #[test]
    fn test_required_fields_non_empty() {
        let mut r = record();
        r.content_hash = "  ".to_string();
        let reasons = Validator::new(&ruleset()).check(&r);
        assert!(reasons.iter().any(|m| m.contains("content_hash")));
    }
}
