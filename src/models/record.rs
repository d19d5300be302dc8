// src/models/record.rs

//! Final classification record, the append-only output of the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FetchMode, Label};

/// A validated, auditable label assignment for one page.
///
/// Created by the reconciler, immutable once the validator accepts it.
/// Invariant: if `labels` contains OTHER it contains nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Normalized URL the page was processed as
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    /// HTTP status of the fetch
    pub http_status: u16,

    /// Assigned labels, non-empty, unique, priority-ordered
    pub labels: Vec<Label>,

    /// Final confidence in [0, 1]
    pub confidence: f64,

    /// Rule ids that matched, in priority order
    pub matched_rules: Vec<String>,

    /// Free-text explanation of the decision
    pub rationale: String,

    /// Supporting evidence snippets
    pub evidence: Vec<String>,

    /// Whether a human should check this assignment
    pub needs_review: bool,

    /// Version of the ruleset used for this run
    pub ruleset_version: String,

    /// Version of the external classifier model
    pub model_version: String,

    /// When the record was produced
    pub processed_at: DateTime<Utc>,

    /// STATIC or RENDERED
    pub fetch_mode: FetchMode,

    /// Content hash of the page the decision was made on
    pub content_hash: String,
}

impl ClassificationRecord {
    /// Derived single-label view: the priority-highest entry of `labels`.
    /// Falls back to OTHER for a (never valid) empty label set.
    pub fn label(&self) -> Label {
        self.labels
            .iter()
            .copied()
            .max_by_key(|l| l.priority_rank())
            .unwrap_or(Label::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(labels: Vec<Label>) -> ClassificationRecord {
        ClassificationRecord {
            url: "https://example.com/page".to_string(),
            final_url: "https://example.com/page".to_string(),
            http_status: 200,
            labels,
            confidence: 0.8,
            matched_rules: vec!["R1".to_string()],
            rationale: "test".to_string(),
            evidence: vec![],
            needs_review: false,
            ruleset_version: "v1".to_string(),
            model_version: "stub".to_string(),
            processed_at: Utc::now(),
            fetch_mode: FetchMode::Static,
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn test_label_view_returns_highest_priority() {
        let record = sample_record(vec![Label::InvestorBeginner, Label::Professional]);
        assert_eq!(record.label(), Label::Professional);
    }

    #[test]
    fn test_record_roundtrips_through_json() {
        let record = sample_record(vec![Label::IssuerAdvanced]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"ISSUER_ADVANCED\""));
        let back: ClassificationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.labels, record.labels);
        assert_eq!(back.content_hash, record.content_hash);
    }
}
