// src/models/ruleset.rs

//! Versioned, declarative classification ruleset.
//!
//! Rules are data, not code branches: each rule is a predicate record over
//! term scores, page meta, and the URL, evaluated uniformly by the rule
//! engine. Keeping them declarative keeps versioning and reloads simple.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Label;

/// A single declarative classification rule.
///
/// All present clauses must hold for the rule to match. A rule with no
/// clause at all is rejected at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier, referenced by `matched_rules` in records
    pub id: String,

    /// Label this rule votes for
    pub label: Label,

    /// Regex matched against the page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,

    /// Substrings searched (case-insensitively) in title and description;
    /// any one hit satisfies the clause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_contains: Option<Vec<String>>,

    /// Minimum term score for this rule's label category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_term_score: Option<f64>,
}

impl Rule {
    fn has_clause(&self) -> bool {
        self.url_pattern.is_some()
            || self.meta_contains.as_ref().is_some_and(|m| !m.is_empty())
            || self.min_term_score.is_some()
    }
}

/// Versioned ordered sequence of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    /// Version identifier pinning this rule definition for replay
    pub version: String,

    /// Rules in declaration order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Ruleset {
    /// Load a ruleset from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let ruleset: Ruleset = toml::from_str(&content)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Load a ruleset or fall back to the built-in default.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(ruleset) => ruleset,
            Err(e) => {
                log::warn!(
                    "Ruleset load failed from {:?}: {}. Using built-in ruleset.",
                    path.as_ref(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Validate structural sanity of the ruleset.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(AppError::validation("ruleset version is empty"));
        }
        if self.rules.is_empty() {
            return Err(AppError::validation("ruleset has no rules"));
        }
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(AppError::validation("rule with empty id"));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(AppError::validation(format!("duplicate rule id {}", rule.id)));
            }
            if !rule.has_clause() {
                return Err(AppError::validation(format!(
                    "rule {} has no predicate clause",
                    rule.id
                )));
            }
        }
        Ok(())
    }

    /// Ids of all rules, in declaration order.
    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.id.clone()).collect()
    }
}

impl Default for Ruleset {
    fn default() -> Self {
        defaults::default_ruleset()
    }
}

mod defaults {
    use super::{Rule, Ruleset};
    use crate::models::Label;

    fn term_rule(id: &str, label: Label, min_term_score: f64) -> Rule {
        Rule {
            id: id.to_string(),
            label,
            url_pattern: None,
            meta_contains: None,
            min_term_score: Some(min_term_score),
        }
    }

    pub fn default_ruleset() -> Ruleset {
        Ruleset {
            version: "builtin-v1".to_string(),
            rules: vec![
                term_rule("R1", Label::Professional, 0.004),
                Rule {
                    id: "R2".to_string(),
                    label: Label::Professional,
                    url_pattern: Some(r"/(?:brokers?|members|clearing|depository)(?:/|$)".into()),
                    meta_contains: None,
                    min_term_score: None,
                },
                term_rule("R3", Label::IssuerAdvanced, 0.004),
                Rule {
                    id: "R4".to_string(),
                    label: Label::IssuerAdvanced,
                    url_pattern: Some(r"/(?:disclosure|corporate-actions)(?:/|$)".into()),
                    meta_contains: None,
                    min_term_score: None,
                },
                term_rule("R5", Label::IssuerBeginner, 0.004),
                Rule {
                    id: "R6".to_string(),
                    label: Label::IssuerBeginner,
                    url_pattern: Some(r"/(?:ipo|listing|go-public)(?:/|$)".into()),
                    meta_contains: None,
                    min_term_score: None,
                },
                term_rule("R7", Label::InvestorQualified, 0.004),
                term_rule("R8", Label::InvestorBeginner, 0.004),
                Rule {
                    id: "R9".to_string(),
                    label: Label::InvestorBeginner,
                    meta_contains: Some(vec![
                        "how to invest".into(),
                        "getting started".into(),
                        "beginner".into(),
                    ]),
                    url_pattern: None,
                    min_term_score: None,
                },
                // Fallback: matches any URL, only consulted when nothing else hit
                Rule {
                    id: "R10".to_string(),
                    label: Label::Other,
                    url_pattern: Some(".*".into()),
                    meta_contains: None,
                    min_term_score: None,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ruleset_is_valid() {
        assert!(Ruleset::default().validate().is_ok());
    }

    #[test]
    fn test_rule_without_clause_rejected() {
        let ruleset = Ruleset {
            version: "v1".to_string(),
            rules: vec![Rule {
                id: "R1".to_string(),
                label: Label::Other,
                url_pattern: None,
                meta_contains: None,
                min_term_score: None,
            }],
        };
        assert!(ruleset.validate().is_err());
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let rule = Rule {
            id: "R1".to_string(),
            label: Label::Professional,
            url_pattern: Some(".*".into()),
            meta_contains: None,
            min_term_score: None,
        };
        let ruleset = Ruleset {
            version: "v1".to_string(),
            rules: vec![rule.clone(), rule],
        };
        assert!(ruleset.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let text = r#"
            version = "site-v2"

            [[rules]]
            id = "R1"
            label = "PROFESSIONAL"
            min_term_score = 0.01

            [[rules]]
            id = "R2"
            label = "OTHER"
            url_pattern = ".*"
        "#;
        let ruleset: Ruleset = toml::from_str(text).unwrap();
        assert!(ruleset.validate().is_ok());
        assert_eq!(ruleset.version, "site-v2");
        assert_eq!(ruleset.rules[0].label, Label::Professional);
        assert_eq!(ruleset.rule_ids(), vec!["R1", "R2"]);
    }
}
