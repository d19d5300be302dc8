// src/models/label.rs

//! Audience label enum and its fixed priority order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Audience category assigned to a page.
///
/// `Other` is the fallback label and may never appear alongside any other
/// label in a classification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    InvestorBeginner,
    InvestorQualified,
    IssuerBeginner,
    IssuerAdvanced,
    Professional,
    Other,
}

impl Label {
    /// All labels, in declaration order.
    pub const ALL: [Label; 6] = [
        Label::InvestorBeginner,
        Label::InvestorQualified,
        Label::IssuerBeginner,
        Label::IssuerAdvanced,
        Label::Professional,
        Label::Other,
    ];

    /// Fixed priority rank used for tie-breaking and rule ordering.
    /// Higher wins: PROFESSIONAL > ISSUER_ADVANCED > ISSUER_BEGINNER >
    /// INVESTOR_QUALIFIED > INVESTOR_BEGINNER > OTHER.
    pub fn priority_rank(self) -> u8 {
        match self {
            Label::Professional => 6,
            Label::IssuerAdvanced => 5,
            Label::IssuerBeginner => 4,
            Label::InvestorQualified => 3,
            Label::InvestorBeginner => 2,
            Label::Other => 1,
        }
    }

    /// The serialized SCREAMING_SNAKE_CASE name.
    pub fn as_str(self) -> &'static str {
        match self {
            Label::InvestorBeginner => "INVESTOR_BEGINNER",
            Label::InvestorQualified => "INVESTOR_QUALIFIED",
            Label::IssuerBeginner => "ISSUER_BEGINNER",
            Label::IssuerAdvanced => "ISSUER_ADVANCED",
            Label::Professional => "PROFESSIONAL",
            Label::Other => "OTHER",
        }
    }

    /// Parse a label from its serialized name, case-insensitively.
    /// Unknown names yield `None` so callers can drop them.
    pub fn parse(s: &str) -> Option<Label> {
        match s.trim().to_uppercase().as_str() {
            "INVESTOR_BEGINNER" => Some(Label::InvestorBeginner),
            "INVESTOR_QUALIFIED" => Some(Label::InvestorQualified),
            "ISSUER_BEGINNER" => Some(Label::IssuerBeginner),
            "ISSUER_ADVANCED" => Some(Label::IssuerAdvanced),
            "PROFESSIONAL" => Some(Label::Professional),
            "OTHER" => Some(Label::Other),
            _ => None,
        }
    }

    /// Sort labels by descending priority, deduplicated.
    pub fn sort_by_priority(labels: &mut Vec<Label>) {
        labels.sort_by(|a, b| b.priority_rank().cmp(&a.priority_rank()));
        labels.dedup();
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let mut labels = vec![
            Label::Other,
            Label::InvestorBeginner,
            Label::Professional,
            Label::IssuerBeginner,
        ];
        Label::sort_by_priority(&mut labels);
        assert_eq!(
            labels,
            vec![
                Label::Professional,
                Label::IssuerBeginner,
                Label::InvestorBeginner,
                Label::Other,
            ]
        );
    }

    #[test]
    fn test_sort_dedups() {
        let mut labels = vec![Label::Professional, Label::Professional, Label::Other];
        Label::sort_by_priority(&mut labels);
        assert_eq!(labels, vec![Label::Professional, Label::Other]);
    }

    #[test]
    fn test_parse_roundtrip() {
        for label in Label::ALL {
            assert_eq!(Label::parse(label.as_str()), Some(label));
        }
        assert_eq!(Label::parse("professional"), Some(Label::Professional));
        assert_eq!(Label::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_serde_screaming_snake_case() {
        let json = serde_json::to_string(&Label::IssuerAdvanced).unwrap();
        assert_eq!(json, "\"ISSUER_ADVANCED\"");
        let back: Label = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Label::IssuerAdvanced);
    }
}
