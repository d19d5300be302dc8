// src/services/rules.rs

//! Rule engine: deterministic, data-driven label signals.
//!
//! Compiles a versioned ruleset once, then evaluates every rule against a
//! page package. Pure and stateless after construction; safe for any
//! number of concurrent callers.

use regex::Regex;

use crate::error::Result;
use crate::models::{Label, PagePackage, Rule, Ruleset, TermScores};

/// One rule that matched a page. Ephemeral; never persisted standalone.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    pub rule_id: String,
    pub label: Label,
    pub priority_rank: u8,
    pub term_scores_snapshot: TermScores,
}

struct CompiledRule {
    rule: Rule,
    url_pattern: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, page: &PagePackage) -> bool {
        if let Some(pattern) = &self.url_pattern {
            if !pattern.is_match(&page.url) && !pattern.is_match(&page.final_url) {
                return false;
            }
        }

        if let Some(needles) = &self.rule.meta_contains {
            let haystack = format!(
                "{} {}",
                page.meta.title.as_deref().unwrap_or(""),
                page.meta.description.as_deref().unwrap_or("")
            )
            .to_lowercase();
            if !needles
                .iter()
                .any(|needle| haystack.contains(&needle.to_lowercase()))
            {
                return false;
            }
        }

        if let Some(min_score) = self.rule.min_term_score {
            if page.term_scores.get(self.rule.label) < min_score {
                return false;
            }
        }

        true
    }
}

/// Evaluates a compiled ruleset against page packages.
pub struct RuleEngine {
    version: String,
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Compile a ruleset. Fails on an invalid ruleset or a bad url_pattern.
    pub fn new(ruleset: &Ruleset) -> Result<Self> {
        ruleset.validate()?;

        let mut rules = Vec::with_capacity(ruleset.rules.len());
        for rule in &ruleset.rules {
            let url_pattern = rule
                .url_pattern
                .as_deref()
                .map(Regex::new)
                .transpose()?;
            rules.push(CompiledRule {
                rule: rule.clone(),
                url_pattern,
            });
        }

        Ok(Self {
            version: ruleset.version.clone(),
            rules,
        })
    }

    /// Version of the compiled ruleset.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Evaluate all rules against a page.
    ///
    /// Every non-OTHER rule is checked (no short-circuit), so a page can
    /// match rules for multiple labels. OTHER rules are the fallback and
    /// are only consulted when nothing else matched; the reconciler remains
    /// the enforcement point for the exclusivity invariant.
    ///
    /// Output is ordered by descending label priority, ties broken by
    /// rule_id ascending, which fixes `matched_rules` ordering in records.
    pub fn evaluate(&self, page: &PagePackage) -> Vec<RuleMatch> {
        let mut matches: Vec<RuleMatch> = self
            .rules
            .iter()
            .filter(|c| c.rule.label != Label::Other)
            .filter(|c| c.matches(page))
            .map(|c| self.to_match(c, page))
            .collect();

        if matches.is_empty() {
            matches = self
                .rules
                .iter()
                .filter(|c| c.rule.label == Label::Other)
                .filter(|c| c.matches(page))
                .map(|c| self.to_match(c, page))
                .collect();
        }

        matches.sort_by(|a, b| {
            b.priority_rank
                .cmp(&a.priority_rank)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        matches
    }

    fn to_match(&self, compiled: &CompiledRule, page: &PagePackage) -> RuleMatch {
        RuleMatch {
            rule_id: compiled.rule.id.clone(),
            label: compiled.rule.label,
            priority_rank: compiled.rule.label.priority_rank(),
            term_scores_snapshot: page.term_scores,
        }
    }
}
