// src/services/classifier.rs

//! Classifier collaborator: trait contract plus the OpenAI-compatible
//! chat adapter.
//!
//! The adapter does not interpret the page; it packages the page and the
//! rule signals into a prompt, demands strict JSON back, and coerces the
//! reply into a well-shaped `Verdict`. Semantic validation happens later
//! in the validator/reconciler.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{ClassifierConfig, Label, PagePackage, Verdict};
use crate::services::rules::RuleMatch;

/// Characters of normalized text offered to the model.
const EXCERPT_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a page classifier for an exchange website. \
Assign each page one or more audience labels: INVESTOR_BEGINNER, INVESTOR_QUALIFIED, \
ISSUER_BEGINNER, ISSUER_ADVANCED, PROFESSIONAL, OTHER. \
If a page fits multiple audiences, return multiple labels. \
If a page is OTHER, return exactly [\"OTHER\"] and nothing else. \
Return ONLY a JSON object with fields: labels (array of strings), \
confidence (0.0-1.0), rationale (string), evidence (array of \"field=value\" strings). \
No markdown, no code fences, no prose around the JSON.";

/// Collaborator that produces an external classification verdict.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a page given the page package and rule signals as hints.
    async fn classify(&self, page: &PagePackage, rule_hint: &[RuleMatch]) -> Result<Verdict>;

    /// Identifier recorded as `model_version` in output records.
    fn model_version(&self) -> String;
}

/// OpenAI-compatible chat-completions classifier.
pub struct LlmClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
    api_key: Option<String>,
}

impl LlmClassifier {
    /// Build the adapter, reading the API key from the configured
    /// environment variable. A missing key is not an error here; each
    /// classify call then reports the classifier as unavailable so that
    /// offline runs still produce rule-only records.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} not set; records will carry rule-only labels",
                config.api_key_env
            );
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn user_prompt(page: &PagePackage, rule_hint: &[RuleMatch]) -> String {
        let excerpt: String = page.normalized_text.chars().take(EXCERPT_CHARS).collect();
        let hints: Vec<String> = rule_hint
            .iter()
            .map(|m| format!("{} -> {}", m.rule_id, m.label))
            .collect();
        let package = json!({
            "url": page.url,
            "final_url": page.final_url,
            "title": page.meta.title,
            "description": page.meta.description,
            "lang": page.meta.lang,
            "text_excerpt": excerpt,
            "term_scores": page.term_scores,
            "rule_hints": hints,
        });
        format!(
            "Classify this page. Use rule_hints and term_scores as supporting \
             evidence, not the primary factor.\n\nPage package:\n{package}"
        )
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, page: &PagePackage, rule_hint: &[RuleMatch]) -> Result<Verdict> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::classifier("no API key configured"));
        };

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": Self::user_prompt(page, rule_hint) },
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::classifier(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::classifier(format!(
                "API returned {status}: {text}"
            )));
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::classifier(format!("bad response body: {e}")))?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::classifier("empty completion content"))?;

        parse_verdict(content)
    }

    fn model_version(&self) -> String {
        self.config.model.clone()
    }
}

/// Parse a model reply into a verdict, tolerating markdown code fences and
/// prose around the JSON object.
pub fn parse_verdict(raw: &str) -> Result<Verdict> {
    let json_text = extract_json_object(raw)
        .ok_or_else(|| AppError::classifier("no JSON object in reply"))?;
    let value: serde_json::Value = serde_json::from_str(json_text)
        .map_err(|e| AppError::classifier(format!("invalid JSON in reply: {e}")))?;

    // Accept both "labels" and a legacy singular "label"
    let labels_value = value.get("labels").or_else(|| value.get("label"));
    let raw_labels: Vec<String> = match labels_value {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        _ => vec![],
    };

    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);
    let rationale = value
        .get("rationale")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let evidence = value
        .get("evidence")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Verdict {
        labels: coerce_labels(&raw_labels),
        confidence,
        rationale,
        evidence,
    })
}

/// Coerce free-form label strings into the fixed enum: unknown labels are
/// dropped, OTHER never survives alongside another label, and an empty
/// result becomes exactly [OTHER].
pub fn coerce_labels(raw: &[String]) -> Vec<Label> {
    let mut labels: Vec<Label> = raw.iter().filter_map(|s| Label::parse(s)).collect();
    Label::sort_by_priority(&mut labels);
    if labels.len() > 1 {
        labels.retain(|&l| l != Label::Other);
    }
    if labels.is_empty() {
        labels.push(Label::Other);
    }
    labels
}

/// First balanced `{...}` object in the text, fences and prose ignored.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
