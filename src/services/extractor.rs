// src/services/extractor.rs

//! Deterministic page extraction.
//!
//! Converts raw fetched/rendered HTML into the canonical `PagePackage`:
//! boilerplate-stripped normalized text, head metadata, per-category term
//! scores, a stable content hash, and outbound links in document order.
//! Pure and stateless; identical input always yields an identical package.
//! Never fails: malformed HTML degrades to best-effort text extraction.

use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::models::{FetchMode, PageMeta, PagePackage, TermDictionary, TermScores};
use crate::models::Label;
use crate::utils;

/// Elements whose subtrees carry boilerplate, not content.
const EXCLUDED_TAGS: [&str; 7] = [
    "script", "style", "nav", "header", "footer", "noscript", "template",
];

/// Fetch context the extractor passes through unmodified.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub url: String,
    pub final_url: String,
    pub http_status: u16,
    pub fetch_mode: FetchMode,
}

/// Stateless extractor parameterized by the loaded term dictionary.
pub struct Extractor {
    terms: TermDictionary,
}

impl Extractor {
    pub fn new(terms: TermDictionary) -> Self {
        Self { terms }
    }

    /// Build a page package from raw HTML and its fetch context.
    pub fn extract(&self, raw_html: &str, ctx: &FetchContext) -> PagePackage {
        let document = Html::parse_document(raw_html);

        let normalized_text = normalize_text(&visible_text(&document));
        let meta = extract_meta(&document);
        let term_scores = self.score_terms(&normalized_text);
        let content_hash = content_hash(&normalized_text);
        let extracted_links = extract_links(&document, &ctx.final_url);

        PagePackage {
            url: ctx.url.clone(),
            final_url: ctx.final_url.clone(),
            http_status: ctx.http_status,
            fetch_mode: ctx.fetch_mode,
            raw_text: raw_html.to_string(),
            normalized_text,
            meta,
            term_scores,
            content_hash,
            extracted_links,
        }
    }

    /// Normalized occurrence count of each category's dictionary terms:
    /// total matches divided by the document word count.
    fn score_terms(&self, normalized_text: &str) -> TermScores {
        let word_count = normalized_text.unicode_words().count();
        let mut scores = TermScores::default();
        if word_count == 0 {
            return scores;
        }

        for label in Label::ALL {
            let terms = self.terms.terms_for(label);
            if terms.is_empty() {
                continue;
            }
            let hits: usize = terms
                .iter()
                .map(|term| normalized_text.matches(term.to_lowercase().as_str()).count())
                .sum();
            scores.set(label, hits as f64 / word_count as f64);
        }
        scores
    }
}

/// Hex SHA-256 over the normalized text, the replay-comparison key.
pub fn content_hash(normalized_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Visible text of the document: body preferred, whole document as the
/// malformed-HTML fallback, with boilerplate subtrees excluded.
fn visible_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").expect("static selector");
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    push_visible_text(root, &mut out);
    out
}

fn push_visible_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !EXCLUDED_TAGS.contains(&child_el.value().name()) {
                push_visible_text(child_el, out);
            }
        }
    }
}

/// Collapse whitespace and case-fold.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn extract_meta(document: &Html) -> PageMeta {
    let title_sel = Selector::parse("title").expect("static selector");
    let desc_sel =
        Selector::parse("meta[name=description], meta[property=\"og:description\"]")
            .expect("static selector");
    let html_sel = Selector::parse("html").expect("static selector");

    let title = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty());

    let description = document
        .select(&desc_sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let lang = document
        .select(&html_sel)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    PageMeta {
        title,
        description,
        lang,
    }
}

/// Outbound absolute http(s) links in document order, deduplicated within
/// the page. mailto/javascript/tel and bare fragments never survive the
/// normalization step.
fn extract_links(document: &Html, base_url: &str) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").expect("static selector");
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&link_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if href.trim().is_empty() || href.trim_start().starts_with('#') {
            continue;
        }
        let Some(link) = utils::resolve_and_normalize(&base, href) else {
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    links
}
