//! Quote-request detection.
//!
//! Scans subject, body and attachment text against fixed keyword and phrase
//! lists plus quantity patterns. Each rule kind fires at most once; the
//! confidence tier is the number of fired rules.
//! Priority: a subject keyword alone is enough to flag a quote.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;
use crate::constants::{QUOTE_BODY_KEYWORDS, QUOTE_BODY_PHRASES, QUOTE_SUBJECT_KEYWORDS};
use crate::types::{Confidence, DetectionResult, DetectionRule, RuleKind};
use crate::util::fold;

// Patterns run on folded text (lowercase, no accents).
fn re_quantities() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"\b\d+(?:[.,]\d+)?\s*(?:pcs|pc|pieces?|unites?|exemplaires?|ex)\b",
            r"\b(?:qte|quantite|qty|quantity)\s*[:=]?\s*\d+",
            r"(?m)^\s*[-*]?\s*\d+\s*[x×]\s+\S",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Whether `term` occurs in `haystack` on word boundaries. Both must be folded.
pub(crate) fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(term) {
        let begin = start + pos;
        let end = begin + term.len();
        let before_ok = haystack[..begin].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return true;
        }
        start = begin + haystack[begin..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// First term from the built-in list or the extras that appears in `text`.
fn first_term(text: &str, builtin: &[&str], extra: &[String]) -> Option<String> {
    builtin
        .iter()
        .map(|s| s.to_string())
        .chain(extra.iter().map(|s| fold(s)))
        .find(|term| contains_term(text, term))
}

/// Detect a quote request with the default keyword lists.
pub fn detect_quote_request(
    subject: &str,
    body: &str,
    attachment_texts: &[String],
) -> DetectionResult {
    detect_quote_request_with(subject, body, attachment_texts, &Config::default())
}

/// Detect a quote request, adding the configured extra keywords and phrases.
pub fn detect_quote_request_with(
    subject: &str,
    body: &str,
    attachment_texts: &[String],
    config: &Config,
) -> DetectionResult {
    let subject = fold(subject);
    let body = fold(body);
    let mut rules = Vec::new();

    let subject_hit = first_term(&subject, QUOTE_SUBJECT_KEYWORDS, &config.extra_quote_keywords);
    if let Some(matched) = subject_hit.clone() {
        rules.push(DetectionRule {
            kind: RuleKind::SubjectKeyword,
            matched,
        });
    }

    if let Some(matched) = first_term(&body, QUOTE_BODY_KEYWORDS, &config.extra_quote_keywords) {
        rules.push(DetectionRule {
            kind: RuleKind::BodyKeyword,
            matched,
        });
    }

    if let Some(matched) = first_term(&body, QUOTE_BODY_PHRASES, &config.extra_quote_phrases) {
        rules.push(DetectionRule {
            kind: RuleKind::BodyPhrase,
            matched,
        });
    }

    if let Some(m) = re_quantities().iter().find_map(|re| re.find(&body)) {
        rules.push(DetectionRule {
            kind: RuleKind::QuantityPattern,
            matched: m.as_str().trim().to_string(),
        });
    }

    for text in attachment_texts {
        let folded = fold(text);
        let hit = first_term(&folded, QUOTE_SUBJECT_KEYWORDS, &config.extra_quote_keywords)
            .or_else(|| first_term(&folded, QUOTE_BODY_KEYWORDS, &[]));
        if let Some(matched) = hit {
            rules.push(DetectionRule {
                kind: RuleKind::AttachmentKeyword,
                matched,
            });
            break;
        }
    }

    let score = rules.len();
    let is_quote = subject_hit.is_some() || score >= config.min_rules_for_quote;

    log::debug!(
        "Quote detection: is_quote={} score={} rules={:?}",
        is_quote,
        score,
        rules.iter().map(|r| r.kind).collect::<Vec<_>>()
    );

    DetectionResult {
        is_quote,
        confidence: Confidence::from_rule_count(score),
        matched_rules: rules,
        score,
    }
}
