//! Article lines from free text.
//!
//! Each non-empty line is tried against four patterns, first match wins:
//! 1. tabular row `REF | designation | qty [unit]` (`|`, `;` or tab separated)
//! 2. reference marker `Réf: ABC-12 designation Qté: 5 [unit]`
//! 3. quantity first `10 x designation`, `10 pcs de designation`
//! 4. designation first `designation : 10 pcs`, `designation - 10 unités`

use std::sync::OnceLock;

use regex::Regex;

use crate::constants::{DEFAULT_UNIT, TABLE_HEADER_WORDS};
use crate::detection::contains_term;
use crate::types::{ArticleSource, ExtractedArticle};
use crate::util::{clean_cell, fold, parse_decimal};

/// Unit alternatives, longest first so `ml` wins over `m`.
const UNIT: &str = r"(?:pi[eè]ces?|pcs?|unit[ée]s?|exemplaires?|ex|m²|m2|ml|mm|m|kg|g|litres?|l|lots?|bo[iî]tes?|rouleaux?|paires?|sacs?|cartons?|u)";

/// Quantities above this are phone numbers, postcodes or order numbers.
const MAX_QUANTITY: f64 = 1_000_000.0;

/// Leading labels of lines that carry numbers but never articles.
const NON_ARTICLE_LABELS: &[&str] = &[
    "tel", "telephone", "fax", "mobile", "portable", "gsm", "siret", "siren", "tva",
    "date", "commande", "facture", "code postal", "cp", "n°", "no", "total", "montant",
    "le", "envoye", "sent",
];

fn re_tabular() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^\s*\|?\s*([A-Za-z0-9][\w./-]*)\s*[|;\t]\s*([^|;\t]+?)\s*[|;\t]\s*(\d+(?:[.,]\d+)?)\s*({UNIT})?\.?\s*(?:[|;\t].*)?$"
        ))
        .unwrap()
    })
}

fn re_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\br[ée]f(?:[ée]rence)?\.?\s*[:#]?\s*([A-Za-z0-9][\w./-]*)\s*[-:,]?\s*(.*?)\s*[-,;(]?\s*(?:qt[ée]|quantit[ée]|qty|quantity)\.?\s*[:=]?\s*(\d+(?:[.,]\d+)?)\s*({UNIT})?\b"
        ))
        .unwrap()
    })
}

fn re_quantity_first() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^\s*(?:[-*•]\s*)?(\d+(?:[.,]\d+)?)\s*(?:({UNIT})\b\.?\s*(?:de\s+|d'|d’|of\s+|x\s+)?|[x×]\s*)(.+?)\s*$"
        ))
        .unwrap()
    })
}

fn re_designation_first() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^\s*(?:[-*•]\s*)?(.+?)\s*(?:[:=–-]|\bx|×)\s*(\d+(?:[.,]\d+)?)\s*({UNIT})?\.?\s*$"
        ))
        .unwrap()
    })
}

/// Canonical unit for a raw unit token, `None` when unknown.
pub fn canonical_unit(raw: &str) -> Option<&'static str> {
    let folded = fold(raw.trim().trim_end_matches('.'));
    let unit = match folded.as_str() {
        "piece" | "pieces" | "pc" | "pcs" => "pcs",
        "u" | "unite" | "unites" => "u",
        "ex" | "exemplaire" | "exemplaires" => "ex",
        "m²" | "m2" => "m2",
        "ml" => "ml",
        "mm" => "mm",
        "m" => "m",
        "kg" => "kg",
        "g" => "g",
        "l" | "litre" | "litres" => "l",
        "lot" | "lots" => "lot",
        "boite" | "boites" => "boite",
        "rouleau" | "rouleaux" => "rouleau",
        "paire" | "paires" => "paire",
        "sac" | "sacs" => "sac",
        "carton" | "cartons" => "carton",
        _ => return None,
    };
    Some(unit)
}

/// Extract articles with the default unit for lines that name none.
pub fn extract_articles_from_text(text: &str, source: ArticleSource) -> Vec<ExtractedArticle> {
    extract_articles_with_unit(text, source, DEFAULT_UNIT)
}

/// Extract articles, falling back to `default_unit` when a line names none.
pub fn extract_articles_with_unit(
    text: &str,
    source: ArticleSource,
    default_unit: &str,
) -> Vec<ExtractedArticle> {
    let mut articles = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        // Signature delimiter: nothing below is an article list
        if line.trim_end() == "--" {
            break;
        }
        let trimmed = line.trim().trim_start_matches('>').trim();
        if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        if is_table_header(trimmed) || trimmed.contains('@') {
            continue;
        }

        if let Some(parsed) = parse_line(trimmed) {
            if parsed.quantity <= 0.0 || parsed.quantity > MAX_QUANTITY {
                continue;
            }
            let unit = parsed
                .unit
                .as_deref()
                .and_then(canonical_unit)
                .unwrap_or(default_unit)
                .to_string();
            articles.push(ExtractedArticle {
                reference: parsed.reference,
                designation: parsed.designation,
                quantity: parsed.quantity,
                unit,
                source,
                line_number: idx + 1,
            });
        }
    }

    log::debug!("Extracted {} article(s) from {:?} text", articles.len(), source);
    articles
}

struct ParsedLine {
    reference: Option<String>,
    designation: String,
    quantity: f64,
    unit: Option<String>,
}

fn parse_line(line: &str) -> Option<ParsedLine> {
    parse_tabular(line)
        .or_else(|| parse_reference(line))
        .or_else(|| parse_quantity_first(line))
        .or_else(|| parse_designation_first(line))
}

fn parse_tabular(line: &str) -> Option<ParsedLine> {
    let caps = re_tabular().captures(line)?;
    let reference = caps[1].to_string();
    let designation = clean_cell(&caps[2]);
    if !reference.chars().any(|c| c.is_ascii_digit()) || !has_letter(&designation) {
        return None;
    }
    Some(ParsedLine {
        reference: Some(reference),
        designation,
        quantity: parse_decimal(&caps[3])?,
        unit: caps.get(4).map(|m| m.as_str().to_string()),
    })
}

fn parse_reference(line: &str) -> Option<ParsedLine> {
    let caps = re_reference().captures(line)?;
    let reference = caps[1].to_string();
    let designation = clean_cell(&caps[2]);
    Some(ParsedLine {
        designation: if has_letter(&designation) {
            designation
        } else {
            reference.clone()
        },
        reference: Some(reference),
        quantity: parse_decimal(&caps[3])?,
        unit: caps.get(4).map(|m| m.as_str().to_string()),
    })
}

fn parse_quantity_first(line: &str) -> Option<ParsedLine> {
    let caps = re_quantity_first().captures(line)?;
    let designation = clean_cell(&caps[3]);
    if designation.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return None;
    }
    Some(ParsedLine {
        reference: None,
        designation,
        quantity: parse_decimal(&caps[1])?,
        unit: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

fn parse_designation_first(line: &str) -> Option<ParsedLine> {
    let caps = re_designation_first().captures(line)?;
    let designation = clean_cell(&caps[1]);
    if designation.chars().filter(|c| c.is_alphabetic()).count() < 2 || is_label(&designation) {
        return None;
    }
    Some(ParsedLine {
        reference: None,
        designation,
        quantity: parse_decimal(&caps[2])?,
        unit: caps.get(3).map(|m| m.as_str().to_string()),
    })
}

fn has_letter(text: &str) -> bool {
    text.chars().any(|c| c.is_alphabetic())
}

fn is_label(designation: &str) -> bool {
    let folded = fold(designation);
    NON_ARTICLE_LABELS
        .iter()
        .any(|label| folded == fold(label) || folded.starts_with(&format!("{} ", fold(label))))
}

/// A separated row made of header words ("Réf | Désignation | Qté").
fn is_table_header(line: &str) -> bool {
    if !line.contains(['|', ';', '\t']) {
        return false;
    }
    let folded = fold(line);
    TABLE_HEADER_WORDS
        .iter()
        .filter(|w| contains_term(&folded, w))
        .count()
        >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<ExtractedArticle> {
        extract_articles_from_text(text, ArticleSource::Email)
    }

    #[test]
    fn test_tabular_rows() {
        let text = "Référence | Désignation | Quantité\nVM6-20 | Vis inox M6x20 | 100\nJT-12; Joint torique 12mm; 25 pcs";
        let articles = extract(text);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].reference.as_deref(), Some("VM6-20"));
        assert_eq!(articles[0].designation, "Vis inox M6x20");
        assert_eq!(articles[0].quantity, 100.0);
        assert_eq!(articles[0].unit, "pcs");
        assert_eq!(articles[0].line_number, 2);
        assert_eq!(articles[1].reference.as_deref(), Some("JT-12"));
        assert_eq!(articles[1].quantity, 25.0);
    }

    #[test]
    fn test_reference_marker() {
        let articles = extract("Réf: ABC-123 Roulement à billes Qté: 5 unités");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].reference.as_deref(), Some("ABC-123"));
        assert_eq!(articles[0].designation, "Roulement à billes");
        assert_eq!(articles[0].quantity, 5.0);
        assert_eq!(articles[0].unit, "u");
    }

    #[test]
    fn test_reference_without_designation_uses_reference() {
        let articles = extract("Ref. XK-900 qty 3");
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].designation, "XK-900");
    }

    #[test]
    fn test_quantity_first() {
        let text = "- 10 x Vis M6\n- 3 pièces de Flasque acier\n2,5 m Câble 3G1.5";
        let articles = extract(text);
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].designation, "Vis M6");
        assert_eq!(articles[0].unit, "pcs");
        assert_eq!(articles[1].designation, "Flasque acier");
        assert_eq!(articles[1].quantity, 3.0);
        assert_eq!(articles[2].quantity, 2.5);
        assert_eq!(articles[2].unit, "m");
        assert_eq!(articles[2].designation, "Câble 3G1.5");
    }

    #[test]
    fn test_designation_first() {
        let text = "Plaque alu 2mm : 4\nGaine thermo - 12 m\nPeinture epoxy x 3 litres";
        let articles = extract(text);
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].designation, "Plaque alu 2mm");
        assert_eq!(articles[0].quantity, 4.0);
        assert_eq!(articles[1].unit, "m");
        assert_eq!(articles[2].designation, "Peinture epoxy");
        assert_eq!(articles[2].unit, "l");
    }

    #[test]
    fn test_noise_lines_skipped() {
        let text = "Bonjour,\nTél : 0612345678\nDate : 12\nMerci de votre retour.\nContact: jean@acme.fr 12\n";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn test_zero_quantity_skipped() {
        assert!(extract("Vis M8 : 0").is_empty());
    }

    #[test]
    fn test_stops_at_signature() {
        let text = "5 x Boulon M10\n--\nJean Dupont\n01 23 45 67 89";
        let articles = extract(text);
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn test_default_unit_override() {
        let articles = extract_articles_with_unit("Tube PVC : 6", ArticleSource::Pdf, "u");
        assert_eq!(articles[0].unit, "u");
        assert_eq!(articles[0].source, ArticleSource::Pdf);
    }

    #[test]
    fn test_canonical_unit() {
        assert_eq!(canonical_unit("Pièces"), Some("pcs"));
        assert_eq!(canonical_unit("unités"), Some("u"));
        assert_eq!(canonical_unit("m²"), Some("m2"));
        assert_eq!(canonical_unit("Boîtes"), Some("boite"));
        assert_eq!(canonical_unit("furlong"), None);
    }
}
