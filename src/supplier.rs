//! Supplier tariff extraction and matching.
//!
//! Tariff lines need a reference-like token and a marked price (`12,50 €`,
//! `EUR 12.50`, `PU: 12,50`). Table rows rendered as `a | b | c` (spreadsheet
//! exports, DOCX tables) are read cell by cell. A delay on a line without a
//! price ("Délai : 3 semaines") applies to every product that has none.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::documents::{extract_text, ExtractError};
use crate::extract::delivery::delay_to_days;
use crate::util::{clean_cell, fold, parse_decimal};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierProduct {
    pub reference: String,
    pub designation: String,
    pub unit_price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_days: Option<u32>,
    pub line_number: usize,
}

/// A supplier product matched to a requested article.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierMatch<'a> {
    pub product: &'a SupplierProduct,
    /// 1.0 for a reference match, else Jaro-Winkler similarity of designations.
    pub score: f64,
}

const AMOUNT: &str = r"\d+(?:[ \x{a0}\x{202f}]\d{3})*(?:[.,]\d{1,4})?";

fn re_price_after() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)({AMOUNT})\s*(€|\beuros?\b|\beur\b|\bchf\b|\busd\b|\$|£|\bgbp\b)"
        ))
        .unwrap()
    })
}

fn re_price_before() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)(€|\beur\b|\bchf\b|\busd\b|\$|£|\bgbp\b)\s*({AMOUNT})")).unwrap()
    })
}

fn re_price_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)(?:\bp\.?u\b\.?|\bprix unitaire|\bprix|\bunit price|\bprice)\s*(?:ht\s*)?[:=]\s*({AMOUNT})\s*(€|\beuros?\b|\beur\b|\bchf\b|\busd\b|\$|£|\bgbp\b)?"
        ))
        .unwrap()
    })
}

/// Delay with an explicit label, on folded text.
fn re_delay_labelled() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:delai|lead time|delivery)(?:\s+de\s+livraison)?\s*(?:de\s*)?[:=]?\s*(\d{1,3})\s*(jours?|j|semaines?|sem|mois|days?|weeks?|months?)\b",
        )
        .unwrap()
    })
}

/// Same as the labelled delay, on unfolded text.
fn re_delay_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:d[ée]lai|lead time|delivery)(?:\s+de\s+livraison)?\s*(?:de\s*)?[:=]?\s*(\d{1,3})\s*(jours?|j|semaines?|sem|mois|days?|weeks?|months?)\b",
        )
        .unwrap()
    })
}

/// Bare delay cell such as "3 semaines", on folded text.
fn re_delay_cell() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\s*(jours?|j|semaines?|sem|mois|days?|weeks?|months?)$").unwrap()
    })
}

fn re_reference_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\br[ée]f(?:[ée]rence)?\.?\s*[:#]?\s*([A-Za-z0-9][\w./-]*)").unwrap())
}

fn re_labels() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:\bp\.?u\b\.?|\bprix unitaire|\bprix\b|\bunit price|\bprice|\bht\b|\br[ée]f(?:[ée]rence)?\.?)\s*[:=#]?")
            .unwrap()
    })
}

fn re_bare_price() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.,]\d{1,4}$").unwrap())
}

/// Extract tariff lines using the default currency.
pub fn extract_supplier_products(text: &str) -> Vec<SupplierProduct> {
    extract_supplier_products_with(text, &Config::default().default_currency)
}

/// Extract tariff lines; prices without a currency marker get `default_currency`.
pub fn extract_supplier_products_with(text: &str, default_currency: &str) -> Vec<SupplierProduct> {
    let mut products = Vec::new();
    let mut file_delay: Option<u32> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim().trim_matches('|').trim();
        if trimmed.is_empty() || !trimmed.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }

        let parsed = if trimmed.contains(['|', ';', '\t']) {
            parse_row(trimmed, default_currency)
        } else {
            parse_free_line(trimmed, default_currency)
        };

        match parsed {
            Some(mut product) => {
                product.line_number = idx + 1;
                products.push(product);
            }
            None => {
                if file_delay.is_none() {
                    file_delay = find_delay(&fold(trimmed));
                }
            }
        }
    }

    if let Some(days) = file_delay {
        for product in products.iter_mut().filter(|p| p.delivery_days.is_none()) {
            product.delivery_days = Some(days);
        }
    }

    log::info!("Parsed {} supplier tariff line(s)", products.len());
    products
}

/// Read a tariff file (XLSX, CSV, PDF, DOCX, ...) and extract its products.
pub fn extract_supplier_file(
    path: &Path,
    config: &Config,
) -> Result<Vec<SupplierProduct>, ExtractError> {
    let text = extract_text(path, usize::MAX)?;
    log::info!("Reading supplier tariff {}", path.display());
    Ok(extract_supplier_products_with(&text, &config.default_currency))
}

/// Best supplier product for a requested article.
///
/// An exact (case-insensitive) reference match wins outright; otherwise the
/// designation with the highest Jaro-Winkler similarity at or above
/// `threshold` is returned.
pub fn match_supplier_product<'a>(
    reference: Option<&str>,
    designation: &str,
    products: &'a [SupplierProduct],
    threshold: f64,
) -> Option<SupplierMatch<'a>> {
    if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
        if let Some(product) = products
            .iter()
            .find(|p| p.reference.eq_ignore_ascii_case(reference))
        {
            return Some(SupplierMatch {
                product,
                score: 1.0,
            });
        }
    }

    let wanted = fold(designation);
    if wanted.trim().is_empty() {
        return None;
    }

    products
        .iter()
        .map(|product| SupplierMatch {
            product,
            score: strsim::jaro_winkler(&wanted, &fold(&product.designation)),
        })
        .filter(|m| m.score >= threshold)
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

// ---------------------------------------------------------------------------
// Line parsers
// ---------------------------------------------------------------------------

fn parse_row(line: &str, default_currency: &str) -> Option<SupplierProduct> {
    let cells: Vec<String> = line
        .split(['|', ';', '\t'])
        .map(clean_cell)
        .filter(|c| !c.is_empty())
        .collect();

    let mut reference = None;
    let mut designation = None;
    let mut price = None;
    let mut delay = None;

    for cell in &cells {
        let folded = fold(cell);
        if price.is_none() {
            if let Some(found) = find_price(cell, default_currency) {
                price = Some(found);
                continue;
            }
            if re_bare_price().is_match(cell) {
                price = parse_decimal(cell).map(|v| (v, default_currency.to_string()));
                continue;
            }
        }
        if delay.is_none() {
            if let Some(days) = find_delay(&folded).or_else(|| {
                re_delay_cell()
                    .captures(&folded)
                    .and_then(|caps| delay_to_days(&caps[1], &caps[2]))
            }) {
                delay = Some(days);
                continue;
            }
        }
        if reference.is_none() && is_reference_token(cell) {
            reference = Some(cell.clone());
            continue;
        }
        if designation.is_none() && cell.chars().filter(|c| c.is_alphabetic()).count() >= 2 {
            designation = Some(cell.clone());
        }
    }

    let reference = reference?;
    let (unit_price, currency) = price?;
    Some(SupplierProduct {
        designation: designation.unwrap_or_else(|| reference.clone()),
        reference,
        unit_price,
        currency,
        delivery_days: delay,
        line_number: 0,
    })
}

fn parse_free_line(line: &str, default_currency: &str) -> Option<SupplierProduct> {
    let (unit_price, currency) = find_price(line, default_currency)?;

    let reference = re_reference_marker()
        .captures(line)
        .map(|caps| caps[1].to_string())
        .filter(|r| is_reference_token(r))
        .or_else(|| {
            line.split_whitespace()
                .next()
                .filter(|t| is_reference_token(t))
                .map(str::to_string)
        })?;

    // Designation: the line minus reference, price, delay and labels
    let mut rest = line.replacen(&reference, "", 1);
    for re in [re_price_label(), re_price_after(), re_price_before()] {
        rest = re.replace(&rest, "").to_string();
    }
    if let Some(m) = re_delay_marker().find(&rest) {
        rest.truncate(m.start());
    }
    rest = re_labels().replace_all(&rest, " ").to_string();
    let designation = clean_cell(&rest);

    Some(SupplierProduct {
        designation: if designation.chars().any(|c| c.is_alphabetic()) {
            designation
        } else {
            reference.clone()
        },
        reference,
        unit_price,
        currency,
        delivery_days: find_delay(&fold(line)),
        line_number: 0,
    })
}

fn find_price(text: &str, default_currency: &str) -> Option<(f64, String)> {
    if let Some(caps) = re_price_label().captures(text) {
        let value = parse_decimal(&caps[1])?;
        let currency = caps
            .get(2)
            .map(|m| currency_code(m.as_str()))
            .unwrap_or_else(|| default_currency.to_string());
        return Some((value, currency));
    }
    if let Some(caps) = re_price_after().captures(text) {
        return Some((parse_decimal(&caps[1])?, currency_code(&caps[2])));
    }
    if let Some(caps) = re_price_before().captures(text) {
        return Some((parse_decimal(&caps[2])?, currency_code(&caps[1])));
    }
    None
}

fn find_delay(folded: &str) -> Option<u32> {
    re_delay_labelled()
        .captures(folded)
        .and_then(|caps| delay_to_days(&caps[1], &caps[2]))
}

fn currency_code(marker: &str) -> String {
    match marker.to_lowercase().as_str() {
        "€" | "eur" | "euro" | "euros" => "EUR",
        "$" | "usd" => "USD",
        "£" | "gbp" => "GBP",
        "chf" => "CHF",
        other => return other.to_uppercase(),
    }
    .to_string()
}

/// Reference-like token: `[A-Za-z0-9./_-]`, at least 3 chars, contains a
/// digit, and is not itself a decimal price.
fn is_reference_token(token: &str) -> bool {
    token.len() >= 3
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '/' | '_'))
        && token.chars().any(|c| c.is_ascii_digit())
        && !re_bare_price().is_match(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheet_rows() {
        let text = "## Tarif 2025\nRéférence | Désignation | Prix HT | Délai\nVM6-20 | Vis inox M6x20 | 0.12 | 2 semaines\nJT-12 | Joint torique 12mm | 1,45 € | 5 jours\n";
        let products = extract_supplier_products(text);
        assert_eq!(products.len(), 2);

        assert_eq!(products[0].reference, "VM6-20");
        assert_eq!(products[0].designation, "Vis inox M6x20");
        assert_eq!(products[0].unit_price, 0.12);
        assert_eq!(products[0].currency, "EUR");
        assert_eq!(products[0].delivery_days, Some(14));
        assert_eq!(products[0].line_number, 3);

        assert_eq!(products[1].unit_price, 1.45);
        assert_eq!(products[1].delivery_days, Some(5));
    }

    #[test]
    fn test_free_text_lines() {
        let text = "Offre fournisseur\nRéf: RLT-6204 Roulement 6204 2RS PU: 3,45 EUR délai 10 jours\nAB-778 Courroie crantée 1 250,00 €\n";
        let products = extract_supplier_products(text);
        assert_eq!(products.len(), 2);

        assert_eq!(products[0].reference, "RLT-6204");
        assert_eq!(products[0].designation, "Roulement 6204 2RS");
        assert_eq!(products[0].unit_price, 3.45);
        assert_eq!(products[0].delivery_days, Some(10));

        assert_eq!(products[1].reference, "AB-778");
        assert_eq!(products[1].designation, "Courroie crantée");
        assert_eq!(products[1].unit_price, 1250.0);
    }

    #[test]
    fn test_designation_cut_with_non_latin_text() {
        let products = extract_supplier_products("KR-100 Capteur 한국 PU: 5,00 EUR Délai 10 jours");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].designation, "Capteur 한국");
        assert_eq!(products[0].unit_price, 5.0);
        assert_eq!(products[0].delivery_days, Some(10));
    }

    #[test]
    fn test_file_wide_delay_and_currency() {
        let text = "Délai de livraison : 3 semaines\nX-100 Moteur brushless USD 89.90\nX-200 Variateur $ 120\n";
        let products = extract_supplier_products(text);
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.delivery_days == Some(21)));
        assert!(products.iter().all(|p| p.currency == "USD"));
        assert_eq!(products[1].unit_price, 120.0);
    }

    #[test]
    fn test_lines_without_price_or_reference_are_skipped() {
        let text = "Tel 04 72 00 00 00\nVis sans référence 2,50 €\nMerci de votre confiance";
        assert!(extract_supplier_products(text).is_empty());
    }

    #[test]
    fn test_match_by_reference_first() {
        let products = extract_supplier_products("VM6-20 | Vis inox M6x20 | 0,12 €\nVM8-20 | Vis inox M8x20 | 0,18 €");
        let m = match_supplier_product(Some("vm8-20"), "n'importe quoi", &products, 0.85).unwrap();
        assert_eq!(m.product.reference, "VM8-20");
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn test_match_by_designation() {
        let products = extract_supplier_products("VM6-20 | Vis inox M6x20 | 0,12 €\nRLT-1 | Roulement à billes | 3,00 €");
        let m = match_supplier_product(None, "roulement a bille", &products, 0.85).unwrap();
        assert_eq!(m.product.reference, "RLT-1");
        assert!(m.score >= 0.85);

        assert!(match_supplier_product(None, "peinture", &products, 0.85).is_none());
        assert!(match_supplier_product(None, "", &products, 0.0).is_none());
    }

    #[test]
    fn test_supplier_file_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tarif.csv");
        std::fs::write(&path, "ref;designation;prix\nP-001;Patin caoutchouc;2,10 €\n").unwrap();

        let products = extract_supplier_file(&path, &Config::default()).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].reference, "P-001");
        assert_eq!(products[0].unit_price, 2.1);
    }
}
