use unicode_normalization::UnicodeNormalization;

/// Lowercase and strip diacritics so keyword matching ignores accents.
///
/// Example: "Quantité Désirée" → "quantite desiree"
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Parse a number written the French or English way.
///
/// Accepts "12", "2,5", "1 250,00", "1.250,00", "1,250.00" and non-breaking spaces.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{202f}' && *c != '\'')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        // Both present: the rightmost one is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            // A single comma is always the decimal separator ("1,250" → 1.25).
            if cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                let (int, frac) = cleaned.split_at(c);
                format!("{}.{}", int, &frac[1..])
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Derive a display name from an email address (best-effort).
///
/// Example: "sarah.chen@acme.com" → "Sarah Chen"
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local
        .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
        .filter(|s| !s.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive an organization name from an email domain (best-effort).
///
/// Example: "sarah.chen@acme.com" → "Acme"
pub fn org_from_email(email: &str) -> String {
    let domain = email.split('@').nth(1).unwrap_or("");
    let org_part = domain.split('.').next().unwrap_or(domain);
    capitalize(org_part)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Collapse runs of whitespace and trim separators left over from table cells.
pub fn clean_cell(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c == ':' || c == '|' || c == ';' || c == ',')
        .trim()
        .to_string()
}

/// Truncate text at a safe UTF-8 boundary.
pub fn truncate_text(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut result = text[..end].to_string();
    result.push_str("\n\n[... content truncated ...]");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_accents() {
        assert_eq!(fold("Quantité Désirée"), "quantite desiree");
        assert_eq!(fold("DEVIS"), "devis");
        assert_eq!(fold("Pièces"), "pieces");
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(parse_decimal("12"), Some(12.0));
        assert_eq!(parse_decimal("2,5"), Some(2.5));
        assert_eq!(parse_decimal("1 250,00"), Some(1250.0));
        assert_eq!(parse_decimal("1.250,50"), Some(1250.5));
        assert_eq!(parse_decimal("1,250.50"), Some(1250.5));
        assert_eq!(parse_decimal("12.75"), Some(12.75));
        assert_eq!(parse_decimal("1\u{202f}000"), Some(1000.0));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("sarah.chen@acme.com"), "Sarah Chen");
        assert_eq!(name_from_email("joe_smith@bigcorp.io"), "Joe Smith");
        assert_eq!(name_from_email("alice@example.com"), "Alice");
    }

    #[test]
    fn test_org_from_email() {
        assert_eq!(org_from_email("sarah@acme.com"), "Acme");
        assert_eq!(org_from_email("joe@bigcorp.io"), "Bigcorp");
        assert_eq!(org_from_email("nobody"), "");
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell("  Vis   inox M6 - "), "Vis inox M6");
        assert_eq!(clean_cell(": Joint torique |"), "Joint torique");
    }

    #[test]
    fn test_truncate_text_on_char_boundary() {
        let text = "é".repeat(10);
        let cut = truncate_text(&text, 5);
        assert!(cut.starts_with("éé"));
        assert!(cut.contains("[... content truncated ...]"));
        assert_eq!(truncate_text("short", 100), "short");
    }
}
