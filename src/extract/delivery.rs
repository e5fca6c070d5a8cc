//! Delivery date, delay, location and urgency from free text.
//!
//! Explicit dates are only taken from lines that talk about delivery, so a
//! quoted "Le 12/03/2025, X a écrit" header never becomes a due date.

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

use crate::constants::URGENCY_KEYWORDS;
use crate::detection::contains_term;
use crate::types::ExtractedDelivery;
use crate::util::fold;

/// Folded words marking a line as delivery-related.
const DELIVERY_MARKERS: &[&str] = &[
    "livraison",
    "livrer",
    "livre",
    "delai",
    "deliver",
    "delivery",
    "avant le",
    "pour le",
    "au plus tard",
    "before",
    "by",
];

const FRENCH_MONTHS: &[&str] = &[
    "janvier",
    "fevrier",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "aout",
    "septembre",
    "octobre",
    "novembre",
    "decembre",
];

fn re_dmy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4}|\d{2})\b").unwrap())
}

fn re_iso() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap())
}

fn re_month_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"\b(\d{{1,2}})(?:er)?\s+({})\s+(\d{{4}})\b",
            FRENCH_MONTHS.join("|")
        ))
        .unwrap()
    })
}

fn re_delay() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:sous|dans|d'ici|en|within|in)\s+(\d{1,3})\s*(jours?|j|semaines?|sem|mois|days?|weeks?|months?)\b",
        )
        .unwrap()
    })
}

fn re_location() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^\s*(?:adresse de livraison|lieu de livraison|livraison|livrer [àa]|deliver to|delivery address|shipping address)\s*:\s*(.+?)\s*$",
        )
        .unwrap()
    })
}

/// Extract delivery information from `text`. Relative delays are resolved
/// against `today`.
pub fn extract_delivery(text: &str, today: NaiveDate) -> ExtractedDelivery {
    let folded = fold(text);

    let explicit = folded
        .lines()
        .filter(|line| DELIVERY_MARKERS.iter().any(|m| contains_term(line, m)))
        .find_map(find_date);

    let delay_days = re_delay()
        .captures(&folded)
        .and_then(|caps| delay_to_days(&caps[1], &caps[2]));

    let requested_date = explicit.or_else(|| {
        delay_days.and_then(|days| today.checked_add_signed(Duration::days(i64::from(days))))
    });

    let location = re_location()
        .captures_iter(text)
        .map(|caps| caps[1].trim().to_string())
        .find(|value| !value.is_empty() && !looks_like_timing(value));

    let is_urgent = URGENCY_KEYWORDS.iter().any(|kw| contains_term(&folded, kw));

    ExtractedDelivery {
        requested_date,
        delay_days,
        location,
        is_urgent,
    }
}

/// First calendar date in a folded line.
fn find_date(line: &str) -> Option<NaiveDate> {
    if let Some(caps) = re_iso().captures(line) {
        let date = ymd(&caps[1], &caps[2], &caps[3]);
        if date.is_some() {
            return date;
        }
    }
    if let Some(caps) = re_month_name().captures(line) {
        let month = FRENCH_MONTHS.iter().position(|m| *m == &caps[2])? + 1;
        return ymd(&caps[3], &month.to_string(), &caps[1]);
    }
    re_dmy().captures_iter(line).find_map(|caps| {
        let year = if caps[3].len() == 2 {
            format!("20{}", &caps[3])
        } else {
            caps[3].to_string()
        };
        ymd(&year, &caps[2], &caps[1])
    })
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

pub(crate) fn delay_to_days(amount: &str, unit: &str) -> Option<u32> {
    let n: u32 = amount.parse().ok()?;
    let factor = if unit.starts_with('j') || unit.starts_with("day") {
        1
    } else if unit.starts_with("sem") || unit.starts_with("week") {
        7
    } else {
        30
    };
    n.checked_mul(factor)
}

fn looks_like_timing(value: &str) -> bool {
    let folded = fold(value);
    re_delay().is_match(&folded) || (find_date(&folded).is_some() && folded.len() <= 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn test_explicit_date_on_delivery_line() {
        let d = extract_delivery("Livraison souhaitée avant le 28/03/2025.", today());
        assert_eq!(d.requested_date, NaiveDate::from_ymd_opt(2025, 3, 28));
        assert!(d.delay_days.is_none());
    }

    #[test]
    fn test_date_outside_delivery_line_ignored() {
        let text = "Le 05/03/2025 à 10:12, Jean a écrit :\nMerci pour votre offre.";
        let d = extract_delivery(text, today());
        assert!(d.requested_date.is_none());
    }

    #[test]
    fn test_iso_and_month_name_dates() {
        let d = extract_delivery("Delivery by 2025-04-02 please", today());
        assert_eq!(d.requested_date, NaiveDate::from_ymd_opt(2025, 4, 2));

        let d = extract_delivery("À livrer pour le 1er avril 2025", today());
        assert_eq!(d.requested_date, NaiveDate::from_ymd_opt(2025, 4, 1));
    }

    #[test]
    fn test_two_digit_year() {
        let d = extract_delivery("Délai : livraison le 15.05.25", today());
        assert_eq!(d.requested_date, NaiveDate::from_ymd_opt(2025, 5, 15));
    }

    #[test]
    fn test_relative_delay_resolves_against_today() {
        let d = extract_delivery("Nous en avons besoin sous 2 semaines.", today());
        assert_eq!(d.delay_days, Some(14));
        assert_eq!(d.requested_date, NaiveDate::from_ymd_opt(2025, 3, 24));

        let d = extract_delivery("needed within 10 days", today());
        assert_eq!(d.delay_days, Some(10));
    }

    #[test]
    fn test_location_and_urgency() {
        let text = "URGENT\nAdresse de livraison : 12 rue des Forges, 69007 Lyon\nMerci";
        let d = extract_delivery(text, today());
        assert_eq!(d.location.as_deref(), Some("12 rue des Forges, 69007 Lyon"));
        assert!(d.is_urgent);
    }

    #[test]
    fn test_timing_is_not_a_location() {
        let d = extract_delivery("Livraison : sous 5 jours", today());
        assert!(d.location.is_none());
        assert_eq!(d.delay_days, Some(5));
    }

    #[test]
    fn test_nothing_found() {
        let d = extract_delivery("Bonjour, merci.", today());
        assert_eq!(d, ExtractedDelivery::default());
    }
}
