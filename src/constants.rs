//! Keyword lists and defaults shared by detection and extraction.
//!
//! All keywords are stored folded (lowercase, no accents) and are compared
//! against text passed through `util::fold`.

/// Subject keywords that on their own mark a message as a quote request.
pub const QUOTE_SUBJECT_KEYWORDS: &[&str] = &[
    "devis",
    "demande de prix",
    "demande de tarif",
    "demande de cotation",
    "cotation",
    "chiffrage",
    "offre de prix",
    "proposition commerciale",
    "quotation",
    "quote",
    "rfq",
    "request for quote",
    "price request",
];

/// Body keywords (weaker signal than the subject).
pub const QUOTE_BODY_KEYWORDS: &[&str] = &[
    "devis",
    "cotation",
    "chiffrage",
    "offre de prix",
    "meilleur prix",
    "tarif",
    "prix unitaire",
    "quotation",
    "quote",
    "pricing",
];

/// Phrases that ask for a price.
pub const QUOTE_BODY_PHRASES: &[&str] = &[
    "merci de nous faire parvenir",
    "merci de me faire parvenir",
    "pourriez-vous nous chiffrer",
    "pouvez-vous nous chiffrer",
    "pourriez-vous me chiffrer",
    "pouvez-vous nous faire une offre",
    "pourriez-vous nous faire une offre",
    "nous souhaiterions recevoir",
    "je souhaiterais recevoir",
    "votre meilleure offre",
    "votre meilleur prix",
    "please quote",
    "please send us a quote",
    "could you quote",
    "send us your best price",
];

/// Keywords that mark text as urgent.
pub const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "urgence",
    "asap",
    "au plus vite",
    "au plus tot",
    "des que possible",
    "rapidement",
    "as soon as possible",
];

/// Personal mailbox domains: never used as a company name.
pub const PERSONAL_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "outlook.fr",
    "hotmail.com",
    "hotmail.fr",
    "yahoo.com",
    "yahoo.fr",
    "icloud.com",
    "live.com",
    "live.fr",
    "orange.fr",
    "wanadoo.fr",
    "free.fr",
    "laposte.net",
    "sfr.fr",
];

/// Header cells that mark a table header row rather than an article.
pub const TABLE_HEADER_WORDS: &[&str] = &[
    "reference",
    "ref",
    "designation",
    "description",
    "article",
    "quantite",
    "qte",
    "qty",
    "quantity",
    "unite",
    "prix",
    "price",
];

/// Unit used when an article line names none.
pub const DEFAULT_UNIT: &str = "pcs";

/// Currency assumed for supplier prices with no currency marker.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Fired rules needed to flag a quote when no subject keyword matched.
pub const DEFAULT_MIN_RULES_FOR_QUOTE: usize = 2;

/// Jaro-Winkler similarity needed to accept a supplier designation match.
pub const DEFAULT_SUPPLIER_MATCH_THRESHOLD: f64 = 0.85;

/// Maximum extracted attachment text length (100KB).
pub const DEFAULT_MAX_EXTRACT_BYTES: usize = 100_000;
