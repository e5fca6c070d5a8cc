use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Extraction records
// =============================================================================

/// Where an extracted article (or a draft line) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleSource {
    Email,
    Pdf,
    Backend,
}

/// One requested article, produced by a single parse call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArticle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub designation: String,
    pub quantity: f64,
    pub unit: String,
    pub source: ArticleSource,
    /// 1-based line in the parsed text.
    pub line_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedClient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDelivery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub is_urgent: bool,
}

impl ExtractedDelivery {
    /// Fill fields left empty here from `other`.
    pub fn fill_from(&mut self, other: &ExtractedDelivery) {
        if self.requested_date.is_none() {
            self.requested_date = other.requested_date;
        }
        if self.delay_days.is_none() {
            self.delay_days = other.delay_days;
        }
        if self.location.is_none() {
            self.location = other.location.clone();
        }
        self.is_urgent |= other.is_urgent;
    }
}

/// Everything `extract_data` pulled out of one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    pub client: ExtractedClient,
    pub articles: Vec<ExtractedArticle>,
    pub delivery: ExtractedDelivery,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_source: Option<ArticleSource>,
    /// Both the email and a PDF listed articles; the PDF list was kept.
    #[serde(default)]
    pub source_conflict: bool,
    #[serde(default)]
    pub email_article_count: usize,
    #[serde(default)]
    pub pdf_article_count: usize,
}

// =============================================================================
// Detection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Tier for a number of fired rules.
    pub fn from_rule_count(count: usize) -> Self {
        match count {
            0 => Confidence::None,
            1 => Confidence::Low,
            2 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    SubjectKeyword,
    BodyKeyword,
    BodyPhrase,
    QuantityPattern,
    AttachmentKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRule {
    pub kind: RuleKind,
    /// The keyword, phrase or text fragment that matched.
    pub matched: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub is_quote: bool,
    pub confidence: Confidence,
    pub matched_rules: Vec<DetectionRule>,
    pub score: usize,
}

impl DetectionResult {
    pub fn has_rule(&self, kind: RuleKind) -> bool {
        self.matched_rules.iter().any(|r| r.kind == kind)
    }
}

// =============================================================================
// Pre-SAP document
// =============================================================================

/// Pricing provenance shown as a badge on each draft line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingCase {
    #[serde(rename = "CAS_1")]
    ClientHistory,
    #[serde(rename = "CAS_2")]
    ModifiedPrice,
    #[serde(rename = "CAS_3")]
    AveragedPrice,
    #[serde(rename = "CAS_4")]
    NewProduct,
}

impl PricingCase {
    /// Badge text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClientHistory => "Historique client",
            Self::ModifiedPrice => "Prix modifié",
            Self::AveragedPrice => "Prix moyen",
            Self::NewProduct => "Nouveau produit",
        }
    }

    /// Parse a backend code such as `"CAS_3"` (also accepts `"cas3"`, `"3"`).
    pub fn from_code(code: &str) -> Option<Self> {
        let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.as_str() {
            "1" => Some(Self::ClientHistory),
            "2" => Some(Self::ModifiedPrice),
            "3" => Some(Self::AveragedPrice),
            "4" => Some(Self::NewProduct),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Validated,
    Rejected,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Validated => "validated",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPartner {
    /// SAP customer code, known only once the backend matched the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_code: Option<String>,
    pub card_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub line_num: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,
    pub item_description: String,
    pub quantity: f64,
    pub unit_of_measure: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_case: Option<PricingCase>,
    #[serde(default)]
    pub article_found: bool,
    pub source: ArticleSource,
}

impl DocumentLine {
    /// Net line amount, or None when the line has no price yet.
    pub fn net_amount(&self) -> Option<f64> {
        self.unit_price
            .map(|price| price * self.quantity * (1.0 - self.discount_percent / 100.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_email_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub detection_confidence: Confidence,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub manual_validation_required: bool,
    #[serde(default)]
    pub source_conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Draft quotation assembled from an email, awaiting human validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreSapDocument {
    pub business_partner: BusinessPartner,
    pub document_lines: Vec<DocumentLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub meta: DocumentMeta,
}

/// Message-level facts the normalizer copies into the draft meta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}
