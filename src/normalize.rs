//! Pre-SAP draft construction and lifecycle.
//!
//! A draft is built once per message, either from local extraction or from
//! the backend's analysis JSON, and starts `pending`. Every later change
//! (validation, rejection, line edits) returns a new copy and is refused once
//! the draft has left `pending`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::DocumentError;
use crate::types::{
    ArticleSource, BusinessPartner, Confidence, DetectionResult, DocumentLine, DocumentMeta,
    ExtractedData, ExtractedDelivery, MessageMeta, PreSapDocument, PricingCase, ValidationStatus,
};

// =============================================================================
// Backend analysis input
// =============================================================================

/// Analysis returned by the pricing backend for one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAnalysis {
    #[serde(default)]
    pub client: Option<BackendClient>,
    #[serde(default)]
    pub products: Vec<BackendProduct>,
    #[serde(default)]
    pub delivery: Option<BackendDelivery>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendClient {
    #[serde(default)]
    pub card_code: Option<String>,
    #[serde(default)]
    pub card_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Whether the client exists in SAP.
    #[serde(default)]
    pub found: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProduct {
    #[serde(default)]
    pub item_code: Option<String>,
    #[serde(alias = "designation")]
    pub description: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub discount_percent: Option<f64>,
    /// Raw case code such as "CAS_1".
    #[serde(default)]
    pub pricing_case: Option<String>,
    #[serde(default)]
    pub found: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDelivery {
    #[serde(default)]
    pub requested_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub is_urgent: bool,
}

// =============================================================================
// Construction
// =============================================================================

/// Build a pending draft from locally extracted data.
pub fn normalize_to_pre_sap(
    message: &MessageMeta,
    extracted: &ExtractedData,
    detection: &DetectionResult,
    config: &Config,
    now: DateTime<Utc>,
) -> PreSapDocument {
    let client = &extracted.client;
    let card_name = client
        .company
        .clone()
        .or_else(|| client.name.clone())
        .or_else(|| client.email.clone())
        .unwrap_or_default();

    let business_partner = BusinessPartner {
        card_code: None,
        card_name,
        email: client.email.clone(),
        contact_person: client.name.clone(),
        phone: client.phone.clone(),
        is_new: true,
    };

    let document_lines: Vec<DocumentLine> = extracted
        .articles
        .iter()
        .enumerate()
        .map(|(idx, article)| DocumentLine {
            line_num: idx,
            item_code: None,
            item_description: match &article.reference {
                Some(reference) => format!("{} {}", reference, article.designation),
                None => article.designation.clone(),
            },
            quantity: article.quantity,
            unit_of_measure: if article.unit.is_empty() {
                config.default_unit.clone()
            } else {
                article.unit.clone()
            },
            unit_price: None,
            discount_percent: 0.0,
            pricing_case: None,
            article_found: false,
            source: article.source,
        })
        .collect();

    let mut warnings = Vec::new();
    if document_lines.is_empty() {
        warnings.push("No articles could be extracted".to_string());
    }
    let unmatched = document_lines.iter().filter(|l| l.item_code.is_none()).count();
    if unmatched > 0 {
        warnings.push(format!("{} line(s) without an item code", unmatched));
    }
    if detection.confidence != Confidence::High {
        warnings.push(format!(
            "Detection confidence is {}",
            confidence_name(detection.confidence)
        ));
    }
    if extracted.source_conflict {
        warnings.push(format!(
            "Articles found in both email ({}) and PDF ({}); PDF articles kept",
            extracted.email_article_count, extracted.pdf_article_count
        ));
    }
    if business_partner.card_name.is_empty() {
        warnings.push("Client could not be identified".to_string());
    }

    let manual_validation_required = unmatched > 0
        || document_lines.is_empty()
        || detection.confidence != Confidence::High
        || extracted.source_conflict;

    let doc = PreSapDocument {
        business_partner,
        document_lines,
        doc_due_date: extracted.delivery.requested_date,
        comments: delivery_comments(&message.subject, &extracted.delivery),
        meta: DocumentMeta {
            document_id: new_document_id(),
            source_email_id: message.id.clone(),
            received_at: message.received_at,
            created_at: now,
            detection_confidence: detection.confidence,
            validation_status: ValidationStatus::Pending,
            manual_validation_required,
            source_conflict: extracted.source_conflict,
            validated_at: None,
            rejected_at: None,
            rejection_reason: None,
            warnings,
        },
    };

    log::info!(
        "Built draft {} with {} line(s) for '{}'",
        doc.meta.document_id,
        doc.document_lines.len(),
        doc.business_partner.card_name
    );
    doc
}

/// Build a pending draft from the backend's analysis of a message.
pub fn normalize_from_backend_analysis(
    analysis: &BackendAnalysis,
    message: &MessageMeta,
    config: &Config,
    now: DateTime<Utc>,
) -> PreSapDocument {
    let mut warnings = Vec::new();

    let client = analysis.client.clone().unwrap_or_default();
    let card_code = client.card_code.filter(|c| !c.trim().is_empty());
    let is_new = !client.found || card_code.is_none();
    let business_partner = BusinessPartner {
        card_name: client
            .card_name
            .or_else(|| client.contact_person.clone())
            .or_else(|| client.email.clone())
            .unwrap_or_default(),
        card_code,
        email: client.email,
        contact_person: client.contact_person,
        phone: client.phone,
        is_new,
    };
    if is_new {
        warnings.push("Client not found in SAP".to_string());
    }

    let mut document_lines = Vec::with_capacity(analysis.products.len());
    for (idx, product) in analysis.products.iter().enumerate() {
        let pricing_case = product.pricing_case.as_deref().and_then(|code| {
            let case = PricingCase::from_code(code);
            if case.is_none() {
                log::warn!("Ignoring unknown pricing case '{}' on line {}", code, idx);
                warnings.push(format!("Line {}: unknown pricing case '{}'", idx, code));
            }
            case
        });
        document_lines.push(DocumentLine {
            line_num: idx,
            item_code: product.item_code.clone().filter(|c| !c.trim().is_empty()),
            item_description: product.description.clone(),
            quantity: product.quantity,
            unit_of_measure: product
                .unit
                .clone()
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| config.default_unit.clone()),
            unit_price: product.unit_price,
            discount_percent: product.discount_percent.unwrap_or(0.0),
            pricing_case,
            article_found: product.found,
            source: ArticleSource::Backend,
        });
    }

    let not_found = document_lines.iter().filter(|l| !l.article_found).count();
    if not_found > 0 {
        warnings.push(format!("{} article(s) not found in SAP", not_found));
    }
    if document_lines.is_empty() {
        warnings.push("Backend returned no products".to_string());
    }

    let delivery = analysis.delivery.clone().unwrap_or_default();
    let mut comments: Vec<String> = analysis.comments.iter().cloned().collect();
    if let Some(location) = &delivery.location {
        comments.push(format!("Livraison : {}", location));
    }
    if delivery.is_urgent {
        comments.push("URGENT".to_string());
    }

    let doc = PreSapDocument {
        business_partner,
        document_lines,
        doc_due_date: delivery.requested_date,
        comments: if comments.is_empty() {
            None
        } else {
            Some(comments.join("\n"))
        },
        meta: DocumentMeta {
            document_id: new_document_id(),
            source_email_id: message.id.clone(),
            received_at: message.received_at,
            created_at: now,
            detection_confidence: analysis.confidence.unwrap_or(Confidence::Medium),
            validation_status: ValidationStatus::Pending,
            manual_validation_required: !warnings.is_empty(),
            source_conflict: false,
            validated_at: None,
            rejected_at: None,
            rejection_reason: None,
            warnings,
        },
    };

    log::info!(
        "Built draft {} from backend analysis ({} line(s), {} not found)",
        doc.meta.document_id,
        doc.document_lines.len(),
        not_found
    );
    doc
}

fn new_document_id() -> String {
    format!("presap-{}", uuid::Uuid::new_v4())
}

fn confidence_name(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
        Confidence::None => "none",
    }
}

fn delivery_comments(subject: &str, delivery: &ExtractedDelivery) -> Option<String> {
    let mut parts = Vec::new();
    if !subject.trim().is_empty() {
        parts.push(format!("Objet : {}", subject.trim()));
    }
    if let Some(location) = &delivery.location {
        parts.push(format!("Livraison : {}", location));
    }
    if let Some(days) = delivery.delay_days {
        parts.push(format!("Délai demandé : {} jours", days));
    }
    if delivery.is_urgent {
        parts.push("URGENT".to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

fn ensure_pending(doc: &PreSapDocument) -> Result<(), DocumentError> {
    match doc.meta.validation_status {
        ValidationStatus::Pending => Ok(()),
        other => Err(DocumentError::NotPending(other)),
    }
}

/// Mark a pending draft as validated.
pub fn validate_document(
    doc: &PreSapDocument,
    now: DateTime<Utc>,
) -> Result<PreSapDocument, DocumentError> {
    ensure_pending(doc)?;
    let mut validated = doc.clone();
    validated.meta.validation_status = ValidationStatus::Validated;
    validated.meta.manual_validation_required = false;
    validated.meta.validated_at = Some(now);
    log::info!("Validated draft {}", doc.meta.document_id);
    Ok(validated)
}

/// Mark a pending draft as rejected with a non-empty reason.
pub fn reject_document(
    doc: &PreSapDocument,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<PreSapDocument, DocumentError> {
    ensure_pending(doc)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DocumentError::MissingReason);
    }
    let mut rejected = doc.clone();
    rejected.meta.validation_status = ValidationStatus::Rejected;
    rejected.meta.rejected_at = Some(now);
    rejected.meta.rejection_reason = Some(reason.to_string());
    log::info!("Rejected draft {}: {}", doc.meta.document_id, reason);
    Ok(rejected)
}

/// Attach a catalogue item to a draft line and mark it found.
pub fn apply_article_match(
    doc: &PreSapDocument,
    line_num: usize,
    item_code: &str,
    unit_price: Option<f64>,
    pricing_case: Option<PricingCase>,
) -> Result<PreSapDocument, DocumentError> {
    ensure_pending(doc)?;
    let item_code = item_code.trim();
    if item_code.is_empty() {
        return Err(DocumentError::MissingItemCode);
    }
    if let Some(price) = unit_price.filter(|p| !(p.is_finite() && *p >= 0.0)) {
        return Err(DocumentError::InvalidPrice(price));
    }
    let mut updated = doc.clone();
    let line = updated
        .document_lines
        .iter_mut()
        .find(|l| l.line_num == line_num)
        .ok_or(DocumentError::LineNotFound(line_num))?;
    line.item_code = Some(item_code.to_string());
    line.article_found = true;
    if unit_price.is_some() {
        line.unit_price = unit_price;
    }
    if pricing_case.is_some() {
        line.pricing_case = pricing_case;
    }
    log::debug!(
        "Draft {} line {} matched to {} ({})",
        doc.meta.document_id,
        line_num,
        item_code,
        pricing_case.map_or("no pricing case", |c| c.label())
    );
    Ok(updated)
}

/// Change the quantity of a draft line.
pub fn update_line_quantity(
    doc: &PreSapDocument,
    line_num: usize,
    quantity: f64,
) -> Result<PreSapDocument, DocumentError> {
    ensure_pending(doc)?;
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(DocumentError::InvalidQuantity(quantity));
    }
    let mut updated = doc.clone();
    let line = updated
        .document_lines
        .iter_mut()
        .find(|l| l.line_num == line_num)
        .ok_or(DocumentError::LineNotFound(line_num))?;
    line.quantity = quantity;
    Ok(updated)
}

/// Sum of priced lines, net of discount. Unpriced lines are left out.
pub fn document_total(doc: &PreSapDocument) -> f64 {
    doc.document_lines
        .iter()
        .filter_map(DocumentLine::net_amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectionRule, ExtractedArticle, ExtractedClient, RuleKind};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-10T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn article(designation: &str, quantity: f64, source: ArticleSource) -> ExtractedArticle {
        ExtractedArticle {
            reference: None,
            designation: designation.to_string(),
            quantity,
            unit: "pcs".to_string(),
            source,
            line_number: 1,
        }
    }

    fn detection(confidence: Confidence) -> DetectionResult {
        DetectionResult {
            is_quote: true,
            confidence,
            matched_rules: vec![DetectionRule {
                kind: RuleKind::SubjectKeyword,
                matched: "devis".to_string(),
            }],
            score: 1,
        }
    }

    fn extracted() -> ExtractedData {
        ExtractedData {
            client: ExtractedClient {
                name: Some("Jean Martin".to_string()),
                email: Some("j.martin@acme.fr".to_string()),
                company: Some("Acme".to_string()),
                phone: None,
                domain: Some("acme.fr".to_string()),
            },
            articles: vec![
                article("Vis M6", 10.0, ArticleSource::Email),
                article("Écrou M6", 20.0, ArticleSource::Email),
            ],
            delivery: ExtractedDelivery {
                requested_date: NaiveDate::from_ymd_opt(2025, 3, 31),
                delay_days: Some(21),
                location: Some("Usine de Lyon".to_string()),
                is_urgent: true,
            },
            article_source: Some(ArticleSource::Email),
            source_conflict: false,
            email_article_count: 2,
            pdf_article_count: 0,
        }
    }

    fn message() -> MessageMeta {
        MessageMeta {
            id: Some("AAMk-1".to_string()),
            subject: "Demande de devis".to_string(),
            received_at: Some(now()),
        }
    }

    fn draft() -> PreSapDocument {
        normalize_to_pre_sap(
            &message(),
            &extracted(),
            &detection(Confidence::High),
            &Config::default(),
            now(),
        )
    }

    #[test]
    fn test_normalize_builds_pending_draft() {
        let doc = draft();
        assert_eq!(doc.business_partner.card_name, "Acme");
        assert_eq!(doc.business_partner.contact_person.as_deref(), Some("Jean Martin"));
        assert!(doc.business_partner.is_new);
        assert!(doc.business_partner.card_code.is_none());

        assert_eq!(doc.document_lines.len(), 2);
        assert_eq!(doc.document_lines[0].line_num, 0);
        assert_eq!(doc.document_lines[1].line_num, 1);
        assert!(doc.document_lines.iter().all(|l| !l.article_found));

        assert_eq!(doc.doc_due_date, NaiveDate::from_ymd_opt(2025, 3, 31));
        let comments = doc.comments.as_deref().unwrap();
        assert!(comments.contains("Usine de Lyon"));
        assert!(comments.contains("URGENT"));

        assert_eq!(doc.meta.validation_status, ValidationStatus::Pending);
        assert_eq!(doc.meta.source_email_id.as_deref(), Some("AAMk-1"));
        assert!(doc.meta.document_id.starts_with("presap-"));
        // Lines have no item code yet
        assert!(doc.meta.manual_validation_required);
        assert!(doc.meta.warnings.iter().any(|w| w.contains("without an item code")));
    }

    #[test]
    fn test_card_name_falls_back_to_name_then_email() {
        let mut data = extracted();
        data.client.company = None;
        let doc = normalize_to_pre_sap(
            &message(),
            &data,
            &detection(Confidence::High),
            &Config::default(),
            now(),
        );
        assert_eq!(doc.business_partner.card_name, "Jean Martin");

        data.client.name = None;
        let doc = normalize_to_pre_sap(
            &message(),
            &data,
            &detection(Confidence::High),
            &Config::default(),
            now(),
        );
        assert_eq!(doc.business_partner.card_name, "j.martin@acme.fr");
    }

    #[test]
    fn test_conflict_and_low_confidence_are_warned() {
        let mut data = extracted();
        data.source_conflict = true;
        data.pdf_article_count = 3;
        let doc = normalize_to_pre_sap(
            &message(),
            &data,
            &detection(Confidence::Low),
            &Config::default(),
            now(),
        );
        assert!(doc.meta.source_conflict);
        assert!(doc.meta.warnings.iter().any(|w| w.contains("PDF articles kept")));
        assert!(doc.meta.warnings.iter().any(|w| w.contains("confidence is low")));
    }

    #[test]
    fn test_validate_sets_status_and_clears_manual_flag() {
        let doc = draft();
        assert!(doc.meta.manual_validation_required);

        let validated = validate_document(&doc, now()).unwrap();
        assert_eq!(validated.meta.validation_status, ValidationStatus::Validated);
        assert!(!validated.meta.manual_validation_required);
        assert_eq!(validated.meta.validated_at, Some(now()));
        // Original untouched
        assert_eq!(doc.meta.validation_status, ValidationStatus::Pending);

        assert_eq!(
            validate_document(&validated, now()).unwrap_err(),
            DocumentError::NotPending(ValidationStatus::Validated)
        );
    }

    #[test]
    fn test_reject_records_reason() {
        let doc = draft();
        assert_eq!(
            reject_document(&doc, "  ", now()).unwrap_err(),
            DocumentError::MissingReason
        );

        let rejected = reject_document(&doc, "Client hors zone", now()).unwrap();
        assert_eq!(rejected.meta.validation_status, ValidationStatus::Rejected);
        assert_eq!(rejected.meta.rejection_reason.as_deref(), Some("Client hors zone"));
        assert_eq!(rejected.meta.rejected_at, Some(now()));

        assert!(matches!(
            validate_document(&rejected, now()),
            Err(DocumentError::NotPending(ValidationStatus::Rejected))
        ));
    }

    #[test]
    fn test_line_edits_and_total() {
        let doc = draft();
        let doc = apply_article_match(&doc, 0, "VIS-M6", Some(0.5), Some(PricingCase::ClientHistory))
            .unwrap();
        assert_eq!(doc.document_lines[0].item_code.as_deref(), Some("VIS-M6"));
        assert!(doc.document_lines[0].article_found);
        assert_eq!(doc.document_lines[0].pricing_case, Some(PricingCase::ClientHistory));

        let doc = update_line_quantity(&doc, 0, 40.0).unwrap();
        assert_eq!(doc.document_lines[0].quantity, 40.0);
        // Line 1 has no price
        assert_eq!(document_total(&doc), 20.0);

        assert_eq!(
            update_line_quantity(&doc, 0, 0.0).unwrap_err(),
            DocumentError::InvalidQuantity(0.0)
        );
        assert_eq!(
            apply_article_match(&doc, 9, "X", None, None).unwrap_err(),
            DocumentError::LineNotFound(9)
        );

        let validated = validate_document(&doc, now()).unwrap();
        assert!(update_line_quantity(&validated, 0, 2.0).is_err());
    }

    #[test]
    fn test_article_match_rejects_blank_code_and_bad_price() {
        let doc = draft();
        assert_eq!(
            apply_article_match(&doc, 0, "  ", Some(1.0), None).unwrap_err(),
            DocumentError::MissingItemCode
        );
        assert_eq!(
            apply_article_match(&doc, 0, "VIS-M6", Some(-5.0), None).unwrap_err(),
            DocumentError::InvalidPrice(-5.0)
        );
        assert!(matches!(
            apply_article_match(&doc, 0, "VIS-M6", Some(f64::NAN), None),
            Err(DocumentError::InvalidPrice(p)) if p.is_nan()
        ));
        assert!(matches!(
            apply_article_match(&doc, 0, "VIS-M6", Some(f64::INFINITY), None),
            Err(DocumentError::InvalidPrice(_))
        ));

        let matched = apply_article_match(&doc, 0, " VIS-M6 ", Some(0.0), None).unwrap();
        assert_eq!(matched.document_lines[0].item_code.as_deref(), Some("VIS-M6"));
        assert_eq!(document_total(&matched), 0.0);
    }

    #[test]
    fn test_backend_analysis() {
        let json = r#"{
            "client": {"cardCode": "C00042", "cardName": "ACME SAS", "email": "achats@acme.fr", "found": true},
            "products": [
                {"itemCode": "VIS-M6", "description": "Vis M6x20", "quantity": 100, "unitPrice": 0.12, "pricingCase": "CAS_1", "found": true},
                {"designation": "Pièce spéciale", "quantity": 2, "pricingCase": "CAS_9"}
            ],
            "delivery": {"requestedDate": "2025-04-01", "location": "Lyon", "isUrgent": false}
        }"#;
        let analysis: BackendAnalysis = serde_json::from_str(json).unwrap();
        let doc = normalize_from_backend_analysis(&analysis, &message(), &Config::default(), now());

        assert_eq!(doc.business_partner.card_code.as_deref(), Some("C00042"));
        assert!(!doc.business_partner.is_new);

        assert_eq!(doc.document_lines.len(), 2);
        let first = &doc.document_lines[0];
        assert!(first.article_found);
        assert_eq!(first.pricing_case, Some(PricingCase::ClientHistory));
        assert_eq!(first.source, ArticleSource::Backend);
        assert_eq!(first.unit_of_measure, "pcs");

        let second = &doc.document_lines[1];
        assert!(!second.article_found);
        assert!(second.pricing_case.is_none());
        assert!(doc.meta.warnings.iter().any(|w| w.contains("CAS_9")));
        assert!(doc.meta.manual_validation_required);

        assert_eq!(doc.doc_due_date, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(doc.comments.as_deref(), Some("Livraison : Lyon"));
        assert!((document_total(&doc) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_backend_unknown_client_is_new() {
        let analysis: BackendAnalysis = serde_json::from_str(
            r#"{"client": {"email": "x@y.fr"}, "products": [{"description": "Joint", "quantity": 3}]}"#,
        )
        .unwrap();
        let config = Config {
            default_unit: "u".to_string(),
            ..Config::default()
        };
        let doc = normalize_from_backend_analysis(&analysis, &MessageMeta::default(), &config, now());
        assert!(doc.business_partner.is_new);
        assert_eq!(doc.business_partner.card_name, "x@y.fr");
        assert!(doc.meta.warnings.iter().any(|w| w.contains("not found in SAP")));
        // Missing unit falls back to the configured one
        assert_eq!(doc.document_lines[0].unit_of_measure, "u");
    }
}
