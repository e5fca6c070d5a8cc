//! End-to-end processing of one incoming message.
//!
//! mail → attachment text → detection → (quote only) extraction → draft.
//! An attachment that cannot be read is logged and skipped; it never fails
//! the message.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::detection::detect_quote_request_with;
use crate::documents::{detect_attachment_format, extract_attachment_text, SupportedFormat};
use crate::error::PipelineError;
use crate::extract::{extract_data, ExtractionInput};
use crate::mail::IncomingMessage;
use crate::normalize::normalize_to_pre_sap;
use crate::types::{DetectionResult, ExtractedData, PreSapDocument};

/// Outcome of processing one message. `extracted` and `document` are only
/// present for quote requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedMessage {
    pub detection: DetectionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted: Option<ExtractedData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PreSapDocument>,
}

/// Text read from the message attachments.
#[derive(Debug, Default)]
struct AttachmentTexts {
    /// Every readable attachment, used for detection.
    all: Vec<String>,
    /// PDF attachments only, used for article extraction.
    pdf: Vec<String>,
}

/// Run the whole pipeline for one message.
pub fn process_message(
    message: &IncomingMessage,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<ProcessedMessage, PipelineError> {
    let from = message.from_header();
    let body = message.body_text();
    if message.subject.trim().is_empty() && body.trim().is_empty() && message.attachments.is_empty()
    {
        return Err(PipelineError::InvalidMessage(
            "message has no subject, body or attachments".to_string(),
        ));
    }

    let texts = read_attachments(message, config)?;
    let detection = detect_quote_request_with(&message.subject, &body, &texts.all, config);
    log::info!(
        "Message {} '{}': quote={} confidence={:?} rules={}",
        message.id,
        message.subject,
        detection.is_quote,
        detection.confidence,
        detection.score
    );

    if !detection.is_quote {
        return Ok(ProcessedMessage {
            detection,
            extracted: None,
            document: None,
        });
    }

    let input = ExtractionInput {
        from: &from,
        subject: &message.subject,
        body: &body,
        pdf_texts: &texts.pdf,
        today: now.date_naive(),
    };
    let extracted = extract_data(&input, config);
    let document = normalize_to_pre_sap(&message.meta(), &extracted, &detection, config, now);

    Ok(ProcessedMessage {
        detection,
        extracted: Some(extracted),
        document: Some(document),
    })
}

/// Errors that are not recoverable abort the message; the others skip the attachment.
fn read_attachments(
    message: &IncomingMessage,
    config: &Config,
) -> Result<AttachmentTexts, PipelineError> {
    let mut texts = AttachmentTexts::default();
    for attachment in message.decoded_attachments() {
        let format = detect_attachment_format(&attachment.name, &attachment.content_type);
        match extract_attachment_text(
            &attachment.name,
            &attachment.content_type,
            &attachment.bytes,
            config.max_extract_bytes,
        ) {
            Ok(text) if text.trim().is_empty() => {
                log::debug!("Attachment '{}' has no text", attachment.name);
            }
            Ok(text) => {
                if format == SupportedFormat::Pdf {
                    texts.pdf.push(text.clone());
                }
                texts.all.push(text);
            }
            Err(e) => {
                let err = PipelineError::from(e);
                if !err.is_recoverable() {
                    return Err(err);
                }
                log::warn!("Skipping attachment '{}': {}", attachment.name, err);
            }
        }
    }
    Ok(texts)
}
