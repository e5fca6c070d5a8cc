//! Incoming mail as delivered by the Microsoft Graph proxy.
//!
//! Deserializes a Graph `message` resource (with `$expand=attachments`),
//! converts HTML bodies to text and decodes base64 attachment bytes.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::MessageMeta;

// ============================================================================
// Graph message resource
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default)]
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    /// "text" or "html"
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    /// Base64 file content; absent for item and reference attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Recipient>,
    #[serde(default)]
    pub body: ItemBody,
    #[serde(default)]
    pub body_preview: String,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// An attachment with its bytes decoded.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingMessage {
    /// Build a message from loose fields (CLI input, tests).
    pub fn from_parts(from: &str, subject: &str, body: &str) -> Self {
        let address = extract_email_address(from);
        let name = extract_display_name(from).unwrap_or_default();
        Self {
            subject: subject.to_string(),
            from: Some(Recipient {
                email_address: EmailAddress { name, address },
            }),
            body: ItemBody {
                content_type: "text".to_string(),
                content: body.to_string(),
            },
            ..Default::default()
        }
    }

    /// "Name <address>" form of the sender, empty when unknown.
    pub fn from_header(&self) -> String {
        match &self.from {
            Some(r) if !r.email_address.name.is_empty() => {
                format!("{} <{}>", r.email_address.name, r.email_address.address)
            }
            Some(r) => r.email_address.address.clone(),
            None => String::new(),
        }
    }

    /// Body as plain text; HTML bodies are rendered, falling back to the preview.
    pub fn body_text(&self) -> String {
        if !self.body.content_type.eq_ignore_ascii_case("html") {
            return self.body.content.clone();
        }
        match html2text::from_read(self.body.content.as_bytes(), 120) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to render HTML body of {}: {}", self.id, e);
                self.body_preview.clone()
            }
        }
    }

    /// File attachments with decodable content. Undecodable ones are logged and skipped.
    pub fn decoded_attachments(&self) -> Vec<DecodedAttachment> {
        self.attachments
            .iter()
            .filter_map(|a| {
                let data = a.content_bytes.as_deref()?;
                match base64::engine::general_purpose::STANDARD.decode(data.trim()) {
                    Ok(bytes) => Some(DecodedAttachment {
                        name: a.name.clone(),
                        content_type: a.content_type.clone(),
                        bytes,
                    }),
                    Err(e) => {
                        log::warn!("Skipping attachment '{}': bad base64: {}", a.name, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn meta(&self) -> MessageMeta {
        MessageMeta {
            id: if self.id.is_empty() {
                None
            } else {
                Some(self.id.clone())
            },
            subject: self.subject.clone(),
            received_at: self.received_date_time,
        }
    }
}

// ============================================================================
// From header helpers
// ============================================================================

/// Extract bare email from a "From" header like "Name <email@example.com>".
pub fn extract_email_address(from_field: &str) -> String {
    if let Some(start) = from_field.find('<') {
        if let Some(end) = from_field.find('>') {
            if end > start {
                return from_field[start + 1..end].trim().to_lowercase();
            }
        }
    }
    from_field.trim().to_lowercase()
}

/// Extract the display name from a "From" header like "Jane Doe <jane@customer.com>".
///
/// Returns `None` for bare emails. Handles quoted display names and
/// "Last, First" forms.
pub fn extract_display_name(from_field: &str) -> Option<String> {
    let trimmed = from_field.trim();
    let angle_start = trimmed.find('<')?;
    if angle_start == 0 {
        return None;
    }

    let name = trimmed[..angle_start].trim().trim_matches('"').trim();
    if name.is_empty() || name.contains('@') {
        return None;
    }

    Some(name.to_string())
}

/// Extract domain from an email address.
pub fn extract_domain(email_addr: &str) -> String {
    if let Some(at_pos) = email_addr.rfind('@') {
        email_addr[at_pos + 1..].to_lowercase()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_message_deserialization() {
        let json = r##"{
            "id": "AAMkAGI2",
            "subject": "Demande de devis",
            "receivedDateTime": "2025-03-10T08:15:00Z",
            "from": {"emailAddress": {"name": "Jean Martin", "address": "j.martin@acme-industrie.fr"}},
            "body": {"contentType": "html", "content": "<p>Bonjour,</p><p>10 x Vis M6</p>"},
            "bodyPreview": "Bonjour, 10 x Vis M6",
            "hasAttachments": true,
            "attachments": [
                {"@odata.type": "#microsoft.graph.fileAttachment", "id": "a1", "name": "demande.txt",
                 "contentType": "text/plain", "size": 11, "contentBytes": "SGVsbG8gd29ybGQ="}
            ]
        }"##;

        let msg: IncomingMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "AAMkAGI2");
        assert_eq!(msg.from_header(), "Jean Martin <j.martin@acme-industrie.fr>");
        assert!(msg.received_date_time.is_some());

        let body = msg.body_text();
        assert!(body.contains("Bonjour,"));
        assert!(body.contains("10 x Vis M6"));
        assert!(!body.contains("<p>"));

        let attachments = msg.decoded_attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].bytes, b"Hello world");

        let meta = msg.meta();
        assert_eq!(meta.id.as_deref(), Some("AAMkAGI2"));
        assert_eq!(meta.subject, "Demande de devis");
    }

    #[test]
    fn test_minimal_message() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"subject": "x"}"#).unwrap();
        assert!(msg.from.is_none());
        assert_eq!(msg.from_header(), "");
        assert!(msg.decoded_attachments().is_empty());
        assert!(msg.meta().id.is_none());
    }

    #[test]
    fn test_bad_base64_is_skipped() {
        let msg = IncomingMessage {
            attachments: vec![Attachment {
                name: "broken.pdf".to_string(),
                content_bytes: Some("%%%not base64%%%".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(msg.decoded_attachments().is_empty());
    }

    #[test]
    fn test_from_parts() {
        let msg = IncomingMessage::from_parts("Jane Doe <JANE@Customer.com>", "RFQ", "body");
        assert_eq!(msg.from_header(), "Jane Doe <jane@customer.com>");
        assert_eq!(msg.body_text(), "body");
    }

    #[test]
    fn test_extract_email_address() {
        assert_eq!(
            extract_email_address("Jane Doe <jane@customer.com>"),
            "jane@customer.com"
        );
        assert_eq!(extract_email_address("jane@customer.com"), "jane@customer.com");
    }

    #[test]
    fn test_extract_display_name() {
        assert_eq!(
            extract_display_name("\"Jane Doe\" <jane@customer.com>"),
            Some("Jane Doe".to_string())
        );
        assert_eq!(
            extract_display_name("Dupont, Marc <m.dupont@acme.fr>"),
            Some("Dupont, Marc".to_string())
        );
        assert_eq!(extract_display_name("jane@customer.com"), None);
        assert_eq!(extract_display_name("<jane@customer.com>"), None);
        assert_eq!(extract_display_name("jane@x.com <jane@x.com>"), None);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("jane@Customer.COM"), "customer.com");
        assert_eq!(extract_domain("nodomain"), "");
    }
}
