//! Requesting client from the sender header and the message text.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;
use crate::constants::PERSONAL_EMAIL_DOMAINS;
use crate::mail::{extract_display_name, extract_domain, extract_email_address};
use crate::types::ExtractedClient;
use crate::util::{name_from_email, org_from_email};

fn re_company() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^\s*(?:soci[ée]t[ée]|entreprise|raison sociale|company)\s*:\s*(.+?)\s*$")
            .unwrap()
    })
}

fn re_phone() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+33\s?(?:\(0\)\s?)?|\b0)[1-9](?:[\s.-]?\d{2}){4}\b|\+\d{2,3}(?:[\s.-]?\d{2,4}){3,5}\b")
            .unwrap()
    })
}

/// "De : Name <addr>" / "From: addr" lines of a forwarded message.
fn re_forwarded_from() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*>?\s*(?:de|from)\s*:\s*(.*\S+@\S+.*?)\s*$").unwrap())
}

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap())
}

/// Extract the client from the `From` header, looking into the body when the
/// sender is one of our own domains (a colleague forwarding a request).
///
/// Staff never become the client: for an internal sender only the forwarded
/// part of the body is read, and nothing at all when there is none.
pub fn extract_client(from_header: &str, body: &str, config: &Config) -> ExtractedClient {
    let mut sender = from_header.to_string();
    let mut client_text = body;

    let sender_email = extract_email_address(from_header);
    if sender_email.is_empty() || config.is_internal(&sender_email) {
        match find_external_sender(body, config) {
            Some((forwarded, offset)) => {
                log::debug!("Using forwarded sender instead of internal {}", sender_email);
                sender = forwarded;
                client_text = &body[offset..];
            }
            None if sender_email.is_empty() => {}
            None => {
                log::debug!("Internal sender {} with no external contact", sender_email);
                return ExtractedClient::default();
            }
        }
    }

    let email = Some(extract_email_address(&sender))
        .filter(|e| e.contains('@') && !config.is_internal(e));
    let domain = email.as_deref().map(extract_domain).filter(|d| !d.is_empty());

    let name = extract_display_name(&sender).or_else(|| {
        email
            .as_deref()
            .filter(|e| e.split('@').next().is_some_and(|l| l.contains(['.', '_'])))
            .map(name_from_email)
    });

    let mut client = ExtractedClient {
        name,
        email,
        company: None,
        phone: None,
        domain,
    };
    fill_from_text(&mut client, client_text);
    client
}

/// Fill company and phone from a document when the client still lacks them.
/// The company falls back to the sender domain unless it is a personal mailbox.
pub fn fill_from_text(client: &mut ExtractedClient, text: &str) {
    if client.company.is_none() {
        client.company = re_company()
            .captures(text)
            .map(|caps| caps[1].to_string())
            .filter(|c| !c.is_empty());
    }

    if client.phone.is_none() {
        client.phone = re_phone().find(text).map(|m| m.as_str().trim().to_string());
    }

    if client.company.is_none() {
        if let (Some(email), Some(domain)) = (&client.email, &client.domain) {
            if !PERSONAL_EMAIL_DOMAINS.contains(&domain.as_str()) {
                client.company = Some(org_from_email(email));
            }
        }
    }
}

/// External sender found in the body, with the byte offset where its block starts.
fn find_external_sender(body: &str, config: &Config) -> Option<(String, usize)> {
    let forwarded = re_forwarded_from()
        .captures_iter(body)
        .find(|caps| !config.is_internal(&extract_email_address(&caps[1])))
        .and_then(|caps| caps.get(0).map(|m| (caps[1].to_string(), m.start())));
    if forwarded.is_some() {
        return forwarded;
    }

    re_email()
        .find_iter(body)
        .find(|m| !config.is_internal(m.as_str()))
        .map(|m| (m.as_str().to_string(), m.start()))
}
