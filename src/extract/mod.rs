//! Structured data from a quote-request message.
//!
//! Runs the article, client and delivery extractors over the email body and
//! any PDF text, then merges them. Merge rule: PDF articles win over email
//! articles; when both sources listed articles the result is flagged as a
//! source conflict.

pub mod articles;
pub mod client;
pub mod delivery;

use chrono::NaiveDate;

use crate::config::Config;
use crate::types::{ArticleSource, ExtractedData};

pub use articles::{canonical_unit, extract_articles_from_text, extract_articles_with_unit};
pub use client::extract_client;
pub use delivery::extract_delivery;

/// Raw inputs for one extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractionInput<'a> {
    pub from: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
    /// Text of each PDF attachment.
    pub pdf_texts: &'a [String],
    /// Reference date for relative delays ("sous 10 jours").
    pub today: NaiveDate,
}

/// Extract client, articles and delivery from an email and its PDFs.
pub fn extract_data(input: &ExtractionInput<'_>, config: &Config) -> ExtractedData {
    let unit = config.default_unit.as_str();

    let email_articles = extract_articles_with_unit(input.body, ArticleSource::Email, unit);
    let pdf_articles: Vec<_> = input
        .pdf_texts
        .iter()
        .flat_map(|text| extract_articles_with_unit(text, ArticleSource::Pdf, unit))
        .collect();

    let email_article_count = email_articles.len();
    let pdf_article_count = pdf_articles.len();
    let source_conflict = email_article_count > 0 && pdf_article_count > 0;
    if source_conflict {
        log::warn!(
            "Articles found in both email ({}) and PDF ({}); keeping PDF articles",
            email_article_count,
            pdf_article_count
        );
    }

    let (articles, article_source) = if pdf_article_count > 0 {
        (pdf_articles, Some(ArticleSource::Pdf))
    } else if email_article_count > 0 {
        (email_articles, Some(ArticleSource::Email))
    } else {
        (Vec::new(), None)
    };

    let mut client = extract_client(input.from, input.body, config);
    for text in input.pdf_texts {
        client::fill_from_text(&mut client, text);
    }

    let mut delivery = extract_delivery(input.body, input.today);
    let from_subject = extract_delivery(input.subject, input.today);
    delivery.fill_from(&from_subject);
    for text in input.pdf_texts {
        delivery.fill_from(&extract_delivery(text, input.today));
    }

    log::info!(
        "Extracted {} article(s) from {:?}, client={:?}",
        articles.len(),
        article_source,
        client.email
    );

    ExtractedData {
        client,
        articles,
        delivery,
        article_source,
        source_conflict,
        email_article_count,
        pdf_article_count,
    }
}
