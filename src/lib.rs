//! mail-to-biz: quote-request emails to pre-SAP quotation drafts.
//!
//! The library is a set of synchronous passes over one message:
//! [`mail`] decodes it, [`documents`] reads attachment text, [`detection`]
//! decides whether it is a quote request, [`extract`] pulls client, articles
//! and delivery, and [`normalize`] builds the draft. [`pipeline`] chains them.
//! [`supplier`] parses supplier tariffs for price lookups.

pub mod config;
pub mod constants;
pub mod detection;
pub mod documents;
pub mod error;
pub mod extract;
pub mod mail;
pub mod normalize;
pub mod pipeline;
pub mod supplier;
pub mod types;
pub mod util;

pub use config::{load_config, Config};
pub use detection::{detect_quote_request, detect_quote_request_with};
pub use error::{ConfigError, DocumentError, PipelineError};
pub use extract::{extract_data, ExtractionInput};
pub use mail::IncomingMessage;
pub use normalize::{
    normalize_from_backend_analysis, normalize_to_pre_sap, reject_document, validate_document,
    BackendAnalysis,
};
pub use pipeline::{process_message, ProcessedMessage};
pub use types::PreSapDocument;
