//! Error types for message processing
//!
//! Errors are classified by recoverability:
//! - Recoverable: one unreadable attachment, a malformed tariff row
//! - NonRecoverable: bad configuration, invalid input JSON
//! - RequiresUserAction: a draft that is no longer pending

use std::path::PathBuf;
use thiserror::Error;

use crate::documents::ExtractError;
use crate::types::ValidationStatus;

/// Top-level error for the mail-to-biz pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(String),
}

impl PipelineError {
    /// Returns true if the caller can skip the offending input and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Extraction(_))
    }

    /// Returns true if a human has to look at the draft before anything else happens
    pub fn requires_user_action(&self) -> bool {
        matches!(self, PipelineError::Document(_))
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "Check your configuration in ~/.mail-to-biz/config.json",
            PipelineError::InvalidMessage(_) => "Check that the message JSON is a Graph message.",
            PipelineError::Extraction(_) => "The attachment could not be read. Open it manually.",
            PipelineError::Document(_) => "Reload the draft; it was already processed.",
            PipelineError::Json(_) => "Check the file format is correct.",
            PipelineError::Io(_) => "Check file permissions and paths.",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Lifecycle and edit violations on a pre-SAP draft
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Document is {0}, only pending drafts can change")]
    NotPending(ValidationStatus),

    #[error("No line {0} in document")]
    LineNotFound(usize),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("Rejection needs a reason")]
    MissingReason,

    #[error("Item code must not be blank")]
    MissingItemCode,

    #[error("Unit price must be a non-negative number, got {0}")]
    InvalidPrice(f64),
}
