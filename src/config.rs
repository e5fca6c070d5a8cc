//! Configuration stored in ~/.mail-to-biz/config.json
//!
//! Every field has a default, so a missing file is not an error: the
//! built-in keyword lists and units apply.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CURRENCY, DEFAULT_MAX_EXTRACT_BYTES, DEFAULT_MIN_RULES_FOR_QUOTE,
    DEFAULT_SUPPLIER_MATCH_THRESHOLD, DEFAULT_UNIT,
};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Extra subject/body keywords on top of the built-in list.
    #[serde(default)]
    pub extra_quote_keywords: Vec<String>,
    /// Extra request phrases on top of the built-in list.
    #[serde(default)]
    pub extra_quote_phrases: Vec<String>,
    #[serde(default = "default_min_rules")]
    pub min_rules_for_quote: usize,
    #[serde(default = "default_unit")]
    pub default_unit: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Our own mail domains. Senders from these are colleagues forwarding a
    /// request, so the client is looked up in the body instead.
    #[serde(default)]
    pub internal_domains: Vec<String>,
    #[serde(default = "default_max_extract_bytes")]
    pub max_extract_bytes: usize,
    #[serde(default = "default_match_threshold")]
    pub supplier_match_threshold: f64,
}

fn default_min_rules() -> usize {
    DEFAULT_MIN_RULES_FOR_QUOTE
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_max_extract_bytes() -> usize {
    DEFAULT_MAX_EXTRACT_BYTES
}

fn default_match_threshold() -> f64 {
    DEFAULT_SUPPLIER_MATCH_THRESHOLD
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extra_quote_keywords: Vec::new(),
            extra_quote_phrases: Vec::new(),
            min_rules_for_quote: default_min_rules(),
            default_unit: default_unit(),
            default_currency: default_currency(),
            internal_domains: Vec::new(),
            max_extract_bytes: default_max_extract_bytes(),
            supplier_match_threshold: default_match_threshold(),
        }
    }
}

impl Config {
    /// Whether an address or bare domain belongs to one of our own domains.
    pub fn is_internal(&self, email_or_domain: &str) -> bool {
        let domain = email_or_domain
            .rsplit('@')
            .next()
            .unwrap_or(email_or_domain);
        self.internal_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(domain))
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.min_rules_for_quote == 0 {
            return Err(ConfigError::Invalid {
                field: "minRulesForQuote",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.supplier_match_threshold) {
            return Err(ConfigError::Invalid {
                field: "supplierMatchThreshold",
                reason: format!("{} is outside 0..1", self.supplier_match_threshold),
            });
        }
        if self.default_unit.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "defaultUnit",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

/// Default config location: `~/.mail-to-biz/config.json`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".mail-to-biz").join("config.json"))
}

/// Load a config file. The file must exist.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let config: Config =
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    config.validate()
}

/// Load the config from `explicit` if given, else from the default location.
///
/// A missing default file yields `Config::default()`; a missing explicit
/// file is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = default_config_path()?;
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    log::info!("Loading config from {}", path.display());
    load_config_from(&path)
}
