//! mail-to-biz command line.
//!
//! Every subcommand prints JSON on stdout; logs go to stderr
//! (`RUST_LOG=debug` for more detail).

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;

use mail_to_biz_lib::config::load_config;
use mail_to_biz_lib::detection::detect_quote_request_with;
use mail_to_biz_lib::error::PipelineError;
use mail_to_biz_lib::documents::{detect_format, extract_text, SupportedFormat};
use mail_to_biz_lib::extract::{extract_data, ExtractionInput};
use mail_to_biz_lib::mail::IncomingMessage;
use mail_to_biz_lib::normalize::{
    normalize_from_backend_analysis, reject_document, validate_document, BackendAnalysis,
};
use mail_to_biz_lib::pipeline::process_message;
use mail_to_biz_lib::supplier::{extract_supplier_file, match_supplier_product};
use mail_to_biz_lib::types::{MessageMeta, PreSapDocument};
use mail_to_biz_lib::Config;

/// Turn quote-request emails into pre-SAP quotation drafts
#[derive(Parser, Debug)]
#[command(name = "mail-to-biz")]
#[command(version)]
struct Args {
    /// Config file (defaults to ~/.mail-to-biz/config.json)
    #[arg(short, long, global = true, env = "MAIL_TO_BIZ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a message is a quote request
    Detect {
        #[arg(short, long, default_value = "")]
        subject: String,
        #[command(flatten)]
        body: BodyArgs,
        /// Attachment files to scan
        #[arg(short, long)]
        attachment: Vec<PathBuf>,
    },
    /// Extract client, articles and delivery from a message
    Extract {
        /// Sender header, e.g. "Jean Martin <j.martin@acme.fr>"
        #[arg(short, long, default_value = "")]
        from: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        #[command(flatten)]
        body: BodyArgs,
        /// PDF attachments
        #[arg(short, long)]
        pdf: Vec<PathBuf>,
    },
    /// Run the full pipeline on a Graph message JSON ("-" for stdin)
    Process { message: PathBuf },
    /// Build a draft from a backend analysis JSON
    Backend {
        analysis: PathBuf,
        /// Graph message the analysis belongs to
        #[arg(short, long)]
        message: Option<PathBuf>,
    },
    /// Parse a supplier tariff file, optionally matching one article
    Supplier {
        file: PathBuf,
        /// Designation to look up
        #[arg(long = "match")]
        designation: Option<String>,
        /// Reference to look up
        #[arg(long)]
        reference: Option<String>,
    },
    /// Validate a pending draft JSON
    Validate { draft: PathBuf },
    /// Reject a pending draft JSON
    Reject {
        draft: PathBuf,
        #[arg(short, long)]
        reason: String,
    },
}

#[derive(clap::Args, Debug)]
struct BodyArgs {
    /// Message body text
    #[arg(short, long, conflicts_with = "body_file")]
    body: Option<String>,
    /// File holding the message body ("-" for stdin)
    #[arg(long)]
    body_file: Option<PathBuf>,
}

type Result<T> = std::result::Result<T, PipelineError>;

impl BodyArgs {
    fn read(&self) -> Result<String> {
        match (&self.body, &self.body_file) {
            (Some(body), _) => Ok(body.clone()),
            (None, Some(path)) => read_input(path),
            (None, None) => Ok(String::new()),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    run(args).map_err(|e| {
        if e.requires_user_action() {
            log::warn!("Draft left unchanged: {}", e);
        }
        let suggestion = e.recovery_suggestion();
        anyhow::Error::new(e).context(suggestion)
    })
}

fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Detect {
            subject,
            body,
            attachment,
        } => {
            let body = body.read()?;
            let texts = read_files(&attachment, &config);
            print_json(&detect_quote_request_with(&subject, &body, &texts, &config))
        }
        Command::Extract {
            from,
            subject,
            body,
            pdf,
        } => {
            let body = body.read()?;
            let pdf_texts = read_files(&pdf, &config);
            let input = ExtractionInput {
                from: &from,
                subject: &subject,
                body: &body,
                pdf_texts: &pdf_texts,
                today: Utc::now().date_naive(),
            };
            print_json(&extract_data(&input, &config))
        }
        Command::Process { message } => {
            let message: IncomingMessage = read_json(&message)?;
            print_json(&process_message(&message, &config, Utc::now())?)
        }
        Command::Backend { analysis, message } => {
            let analysis: BackendAnalysis = read_json(&analysis)?;
            let meta = match message {
                Some(path) => read_json::<IncomingMessage>(&path)?.meta(),
                None => MessageMeta::default(),
            };
            print_json(&normalize_from_backend_analysis(&analysis, &meta, &config, Utc::now()))
        }
        Command::Supplier {
            file,
            designation,
            reference,
        } => {
            let products = extract_supplier_file(&file, &config)?;
            if designation.is_none() && reference.is_none() {
                return print_json(&products);
            }
            let found = match_supplier_product(
                reference.as_deref(),
                designation.as_deref().unwrap_or(""),
                &products,
                config.supplier_match_threshold,
            );
            print_json(&found)
        }
        Command::Validate { draft } => {
            let draft: PreSapDocument = read_json(&draft)?;
            print_json(&validate_document(&draft, Utc::now())?)
        }
        Command::Reject { draft, reason } => {
            let draft: PreSapDocument = read_json(&draft)?;
            print_json(&reject_document(&draft, &reason, Utc::now())?)
        }
    }
}

/// Read a file, or stdin for "-".
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Io(format!("{}: {}", path.display(), e)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_input(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Text of each readable file; unreadable ones are logged and skipped.
fn read_files(paths: &[PathBuf], config: &Config) -> Vec<String> {
    paths
        .iter()
        .filter_map(|path| {
            if detect_format(path) == SupportedFormat::Unsupported {
                log::warn!("Skipping unsupported file {}", path.display());
                return None;
            }
            match extract_text(path, config.max_extract_bytes) {
                Ok(text) => Some(text),
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
