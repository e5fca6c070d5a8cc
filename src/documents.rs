//! Text extraction from attachment and tariff file formats.
//!
//! Converts PDF, DOCX, XLSX/XLS/ODS, HTML and plaintext content into text the
//! quote detector and the extractors can scan. Works on in-memory attachment
//! bytes as well as files on disk.

use std::io::Cursor;
use std::path::Path;

use thiserror::Error;

use crate::util::truncate_text;

/// Supported document formats, detected by file extension or MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedFormat {
    /// .txt, .csv, .tsv, .md, .eml, .log
    PlainText,
    /// .pdf
    Pdf,
    /// .docx
    Docx,
    /// .xlsx, .xls, .xlsm, .ods
    Spreadsheet,
    /// .html, .htm
    Html,
    /// Everything else (images, archives, etc.)
    Unsupported,
}

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported format: .{0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),
}

/// Detect the document format from file extension.
pub fn detect_format(path: &Path) -> SupportedFormat {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "txt" | "csv" | "tsv" | "md" | "eml" | "log" => SupportedFormat::PlainText,
        "pdf" => SupportedFormat::Pdf,
        "docx" => SupportedFormat::Docx,
        "xlsx" | "xls" | "xlsm" | "ods" => SupportedFormat::Spreadsheet,
        "html" | "htm" => SupportedFormat::Html,
        _ => SupportedFormat::Unsupported,
    }
}

/// Detect the format of an attachment, trusting the MIME type over the name.
pub fn detect_attachment_format(name: &str, content_type: &str) -> SupportedFormat {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    let by_mime = match mime.as_str() {
        "application/pdf" => SupportedFormat::Pdf,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            SupportedFormat::Docx
        }
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel"
        | "application/vnd.oasis.opendocument.spreadsheet" => SupportedFormat::Spreadsheet,
        "text/html" => SupportedFormat::Html,
        m if m.starts_with("text/") => SupportedFormat::PlainText,
        _ => SupportedFormat::Unsupported,
    };

    match by_mime {
        SupportedFormat::Unsupported => detect_format(Path::new(name)),
        known => known,
    }
}

/// Extract text content from a file, truncated to `max_bytes`.
pub fn extract_text(path: &Path, max_bytes: usize) -> Result<String, ExtractError> {
    let format = detect_format(path);
    if format == SupportedFormat::Unsupported {
        return Err(unsupported(path));
    }
    let bytes = std::fs::read(path)?;
    let raw = extract_bytes(format, &bytes)?;
    Ok(truncate_text(&raw, max_bytes))
}

/// Extract text from attachment bytes, truncated to `max_bytes`.
pub fn extract_attachment_text(
    name: &str,
    content_type: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<String, ExtractError> {
    let format = detect_attachment_format(name, content_type);
    if format == SupportedFormat::Unsupported {
        return Err(unsupported(Path::new(name)));
    }
    let raw = extract_bytes(format, bytes)?;
    Ok(truncate_text(&raw, max_bytes))
}

fn unsupported(path: &Path) -> ExtractError {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_string();
    ExtractError::UnsupportedFormat(ext)
}

fn extract_bytes(format: SupportedFormat, bytes: &[u8]) -> Result<String, ExtractError> {
    match format {
        SupportedFormat::PlainText => Ok(extract_plaintext(bytes)),
        SupportedFormat::Pdf => extract_pdf(bytes),
        SupportedFormat::Docx => extract_docx(bytes),
        SupportedFormat::Spreadsheet => extract_spreadsheet(bytes),
        SupportedFormat::Html => extract_html(bytes),
        SupportedFormat::Unsupported => Err(ExtractError::UnsupportedFormat("unknown".to_string())),
    }
}

// ---------------------------------------------------------------------------
// Format-specific extractors
// ---------------------------------------------------------------------------

fn extract_plaintext(bytes: &[u8]) -> String {
    // Try UTF-8, fall back to lossy conversion
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract can panic on malformed input
    let owned = bytes.to_vec();
    let result = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::ExtractionFailed(format!("PDF: {}", e))),
        Err(_) => Err(ExtractError::ExtractionFailed(
            "PDF extraction panicked (malformed file)".to_string(),
        )),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    // DOCX = ZIP archive containing word/document.xml
    // Walk <w:t> tags to extract text runs; table cells become " | ".
    use quick_xml::events::Event;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::ExtractionFailed(format!("DOCX zip: {}", e)))?;

    let doc = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::ExtractionFailed(format!("DOCX missing document.xml: {}", e)))?;

    let mut reader = quick_xml::Reader::from_reader(std::io::BufReader::new(doc));
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text_tag = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_tag = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_tag = false,
                b"p" => text.push('\n'),
                b"tc" => {
                    // Cell paragraphs end with '\n'; join cells on one row
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    text.push_str(" | ");
                }
                b"tr" => {
                    let trimmed = text.trim_end_matches([' ', '|']).len();
                    text.truncate(trimmed);
                    text.push('\n');
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text_tag {
                    if let Ok(s) = e.unescape() {
                        text.push_str(&s);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::ExtractionFailed(format!("DOCX XML: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn extract_spreadsheet(bytes: &[u8]) -> Result<String, ExtractError> {
    use calamine::{open_workbook_auto_from_rs, Reader};

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ExtractError::ExtractionFailed(format!("Spreadsheet: {}", e)))?;

    let mut output = String::new();

    for sheet_name in workbook.sheet_names().to_vec() {
        if let Ok(range) = workbook.worksheet_range(&sheet_name) {
            render_sheet(&mut output, &sheet_name, &range);
        }
    }

    Ok(output)
}

/// Append a sheet as a "## name" header followed by one " | "-joined line per row.
fn render_sheet(output: &mut String, sheet_name: &str, range: &calamine::Range<calamine::Data>) {
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(&format!("## {}\n", sheet_name));

    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        output.push_str(&cells.join(" | "));
        output.push('\n');
    }
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    html2text::from_read(bytes, 120)
        .map_err(|e| ExtractError::ExtractionFailed(format!("HTML: {}", e)))
}
