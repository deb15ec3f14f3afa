//! PDF text extraction module
//!
//! Extracts text per page from PDF files using lopdf. Pages are numbered
//! from 0 in the returned list, matching how chunks record their page.

use crate::errors::IngestionError;
use std::path::Path;
use tracing::{debug, warn};

/// Text of a single PDF page
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// 0-indexed page number
    pub number: u32,
    /// Cleaned page text, possibly empty
    pub text: String,
}

/// Extract the text of every page in a PDF file
pub fn extract_pages(path: &Path) -> Result<Vec<PdfPage>, IngestionError> {
    let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(path = %path.display(), page_count = pages.len(), "Extracting text from PDF");

    let mut result = Vec::with_capacity(pages.len());

    for (&page_num, &page_id) in pages.iter() {
        let raw = match doc.extract_text(&[page_num]) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => fallback_page_text(&doc, page_id),
            Err(e) => {
                debug!(page = page_num, error = %e, "lopdf text extraction failed, scanning content stream");
                fallback_page_text(&doc, page_id)
            }
        };

        result.push(PdfPage {
            number: page_num.saturating_sub(1),
            text: clean_text(&raw),
        });
    }

    if result.iter().all(|p| p.text.is_empty()) {
        warn!(path = %path.display(), "No text content extracted from PDF");
    }

    Ok(result)
}

/// Scan the raw content stream when the font-aware extractor gives nothing
fn fallback_page_text(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> String {
    match doc.get_page_content(page_id) {
        Ok(content) => extract_text_from_content(&content),
        Err(e) => {
            warn!(error = %e, "Failed to read page content, skipping");
            String::new()
        }
    }
}

/// Collect strings shown between BT and ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines() {
        let trimmed = line.trim();

        match trimmed {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                if !text.ends_with('\n') && !text.is_empty() {
                    text.push('\n');
                }
            }
            _ if in_text_block => {
                if let Some(shown) = shown_text(trimmed) {
                    text.push_str(&shown);
                }
            }
            _ => {}
        }
    }

    text
}

/// Literal strings of a Tj, ', " or TJ operator line
fn shown_text(line: &str) -> Option<String> {
    let is_show = line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"');
    let is_array = line.ends_with("TJ");
    if !is_show && !is_array {
        return None;
    }

    let mut result = String::new();
    let mut depth = 0usize;
    let mut current = String::new();
    let mut escaped = false;

    for ch in line.chars() {
        if depth > 0 && escaped {
            current.push('\\');
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if depth > 0 => escaped = true,
            '(' => {
                if depth > 0 {
                    current.push(ch);
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                } else {
                    current.push(ch);
                }
            }
            _ if depth > 0 => current.push(ch),
            _ => {}
        }
    }

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Decode PDF literal string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c) => result.push(c),
            None => {}
        }
    }

    result
}

/// Normalize whitespace while keeping line and paragraph breaks
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.replace('\u{FEFF}', "").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }

    out.replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
