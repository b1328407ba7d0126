//! Text extraction for the supported contract formats.

use crate::utils::error::{ContractError, Result};
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use std::sync::LazyLock;

const DOCX_BODY: &str = "word/document.xml";

static DOCX_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>")
        .expect("paragraph pattern is valid")
});

static DOCX_RUN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab/>|<w:br(?:\s[^>]*)?/>|<w:cr/>")
        .expect("run pattern is valid")
});

static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x?)([0-9a-fA-F]+);").expect("entity pattern is valid"));

/// 逐頁擷取 PDF 文字
pub fn extract_pdf_pages(source: &str, bytes: &[u8]) -> Result<Vec<String>> {
    // pdf-extract 遇到部分損毀檔案會 panic
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ContractError::DocumentError {
            source_name: source.to_string(),
            message: "PDF parser aborted on malformed input".to_string(),
        })?;

    extracted.map_err(|e| ContractError::DocumentError {
        source_name: source.to_string(),
        message: format!("Invalid PDF: {}", e),
    })
}

/// DOCX 為 ZIP 封裝，段落取自 word/document.xml，以換行串接
pub fn extract_docx_text(source: &str, bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| ContractError::DocumentError {
            source_name: source.to_string(),
            message: format!("Missing {}: {}", DOCX_BODY, e),
        })?
        .read_to_string(&mut xml)?;

    let paragraphs: Vec<String> = DOCX_PARAGRAPH
        .captures_iter(&xml)
        .map(|caps| caps.get(1).map(|m| paragraph_text(m.as_str())).unwrap_or_default())
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(paragraph_xml: &str) -> String {
    let mut text = String::new();
    for caps in DOCX_RUN_CONTENT.captures_iter(paragraph_xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&decode_xml_entities(run.as_str())),
            None if caps[0].starts_with("<w:tab") => text.push('\t'),
            None => text.push('\n'),
        }
    }
    text
}

fn decode_xml_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let numeric = NUMERIC_ENTITY.replace_all(raw, |caps: &Captures| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    numeric
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn extract_txt_text(source: &str, bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|e| ContractError::DocumentError {
        source_name: source.to_string(),
        message: format!("File is not valid UTF-8: {}", e),
    })?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}
