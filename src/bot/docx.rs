//! Text extraction for .docx uploads.
//!
//! A .docx file is a ZIP archive; the body text lives in word/document.xml
//! as <w:t> runs grouped into <w:p> paragraphs.

use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Extract plain text from docx bytes.
///
/// Paragraphs become lines; <w:br/> and <w:tab/> inside a paragraph become
/// newline and tab. Fails on archives without a readable document.xml or
/// with no text at all.
pub fn extract_text(data: &[u8]) -> Result<String, String> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| format!("not a valid docx archive: {e}"))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| "docx is missing word/document.xml".to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| format!("could not read document.xml: {e}"))?;

    let text = document_text(&xml);
    if text.trim().is_empty() {
        return Err("docx contains no extractable text".to_string());
    }
    Ok(text)
}

/// Pull visible text out of Word body XML.
///
/// Works on slices between '<' characters: each slice is a tag followed by
/// the character data up to the next tag. Only data directly inside an open
/// <w:t> element is kept.
fn document_text(xml: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_run_text = false;

    for chunk in xml.split('<').skip(1) {
        let (tag, data) = match chunk.split_once('>') {
            Some(parts) => parts,
            // Truncated tag at end of input
            None => continue,
        };
        let name = tag
            .trim_start_matches('/')
            .split([' ', '/'])
            .next()
            .unwrap_or("");
        let closing = tag.starts_with('/');
        let self_closing = tag.ends_with('/');

        match (name, closing) {
            ("w:t", false) => in_run_text = !self_closing,
            ("w:t", true) => in_run_text = false,
            ("w:p", true) => {
                if !current.trim().is_empty() {
                    lines.push(current.trim().to_string());
                }
                current.clear();
                in_run_text = false;
            }
            ("w:br", false) => current.push('\n'),
            ("w:tab", false) => current.push('\t'),
            _ => {}
        }

        if in_run_text && !data.is_empty() {
            decode_entities(data, &mut current);
        }
    }

    // Text from an unterminated final paragraph
    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }

    lines.join("\n")
}

/// Decode the five predefined XML entities; unknown entities pass through.
fn decode_entities(data: &str, out: &mut String) {
    let mut rest = data;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match rest.split_once(';') {
            Some((entity, tail)) => {
                match &entity[1..] {
                    "lt" => out.push('<'),
                    "gt" => out.push('>'),
                    "amp" => out.push('&'),
                    "quot" => out.push('"'),
                    "apos" => out.push('\''),
                    other => {
                        out.push('&');
                        out.push_str(other);
                        out.push(';');
                    }
                }
                rest = tail;
            }
            None => break,
        }
    }
    out.push_str(rest);
}
