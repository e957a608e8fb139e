use std::fs;
use std::path::Path;

use anyhow::Context;
use roxmltree::{Document, ParsingOptions};
use thiserror::Error;

/// Upper bound on parsed nodes; real exports stay in the low thousands.
const MAX_DOCUMENT_NODES: u32 = 1_000_000;

/// Deepest element nesting accepted; the XML parser recurses per level.
pub const MAX_ELEMENT_DEPTH: usize = 256;

const EXCERPT_CHARS: usize = 80;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SourceEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl SourceEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8 (bom)",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceText {
    pub text: String,
    pub encoding: SourceEncoding,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("undecodable document: {}", .messages.join("; "))]
    Encoding { messages: Vec<String> },

    #[error("malformed document: {}", .messages.join("; "))]
    Malformed { messages: Vec<String> },
}

impl LoadError {
    #[cfg(test)]
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Encoding { messages } | Self::Malformed { messages } => messages,
        }
    }
}

pub fn read_source(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Two-byte marks are checked before the three-byte UTF-8 mark.
pub fn decode_source(bytes: &[u8]) -> Result<SourceText, LoadError> {
    if let Some(rest) = bytes.strip_prefix(&UTF16_BE_BOM) {
        let text = decode_utf16(rest, u16::from_be_bytes)?;
        return Ok(SourceText {
            text,
            encoding: SourceEncoding::Utf16Be,
        });
    }

    if let Some(rest) = bytes.strip_prefix(&UTF16_LE_BOM) {
        let text = decode_utf16(rest, u16::from_le_bytes)?;
        return Ok(SourceText {
            text,
            encoding: SourceEncoding::Utf16Le,
        });
    }

    let (rest, encoding) = match bytes.strip_prefix(&UTF8_BOM) {
        Some(rest) => (rest, SourceEncoding::Utf8Bom),
        None => (bytes, SourceEncoding::Utf8),
    };

    let text = std::str::from_utf8(rest)
        .map_err(|err| LoadError::Encoding {
            messages: vec![format!("invalid utf-8: {err}")],
        })?
        .to_string();

    Ok(SourceText { text, encoding })
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, LoadError> {
    let mut messages = Vec::new();
    if bytes.len() % 2 != 0 {
        messages.push(format!(
            "utf-16 payload has odd length {}",
            bytes.len()
        ));
    }

    let units = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect::<Vec<u16>>();

    match String::from_utf16(&units) {
        Ok(text) if messages.is_empty() => Ok(text),
        Ok(_) => Err(LoadError::Encoding { messages }),
        Err(err) => {
            messages.push(format!("invalid utf-16: {err}"));
            Err(LoadError::Encoding { messages })
        }
    }
}

/// Parses with DTDs refused, so entity declarations, external entities and
/// expansion bombs never reach the mapper. Nesting is bounded before the
/// parser runs.
pub fn parse_document(text: &str) -> Result<Document<'_>, LoadError> {
    check_nesting_depth(text, MAX_ELEMENT_DEPTH)?;

    let options = ParsingOptions {
        allow_dtd: false,
        nodes_limit: MAX_DOCUMENT_NODES,
        ..ParsingOptions::default()
    };

    Document::parse_with_options(text, options).map_err(|err| {
        let mut messages = vec![err.to_string()];
        if let Some(excerpt) = line_excerpt(text, err.pos().row as usize) {
            messages.push(format!("near: {excerpt}"));
        }
        LoadError::Malformed { messages }
    })
}

/// Single pass over the markup counting open elements. Comments, CDATA,
/// processing instructions and quoted attribute values are skipped; anything
/// else malformed is left for the parser to report.
fn check_nesting_depth(text: &str, limit: usize) -> Result<(), LoadError> {
    let bytes = text.as_bytes();
    let mut depth = 0_usize;
    let mut index = 0_usize;

    while let Some(offset) = bytes[index..].iter().position(|byte| *byte == b'<') {
        let start = index + offset;
        let rest = &bytes[start..];

        index = if rest.starts_with(b"<!--") {
            skip_past(bytes, start, b"-->")
        } else if rest.starts_with(b"<![CDATA[") {
            skip_past(bytes, start, b"]]>")
        } else if rest.starts_with(b"<?") {
            skip_past(bytes, start, b"?>")
        } else if rest.starts_with(b"<!") {
            skip_past(bytes, start, b">")
        } else if rest.starts_with(b"</") {
            depth = depth.saturating_sub(1);
            skip_past(bytes, start, b">")
        } else {
            let (end, self_closing) = scan_start_tag(bytes, start);
            if !self_closing {
                depth += 1;
                if depth > limit {
                    let row = text[..start].matches('\n').count() + 1;
                    let mut messages = vec![format!(
                        "element nesting exceeds {limit} levels at line {row}"
                    )];
                    if let Some(excerpt) = line_excerpt(text, row) {
                        messages.push(format!("near: {excerpt}"));
                    }
                    return Err(LoadError::Malformed { messages });
                }
            }
            end
        };
    }

    Ok(())
}

fn skip_past(bytes: &[u8], start: usize, terminator: &[u8]) -> usize {
    bytes[start..]
        .windows(terminator.len())
        .position(|window| window == terminator)
        .map(|offset| start + offset + terminator.len())
        .unwrap_or(bytes.len())
}

/// Returns the index after the tag's `>` and whether it ends in `/>`.
fn scan_start_tag(bytes: &[u8], start: usize) -> (usize, bool) {
    let mut quote = None;
    let mut previous = 0_u8;

    for (offset, byte) in bytes[start..].iter().copied().enumerate() {
        match quote {
            Some(open) if byte == open => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'>' => return (start + offset + 1, previous == b'/'),
            None => {}
        }
        previous = byte;
    }

    (bytes.len(), false)
}

fn line_excerpt(text: &str, row: usize) -> Option<String> {
    let line = text.lines().nth(row.checked_sub(1)?)?.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(EXCERPT_CHARS).collect())
}
