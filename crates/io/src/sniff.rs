// Content signature detection

use std::io::Cursor;

const SNIFF_WINDOW: usize = 8192;

/// What the first bytes of a payload look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Empty,
    /// ZIP container (plain archive, DOCX, XLSX, ODS).
    Zip,
    /// OLE compound file (legacy `.xls`, `.doc`).
    Ole,
    Pdf,
    Parquet,
    Json,
    Html,
    Xml,
    /// Decodable text with no NUL bytes.
    Text,
    Binary,
}

/// Flavor of a ZIP container, decided by its well-known members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipKind {
    Docx,
    Xlsx,
    Archive,
}

pub fn sniff(bytes: &[u8]) -> Signature {
    if bytes.is_empty() {
        return Signature::Empty;
    }
    if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
        return Signature::Zip;
    }
    if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
        return Signature::Ole;
    }
    if bytes.starts_with(b"%PDF") {
        return Signature::Pdf;
    }
    if bytes.len() >= 8 && bytes.starts_with(b"PAR1") && bytes.ends_with(b"PAR1") {
        return Signature::Parquet;
    }

    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    if window.contains(&0) {
        return Signature::Binary;
    }

    let head = text_head(window);
    if head.starts_with('{') || head.starts_with('[') {
        Signature::Json
    } else if head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || (head.starts_with('<') && (head.contains("<body") || head.contains("<table")))
    {
        Signature::Html
    } else if head.starts_with('<') {
        Signature::Xml
    } else if head.is_empty() {
        Signature::Empty
    } else {
        Signature::Text
    }
}

/// Lowercased start of the payload with BOM and leading whitespace removed.
fn text_head(window: &[u8]) -> String {
    let window = window.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(window);
    let text = String::from_utf8_lossy(window);
    text.trim_start().chars().take(512).collect::<String>().to_ascii_lowercase()
}

/// Peek inside a ZIP container. Returns `None` when the central directory
/// cannot be read.
pub fn zip_kind(bytes: &[u8]) -> Option<ZipKind> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes)).ok()?;
    for name in archive.file_names() {
        match name {
            "word/document.xml" => return Some(ZipKind::Docx),
            "xl/workbook.xml" => return Some(ZipKind::Xlsx),
            _ => {}
        }
    }
    Some(ZipKind::Archive)
}
