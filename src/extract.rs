//! Transcript text extraction for uploaded Word and PDF files.
//!
//! Dispatches on file extension first, then on the declared media type.
//! The result is a single flat string; page and run structure is discarded.

use std::io::Read;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("{0} (upload Word .docx or PDF files)")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Word extraction failed: {0}")]
    Docx(String),
}

/// Which reader a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Docx,
    Pdf,
}

impl FileKind {
    pub fn detect(file_name: &str, media_type: &str) -> Result<Self, ExtractError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".docx") || media_type.contains("wordprocessingml") {
            Ok(FileKind::Docx)
        } else if lower.ends_with(".pdf") || media_type == MIME_PDF {
            Ok(FileKind::Pdf)
        } else {
            Err(ExtractError::UnsupportedFormat(file_name.to_string()))
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            FileKind::Docx => MIME_DOCX,
            FileKind::Pdf => MIME_PDF,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Docx => "Word Document",
            FileKind::Pdf => "PDF Document",
        }
    }
}

/// Extracts plain text from an uploaded file.
pub fn extract_text(bytes: &[u8], file_name: &str, media_type: &str) -> Result<String, ExtractError> {
    match FileKind::detect(file_name, media_type)? {
        FileKind::Docx => extract_docx(bytes),
        FileKind::Pdf => extract_pdf(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut out = String::new();
    for page in pages {
        out.push_str(page.trim());
        out.push(' ');
    }
    Ok(out.trim().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraph_text(&doc_xml)
}

/// Collects `<w:t>` runs, breaking lines at paragraph ends and `<w:br/>`.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}
