//! Plain-text extraction from uploaded files.
//!
//! PDF goes through `pdf-extract`; DOCX is read from `word/document.xml`
//! inside the zip container with one line per paragraph; anything else
//! handled here is treated as text.

use crate::error::{Result, SporError};
use std::io::Read;
use std::path::Path;

/// Largest decompressed `word/document.xml` we will read.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Text,
    Docx,
}

impl FileType {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            "txt" | "text" | "md" | "markdown" | "csv" | "log" => Ok(FileType::Text),
            _ => Err(SporError::TextExtraction(format!(
                "Unsupported file type: {} (expected .pdf, .docx or .txt)",
                path.display()
            ))),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Pdf => write!(f, "pdf"),
            FileType::Text => write!(f, "text"),
            FileType::Docx => write!(f, "docx"),
        }
    }
}

/// Turns file bytes into raw text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<String>;
}

/// Extractor for every [`FileType`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, bytes: &[u8], file_type: FileType) -> Result<String> {
        match file_type {
            FileType::Pdf => extract_pdf(bytes),
            FileType::Docx => extract_docx(bytes),
            FileType::Text => Ok(extract_plain(bytes)),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| SporError::TextExtraction(format!("PDF extraction failed: {}", e)))
}

fn extract_plain(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn docx_error(e: impl std::fmt::Display) -> SporError {
    SporError::TextExtraction(format!("DOCX extraction failed: {}", e))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(docx_error)?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| docx_error("word/document.xml not found"))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(docx_error)?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(docx_error("word/document.xml exceeds size limit"));
    }

    paragraphs_from_document_xml(&xml)
}

/// Collect `w:t` runs, one line per `w:p` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_path(Path::new("a/report.PDF")).unwrap(), FileType::Pdf);
        assert_eq!(FileType::from_path(Path::new("notes.txt")).unwrap(), FileType::Text);
        assert_eq!(FileType::from_path(Path::new("memo.docx")).unwrap(), FileType::Docx);
        assert!(matches!(
            FileType::from_path(Path::new("image.png")),
            Err(SporError::TextExtraction(_))
        ));
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>The sky </w:t></w:r><w:r><w:t>is blue.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Fish &amp; chips.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = DocumentExtractor.extract(&docx_with(xml), FileType::Docx).unwrap();
        assert_eq!(text, "The sky is blue.\nFish & chips.");
    }

    #[test]
    fn test_docx_without_document_part() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            DocumentExtractor.extract(&bytes, FileType::Docx),
            Err(SporError::TextExtraction(_))
        ));
    }

    #[test]
    fn test_invalid_pdf_is_typed() {
        assert!(matches!(
            DocumentExtractor.extract(b"not a pdf", FileType::Pdf),
            Err(SporError::TextExtraction(_))
        ));
    }

    #[test]
    fn test_plain_text_lossy() {
        let text = DocumentExtractor.extract(b"caf\xe9 ok", FileType::Text).unwrap();
        assert!(text.ends_with(" ok"));
        assert_eq!(DocumentExtractor.extract("blå".as_bytes(), FileType::Text).unwrap(), "blå");
    }
}
