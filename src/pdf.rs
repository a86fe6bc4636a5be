use std::path::Path;

use regex::Regex;

use crate::error::Result;
#[cfg(not(feature = "pdf"))]
use crate::error::ReimburseError;
use crate::settings::PdfExtraction;

pub type TextTable = Vec<Vec<String>>;

/// Text (pages joined by newlines) and any column-aligned regions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfContent {
    pub text: String,
    pub tables: Vec<TextTable>,
}

/// Anything that can turn a PDF file into plain text.
pub trait PdfTextSource {
    fn read_text(&self, path: &Path) -> Result<String>;
}

/// Read a PDF and apply the configured cleanup and table detection.
pub fn load_content(source: &dyn PdfTextSource, path: &Path, settings: &PdfExtraction) -> Result<PdfContent> {
    let mut text = source.read_text(path)?;
    if settings.text_cleanup {
        text = cleanup_text(&text);
    }
    let tables = if settings.table_extraction {
        detect_tables(&text)
    } else {
        Vec::new()
    };
    Ok(PdfContent { text, tables })
}

pub fn cleanup_text(text: &str) -> String {
    text.replace('\r', "").replace('\t', " ")
}

/// Group runs of two or more consecutive lines that split into at least
/// three cells on wide gaps (two spaces or more).
pub fn detect_tables(text: &str) -> Vec<TextTable> {
    let Ok(gap) = Regex::new(r"\s{2,}") else {
        return Vec::new();
    };
    let mut tables = Vec::new();
    let mut current: TextTable = Vec::new();
    for line in text.lines() {
        let cells: Vec<String> = gap
            .split(line.trim())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 3 {
            current.push(cells);
            continue;
        }
        if current.len() >= 2 {
            tables.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 2 {
        tables.push(current);
    }
    tables
}

// ---------------------------------------------------------------------------
// pdf-extract backed source (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "pdf")]
pub struct PdfExtractSource;

#[cfg(feature = "pdf")]
impl PdfTextSource for PdfExtractSource {
    fn read_text(&self, path: &Path) -> Result<String> {
        use crate::error::ReimburseError;
        use tracing::{debug, warn};

        let bytes = std::fs::read(path)?;
        let doc = lopdf::Document::load_mem(&bytes)
            .map_err(|e| ReimburseError::Pdf(format!("Failed to parse PDF: {e}")))?;
        let pages = doc.get_pages().len();
        if pages == 0 {
            return Err(ReimburseError::Pdf("PDF has no pages".to_string()));
        }

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ReimburseError::Pdf(format!("Text extraction failed: {e}")))?;
        // page breaks come through as form feeds
        let text = text.replace('\u{c}', "\n");
        if text.trim().is_empty() {
            warn!(file = %path.display(), pages, "No text layer; scanned receipts are not supported");
        } else {
            debug!(file = %path.display(), pages, chars = text.len(), "Text extracted");
        }
        Ok(text)
    }
}

#[cfg(not(feature = "pdf"))]
pub struct UnavailableSource;

#[cfg(not(feature = "pdf"))]
impl PdfTextSource for UnavailableSource {
    fn read_text(&self, path: &Path) -> Result<String> {
        Err(ReimburseError::Pdf(format!(
            "{}: built without the `pdf` feature",
            path.display()
        )))
    }
}

pub fn default_source() -> Box<dyn PdfTextSource> {
    #[cfg(feature = "pdf")]
    {
        Box::new(PdfExtractSource)
    }
    #[cfg(not(feature = "pdf"))]
    {
        Box::new(UnavailableSource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedText(&'static str);

    impl PdfTextSource for FixedText {
        fn read_text(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_cleanup_strips_carriage_returns_and_tabs() {
        assert_eq!(cleanup_text("合计\t35.00元\r\n"), "合计 35.00元\n");
    }

    #[test]
    fn test_detect_tables_groups_aligned_lines() {
        let text = "高德打车电子行程单\n\
                    序号  服务商  起点  终点  金额\n\
                    1  高德  西溪首座  蒋村花园  35.00\n\
                    2  高德  蒋村花园  西溪首座  28.50\n\
                    页码 1/1\n";
        let tables = detect_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][0], vec!["序号", "服务商", "起点", "终点", "金额"]);
        assert_eq!(tables[0][2][3], "西溪首座");
    }

    #[test]
    fn test_single_aligned_line_is_not_a_table() {
        assert!(detect_tables("a  b  c\nplain text\n").is_empty());
    }

    #[test]
    fn test_load_content_respects_settings() {
        let source = FixedText("A  B  C\r\nD  E  F\n");
        let path = Path::new("x.pdf");
        let content = load_content(&source, path, &PdfExtraction::default()).unwrap();
        assert_eq!(content.text, "A  B  C\nD  E  F\n");
        assert_eq!(content.tables.len(), 1);

        let settings = PdfExtraction {
            text_cleanup: false,
            table_extraction: false,
            ..PdfExtraction::default()
        };
        let content = load_content(&source, path, &settings).unwrap();
        assert!(content.text.contains('\r'));
        assert!(content.tables.is_empty());
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_garbage_bytes_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        assert!(PdfExtractSource.read_text(&path).is_err());
    }
}
