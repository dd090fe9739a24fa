use std::panic::{self, AssertUnwindSafe};

use super::types::PdfExtractor;
use super::ExtractionError;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        // pdf-extract panics on some malformed font and xref tables.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        }));

        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(ExtractionError::PdfParsing(e.to_string())),
            Err(_) => Err(ExtractionError::PdfParsing(
                "PDF parser aborted on malformed input".into(),
            )),
        }
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock text-layer extractor returning fixed pages, or a parse failure
/// when constructed with [`MockPdfExtractor::failing`].
pub struct MockPdfExtractor {
    pages: Option<Vec<String>>,
}

impl MockPdfExtractor {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: Some(pages.iter().map(|p| p.to_string()).collect()),
        }
    }

    pub fn failing() -> Self {
        Self { pages: None }
    }
}

impl PdfExtractor for MockPdfExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        self.pages
            .clone()
            .ok_or_else(|| ExtractionError::PdfParsing("mock parse failure".into()))
    }
}
