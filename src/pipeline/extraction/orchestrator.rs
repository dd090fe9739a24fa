use std::path::Path;

use tracing::{debug, info, info_span, warn};

use super::ocr::default_ocr_engine;
use super::pdf::PdfTextExtractor;
use super::pdfium::{PdfiumRenderer, OCR_RENDER_DPI};
use super::preprocess::prepare_for_ocr;
use super::source::{classify_format, DocumentFetcher, DocumentSource, SourceFetcher};
use super::types::{
    ExtractionMetadata, ExtractionMethod, ExtractionResult, FileType, ImageDimensions,
    OcrEngine, PdfExtractor, PdfPageRenderer, TextExtractor,
};
use super::ExtractionError;

/// A PDF text layer shorter than this (after trimming) is treated as a scan.
pub const MIN_DIRECT_TEXT_CHARS: usize = 100;

/// Scanned PDFs are OCR'd up to this many leading pages.
pub const MAX_OCR_PAGES: usize = 5;

/// Text recovered from a document, before it is wrapped in a result.
struct ExtractedText {
    text: String,
    method: ExtractionMethod,
    pages_processed: Option<usize>,
    image_dimensions: Option<ImageDimensions>,
}

/// Concrete implementation of the text extractor.
/// Uses trait objects for fetching, OCR and PDF handling, enabling dependency injection.
pub struct DocumentExtractor {
    fetcher: Box<dyn DocumentFetcher + Send + Sync>,
    ocr_engine: Box<dyn OcrEngine + Send + Sync>,
    pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
    pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
}

impl DocumentExtractor {
    pub fn new(
        fetcher: Box<dyn DocumentFetcher + Send + Sync>,
        ocr_engine: Box<dyn OcrEngine + Send + Sync>,
        pdf_extractor: Box<dyn PdfExtractor + Send + Sync>,
        pdf_renderer: Box<dyn PdfPageRenderer + Send + Sync>,
    ) -> Self {
        Self {
            fetcher,
            ocr_engine,
            pdf_extractor,
            pdf_renderer,
        }
    }

    /// Production wiring: HTTP/disk fetcher, pdf-extract text layer,
    /// PDFium rasterizer and the best available OCR engine.
    pub fn with_defaults(
        timeout_secs: u64,
        tessdata_dir: Option<&Path>,
    ) -> Result<Self, ExtractionError> {
        Ok(Self::new(
            Box::new(SourceFetcher::new(timeout_secs)?),
            default_ocr_engine(tessdata_dir),
            Box::new(PdfTextExtractor),
            Box::new(PdfiumRenderer::new()),
        ))
    }

    fn try_extract(
        &self,
        source: &DocumentSource,
        known: &mut ExtractionMetadata,
    ) -> Result<ExtractionResult, ExtractionError> {
        let fetched = self.fetcher.fetch(source)?;
        known.file_size = Some(fetched.bytes.len() as u64);

        let file_type = classify_format(fetched.content_type.as_deref(), &source.extension())?;
        known.file_type = Some(file_type);

        debug!(
            file_type = %file_type,
            size = fetched.bytes.len(),
            "Classified document"
        );

        let extracted = match file_type {
            FileType::Pdf => self.extract_pdf(&fetched.bytes)?,
            FileType::Image => self.extract_image(&fetched.bytes)?,
            FileType::Text => extract_plain_text(fetched.bytes)?,
        };

        let text = extracted.text.trim().to_string();

        info!(
            file_type = %file_type,
            method = ?extracted.method,
            pages = ?extracted.pages_processed,
            text_length = text.len(),
            "Text extraction complete"
        );

        Ok(ExtractionResult::succeeded(
            text,
            ExtractionMetadata {
                file_name: known.file_name.clone(),
                file_type: Some(file_type),
                file_size: known.file_size,
                pages_processed: extracted.pages_processed,
                extraction_method: Some(extracted.method),
                image_dimensions: extracted.image_dimensions,
            },
        ))
    }

    /// Direct text layer first; OCR of the leading pages when the layer is
    /// too thin or unreadable. Direct text is discarded on fallback.
    fn extract_pdf(&self, pdf_bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        match self.pdf_extractor.extract_pages(pdf_bytes) {
            Ok(pages) => {
                let text = join_pages(&pages);
                let direct_chars = text.trim().chars().count();
                if direct_chars >= MIN_DIRECT_TEXT_CHARS {
                    return Ok(ExtractedText {
                        text,
                        method: ExtractionMethod::Direct,
                        pages_processed: Some(pages.len()),
                        image_dimensions: None,
                    });
                }
                debug!(
                    direct_chars,
                    threshold = MIN_DIRECT_TEXT_CHARS,
                    "PDF text layer too thin, falling back to OCR"
                );
            }
            Err(e) => {
                warn!(error = %e, "Direct PDF text extraction failed, using OCR");
            }
        }

        self.ocr_pdf(pdf_bytes)
    }

    /// Rasterize and OCR at most [`MAX_OCR_PAGES`] pages.
    fn ocr_pdf(&self, pdf_bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let total_pages = self.pdf_renderer.page_count(pdf_bytes)?;
        let page_limit = total_pages.min(MAX_OCR_PAGES);
        if total_pages > MAX_OCR_PAGES {
            info!(
                total_pages,
                processed = page_limit,
                "Scanned PDF exceeds OCR page cap, trailing pages skipped"
            );
        }

        let mut page_texts = Vec::with_capacity(page_limit);
        for page_number in 0..page_limit {
            let png = self
                .pdf_renderer
                .render_page(pdf_bytes, page_number, OCR_RENDER_DPI)?;
            let prepared = prepare_for_ocr(&png)?;
            let ocr = self.ocr_engine.ocr_image(&prepared.png_bytes)?;
            debug!(
                page = page_number + 1,
                confidence = ocr.confidence,
                chars = ocr.text.len(),
                "OCR'd PDF page"
            );
            page_texts.push(ocr.text);
        }

        Ok(ExtractedText {
            text: join_pages(&page_texts),
            method: ExtractionMethod::Ocr,
            pages_processed: Some(page_limit),
            image_dimensions: None,
        })
    }

    fn extract_image(&self, image_bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        let prepared = prepare_for_ocr(image_bytes)?;
        let ocr = self.ocr_engine.ocr_image(&prepared.png_bytes)?;
        debug!(confidence = ocr.confidence, "OCR'd image");

        Ok(ExtractedText {
            text: ocr.text,
            method: ExtractionMethod::Ocr,
            pages_processed: None,
            image_dimensions: Some(ImageDimensions {
                width: prepared.width,
                height: prepared.height,
            }),
        })
    }
}

fn extract_plain_text(bytes: Vec<u8>) -> Result<ExtractedText, ExtractionError> {
    let text =
        String::from_utf8(bytes).map_err(|e| ExtractionError::EncodingError(e.to_string()))?;
    Ok(ExtractedText {
        text,
        method: ExtractionMethod::Direct,
        pages_processed: None,
        image_dimensions: None,
    })
}

/// Concatenate page texts with 1-based page markers. Blank pages are
/// skipped but keep their number, so markers match the source document.
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("\n--- Page {} ---\n{}", i + 1, text))
        .collect()
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, source_ref: &str) -> ExtractionResult {
        let source = DocumentSource::parse(source_ref);
        let _span = info_span!("extract", source = %source).entered();

        let mut known = ExtractionMetadata {
            file_name: source.file_name(),
            ..ExtractionMetadata::default()
        };

        match self.try_extract(&source, &mut known) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Text extraction failed");
                ExtractionResult::failed(&e, known)
            }
        }
    }
}
