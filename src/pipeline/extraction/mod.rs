pub mod types;
pub mod source;
pub mod preprocess;
pub mod pdf;
pub mod pdfium;
pub mod ocr;
pub mod classify;
pub mod orchestrator;

pub use types::*;
pub use source::*;
pub use preprocess::*;
pub use pdf::*;
pub use pdfium::*;
pub use ocr::*;
pub use classify::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to download file from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to download file from {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file type: {content_type} (extension: {extension})")]
    UnsupportedFormat {
        content_type: String,
        extension: String,
    },

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected or encrypted")]
    PdfEncrypted,

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("Tesseract OCR configuration error: {0}")]
    OcrConfig(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Text encoding error: {0}")]
    EncodingError(String),
}
