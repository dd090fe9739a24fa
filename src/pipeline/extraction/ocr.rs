use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Page segmentation mode 6: assume a single uniform block of text.
/// Lab reports are mostly one column of label/value rows.
pub const OCR_PAGE_SEG_MODE: &str = "6";

/// Characters Tesseract may emit. Restricting to report vocabulary cuts
/// the noise glyphs that smudged scans otherwise produce.
pub const OCR_CHAR_WHITELIST: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz.,()/:- ";

/// Tesseract OCR engine (LSTM + legacy default engine mode).
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    tessdata_dir: Option<std::path::PathBuf>,
    lang: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    /// Initialize against an explicit tessdata directory, or the system
    /// default when `None`.
    pub fn new(tessdata_dir: Option<&std::path::Path>) -> Result<Self, ExtractionError> {
        if let Some(dir) = tessdata_dir {
            if !dir.join("eng.traineddata").exists() {
                return Err(ExtractionError::OcrInit(format!(
                    "eng.traineddata not found in {}",
                    dir.display()
                )));
            }
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.map(|d| d.to_path_buf()),
            lang: "eng".to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata = match &self.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?,
            ),
            None => None,
        };

        let mut tess = tesseract::Tesseract::new(tessdata, Some(self.lang.as_str()))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?
            .set_variable("tessedit_pageseg_mode", OCR_PAGE_SEG_MODE)
            .map_err(|e| ExtractionError::OcrConfig(format!("Failed to set page mode: {e:?}")))?
            .set_variable("tessedit_char_whitelist", OCR_CHAR_WHITELIST)
            .map_err(|e| ExtractionError::OcrConfig(format!("Failed to set whitelist: {e:?}")))?
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrPageResult { text, confidence })
    }
}

/// Stand-in engine for builds without the `ocr` feature. Every call fails,
/// so image and scanned-PDF extraction report an error instead of
/// silently returning nothing.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrInit(
            "Tesseract support not compiled in (build with --features ocr)".into(),
        ))
    }
}

/// The best OCR engine this build offers.
pub fn default_ocr_engine(
    tessdata_dir: Option<&std::path::Path>,
) -> Box<dyn OcrEngine + Send + Sync> {
    #[cfg(feature = "ocr")]
    {
        match TesseractOcr::new(tessdata_dir) {
            Ok(engine) => return Box::new(engine),
            Err(e) => tracing::warn!(error = %e, "Tesseract unavailable, OCR disabled"),
        }
    }
    #[cfg(not(feature = "ocr"))]
    {
        let _ = tessdata_dir;
        tracing::debug!("Built without the ocr feature, OCR disabled");
    }
    Box::new(UnavailableOcr)
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    fail: bool,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("", 0.0)
        }
    }

    /// Number of images recognized so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtractionError::OcrProcessing("mock OCR failure".into()));
        }
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}
