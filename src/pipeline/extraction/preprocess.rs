//! Image preparation for Tesseract OCR.
//!
//! Tesseract reads small scans poorly, so every page image goes through the
//! same two steps before recognition: greyscale conversion, then a uniform
//! Lanczos3 upscale until the shorter side reaches [`MIN_OCR_DIMENSION`].
//! Images already large enough are left at their native resolution.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::{debug, warn};

use super::ExtractionError;

/// Shorter-side floor for OCR input, in pixels.
pub const MIN_OCR_DIMENSION: u32 = 1000;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Longest side an upscale may produce. Extreme aspect ratios (a tall
/// receipt strip) get a smaller scale factor instead of a gigapixel buffer.
pub const MAX_UPSCALED_DIMENSION: u32 = 20_000;

/// Greyscale PNG ready for the OCR engine.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::ImageProcessing("Image data is empty".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Target size for the OCR upscale.
///
/// Returns the input unchanged when both sides are already at least
/// [`MIN_OCR_DIMENSION`]. Otherwise scales uniformly by
/// `max(1000/w, 1000/h)`, rounding up, so the shorter side lands on exactly
/// 1000 px and the aspect ratio is kept.
///
/// When that would push the longer side past [`MAX_UPSCALED_DIMENSION`], the
/// factor shrinks so the longer side lands on the cap instead. An image whose
/// longer side is already at the cap is never shrunk.
pub fn upscale_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    if width >= MIN_OCR_DIMENSION && height >= MIN_OCR_DIMENSION {
        return (width, height);
    }

    let min = MIN_OCR_DIMENSION as u64;
    let cap = MAX_UPSCALED_DIMENSION as u64;
    let portrait = width <= height;
    let (short, long) = if portrait {
        (width as u64, height as u64)
    } else {
        (height as u64, width as u64)
    };

    let (short_t, long_t) = if (long * min).div_ceil(short) <= cap {
        (min, (long * min).div_ceil(short))
    } else if long >= cap {
        (short, long)
    } else {
        ((short * cap / long).max(short), cap)
    };

    if portrait {
        (short_t as u32, long_t as u32)
    } else {
        (long_t as u32, short_t as u32)
    }
}

/// Decode, greyscale and upscale an image for OCR.
pub fn prepare_for_ocr(image_bytes: &[u8]) -> Result<PreparedImage, ExtractionError> {
    validate_image_bytes(image_bytes)?;

    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| ExtractionError::ImageProcessing(format!("Failed to decode image: {e}")))?;

    let (orig_w, orig_h) = decoded.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(ExtractionError::ImageProcessing(
            "Image has zero width or height".into(),
        ));
    }

    let gray = match decoded {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    };

    let (target_w, target_h) = upscale_dimensions(orig_w, orig_h);
    if target_w.min(target_h) < MIN_OCR_DIMENSION.min(orig_w.max(orig_h)) {
        warn!(
            from = format!("{orig_w}x{orig_h}"),
            to = format!("{target_w}x{target_h}"),
            "Upscale capped at {MAX_UPSCALED_DIMENSION}px on the long side"
        );
    }

    let gray = if (target_w, target_h) != (orig_w, orig_h) {
        debug!(
            from = format!("{orig_w}x{orig_h}"),
            to = format!("{target_w}x{target_h}"),
            "Upscaling image for OCR"
        );
        image::imageops::resize(&gray, target_w, target_h, FilterType::Lanczos3)
    } else {
        gray
    };

    let (width, height) = gray.dimensions();
    let png_bytes = encode_png(&DynamicImage::ImageLuma8(gray))?;

    Ok(PreparedImage {
        png_bytes,
        width,
        height,
    })
}

/// Encode an image as PNG bytes.
/// Images are transient OCR input, so default compression is used.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// RGB PNG fixture of the given size with a dark band across the middle.
    pub(crate) fn make_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbImage::from_pixel(width, height, Rgb([250, 250, 250]));
        for x in 0..width {
            img.put_pixel(x, height / 2, Rgb([10, 10, 10]));
        }
        encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn small_image_upscaled_to_min_dimension() {
        assert_eq!(upscale_dimensions(500, 800), (1000, 1600));
        assert_eq!(upscale_dimensions(800, 500), (1600, 1000));
    }

    #[test]
    fn upscale_rounds_up_so_short_side_reaches_floor() {
        let (w, h) = upscale_dimensions(300, 700);
        assert_eq!(w, 1000);
        assert_eq!(h, 2334); // 700 * 1000 / 300 = 2333.3
    }

    #[test]
    fn one_small_side_drives_scale() {
        assert_eq!(upscale_dimensions(2000, 500), (4000, 1000));
    }

    #[test]
    fn large_image_left_alone() {
        assert_eq!(upscale_dimensions(1000, 1000), (1000, 1000));
        assert_eq!(upscale_dimensions(2480, 3508), (2480, 3508));
    }

    #[test]
    fn prepare_converts_to_greyscale_and_upscales() {
        let prepared = prepare_for_ocr(&make_png(500, 800)).unwrap();
        assert_eq!((prepared.width, prepared.height), (1000, 1600));

        let decoded = image::load_from_memory(&prepared.png_bytes).unwrap();
        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
        assert_eq!(decoded.dimensions(), (1000, 1600));
    }

    #[test]
    fn prepare_keeps_large_image_size() {
        let prepared = prepare_for_ocr(&make_png(1200, 1000)).unwrap();
        assert_eq!((prepared.width, prepared.height), (1200, 1000));
    }

    #[test]
    fn prepare_rejects_undecodable_bytes() {
        let err = prepare_for_ocr(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ExtractionError::ImageProcessing(_)));
    }

    #[test]
    fn prepare_rejects_empty_input() {
        assert!(prepare_for_ocr(&[]).is_err());
    }

    #[test]
    fn oversized_input_rejected_before_decode() {
        let huge = vec![0u8; MAX_IMAGE_BYTES + 1];
        let err = validate_image_bytes(&huge).unwrap_err();
        assert!(err.to_string().contains("50MB"));
    }

    #[test]
    fn tall_strip_upscale_capped_on_long_side() {
        // 400x9000 would need 1000x22500
        assert_eq!(upscale_dimensions(400, 9000), (888, MAX_UPSCALED_DIMENSION));
        assert_eq!(upscale_dimensions(9000, 400), (MAX_UPSCALED_DIMENSION, 888));
    }

    #[test]
    fn strip_already_at_cap_keeps_native_size() {
        assert_eq!(upscale_dimensions(300, 25_000), (300, 25_000));
    }

    #[test]
    fn extreme_aspect_ratio_still_prepared() {
        let prepared = prepare_for_ocr(&make_png(1, 40)).unwrap();
        assert_eq!((prepared.width, prepared.height), (500, MAX_UPSCALED_DIMENSION));
    }
}
