//! Upload-side image preprocessing.
//!
//! Lab-report photos arrive straight from phone cameras, so before the image
//! is base64-encoded and shipped to the vision provider it is downscaled to a
//! bounded size and re-encoded as JPEG. Compression is strictly best-effort:
//! any decode or encode failure returns the original bytes untouched — the
//! pipeline never blocks on a compression error.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::debug;

/// Neither output dimension exceeds this. Scaling is down-only.
pub const MAX_UPLOAD_DIMENSION: u32 = 1024;

/// Default JPEG re-encode quality (0-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Downscale and re-encode an uploaded image for transmission.
///
/// Decodes, fixes EXIF orientation, scales so `max(width, height) <= 1024`
/// (never upscales), re-encodes as JPEG at `quality`. On any failure the
/// input bytes are returned unchanged.
pub fn compress_for_upload(bytes: &[u8], quality: u8) -> Vec<u8> {
    match try_compress(bytes, quality) {
        Ok(jpeg) => jpeg,
        Err(reason) => {
            debug!(reason, "Image compression skipped, passing original through");
            bytes.to_vec()
        }
    }
}

fn try_compress(bytes: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;

    // Phone photos embed rotation in EXIF tag 0x0112; apply it before
    // resizing so the vision model sees upright text.
    let img = apply_orientation(img, read_exif_orientation(bytes));

    let (w, h) = img.dimensions();
    let (target_w, target_h) = fit_within(w, h, MAX_UPLOAD_DIMENSION);

    let resized = if (target_w, target_h) == (w, h) {
        img
    } else {
        img.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    let mut cursor = Cursor::new(Vec::new());
    resized
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| e.to_string())?;

    debug!(
        from = format!("{w}x{h}"),
        to = format!("{target_w}x{target_h}"),
        jpeg_size = cursor.get_ref().len(),
        "Image compressed for upload"
    );

    Ok(cursor.into_inner())
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        1 => img,
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Dimensions scaled so the longest edge fits `max_dim`, aspect preserved.
/// Images already within bounds come back unchanged.
fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max_dim || largest == 0 {
        return (width, height);
    }

    let scale = max_dim as f32 / largest as f32;
    let new_w = ((width as f32 * scale).round() as u32).max(1);
    let new_h = ((height as f32 * scale).round() as u32).max(1);
    (new_w, new_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn make_png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 90, 90])));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
        cursor.into_inner()
    }

    fn decoded_dims(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn oversized_image_capped_at_1024() {
        let png = make_png(2048, 1536);
        let jpeg = compress_for_upload(&png, DEFAULT_JPEG_QUALITY);

        let (w, h) = decoded_dims(&jpeg);
        assert_eq!(w.max(h), 1024);
        // Aspect ratio preserved: 2048x1536 -> 1024x768
        assert_eq!((w, h), (1024, 768));
    }

    #[test]
    fn tall_image_capped_on_height() {
        let png = make_png(500, 4000);
        let jpeg = compress_for_upload(&png, DEFAULT_JPEG_QUALITY);

        let (w, h) = decoded_dims(&jpeg);
        assert_eq!(h, 1024);
        assert!(w < 500);
    }

    #[test]
    fn small_image_not_upscaled() {
        let png = make_png(640, 480);
        let jpeg = compress_for_upload(&png, DEFAULT_JPEG_QUALITY);

        // Re-encoded as JPEG but dimensions untouched
        assert_eq!(decoded_dims(&jpeg), (640, 480));
    }

    #[test]
    fn undecodable_bytes_passed_through_unchanged() {
        let garbage = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x11];
        let out = compress_for_upload(&garbage, DEFAULT_JPEG_QUALITY);
        assert_eq!(out, garbage);
    }

    #[test]
    fn empty_input_passed_through() {
        let out = compress_for_upload(&[], DEFAULT_JPEG_QUALITY);
        assert!(out.is_empty());
    }

    #[test]
    fn fit_within_only_scales_down() {
        assert_eq!(fit_within(2048, 1024, 1024), (1024, 512));
        assert_eq!(fit_within(800, 600, 1024), (800, 600));
        assert_eq!(fit_within(1024, 1024, 1024), (1024, 1024));
        assert_eq!(fit_within(0, 0, 1024), (0, 0));
    }

    #[test]
    fn exif_absent_returns_identity() {
        let png = make_png(10, 10);
        assert_eq!(read_exif_orientation(&png), 1);
    }

    #[test]
    fn orientation_six_rotates_90() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([0, 0, 0])));
        let rotated = apply_orientation(img, 6);
        assert_eq!(rotated.dimensions(), (20, 10));
    }

    #[test]
    fn orientation_unknown_is_identity() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([0, 0, 0])));
        let same = apply_orientation(img, 42);
        assert_eq!(same.dimensions(), (10, 20));
    }
}
