//! Subject-over-background compositing
//!
//! The background is stretched to the subject's exact pixel size (aspect
//! ratio is not preserved) and the subject is laid over it at the origin
//! with source-over alpha compositing, then the result is PNG encoded.

use crate::data_url::DataUrl;
use crate::error::{MorphError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

/// Filter used when stretching the background onto the subject
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Composite `subject_bytes` over the background file at `background_path`
///
/// Decoding, resizing and encoding run on the blocking pool.
///
/// # Errors
/// - `BackgroundNotFound` when the background file does not exist
/// - `Composition` for any decode, resize or encode failure
#[instrument(skip(subject_bytes), fields(subject_len = subject_bytes.len(), background = %background_path.display()))]
pub async fn compose_file(subject_bytes: Vec<u8>, background_path: &Path) -> Result<String> {
    if !tokio::fs::try_exists(background_path).await.unwrap_or(false) {
        return Err(MorphError::BackgroundNotFound(background_path.to_path_buf()));
    }

    debug!("Loading background image");
    let background_bytes = tokio::fs::read(background_path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MorphError::BackgroundNotFound(background_path.to_path_buf())
        } else {
            MorphError::Io(e)
        }
    })?;

    tokio::task::spawn_blocking(move || compose_to_data_url(&subject_bytes, &background_bytes))
        .await
        .map_err(|e| MorphError::composition(format!("compositing task failed: {}", e)))?
}

/// Decode both images, composite, and return a PNG data URL
pub fn compose_to_data_url(subject_bytes: &[u8], background_bytes: &[u8]) -> Result<String> {
    let subject = decode(subject_bytes, "subject")?;
    let background = decode(background_bytes, "background")?;
    let composed = compose(&subject, &background);
    let png = encode_png(&composed)?;
    Ok(DataUrl::encode("image/png", &png))
}

/// Stretch `background` to `subject`'s size and lay `subject` over it
#[must_use]
pub fn compose(subject: &DynamicImage, background: &DynamicImage) -> RgbaImage {
    let subject = subject.to_rgba8();
    let (width, height) = subject.dimensions();

    let mut canvas = if background.width() == width && background.height() == height {
        background.to_rgba8()
    } else {
        background
            .resize_exact(width, height, RESIZE_FILTER)
            .to_rgba8()
    };

    for (dst, src) in canvas.pixels_mut().zip(subject.pixels()) {
        blend_over(dst, src);
    }
    canvas
}

/// Non-premultiplied source-over: `src` on top of `dst`
fn blend_over(dst: &mut Rgba<u8>, src: &Rgba<u8>) {
    let [sr, sg, sb, sa] = src.0.map(u32::from);
    match sa {
        0 => return,
        255 => {
            *dst = *src;
            return;
        },
        _ => {},
    }

    let [dr, dg, db, da] = dst.0.map(u32::from);
    // Weights scaled by 255 * 255
    let src_weight = sa * 255;
    let dst_weight = da * (255 - sa);
    let out_alpha = src_weight + dst_weight;
    if out_alpha == 0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }

    let channel = |s: u32, d: u32| -> u8 {
        ((s * src_weight + d * dst_weight + out_alpha / 2) / out_alpha).min(255) as u8
    };
    *dst = Rgba([
        channel(sr, dr),
        channel(sg, dg),
        channel(sb, db),
        ((out_alpha + 127) / 255).min(255) as u8,
    ]);
}

fn decode(bytes: &[u8], what: &str) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| MorphError::composition(format!("failed to decode {} image: {}", what, e)))
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| MorphError::composition(format!("failed to encode PNG: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(pixel)))
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_opaque_subject_replaces_background() {
        let mut subject = RgbaImage::new(4, 3);
        for (x, y, pixel) in subject.enumerate_pixels_mut() {
            *pixel = Rgba([(x * 40) as u8, (y * 70) as u8, 200, 255]);
        }
        let subject = DynamicImage::ImageRgba8(subject);
        let background = solid(4, 3, [10, 20, 30, 255]);

        let composed = compose(&subject, &background);
        assert_eq!(composed, subject.to_rgba8());
    }

    #[test]
    fn test_transparent_subject_shows_background() {
        let subject = solid(5, 5, [255, 0, 0, 0]);
        let background = solid(5, 5, [12, 34, 56, 255]);

        let composed = compose(&subject, &background);
        assert!(composed.pixels().all(|p| *p == Rgba([12, 34, 56, 255])));
    }

    #[test]
    fn test_background_stretched_to_subject_size() {
        let subject = solid(7, 2, [0, 0, 0, 0]);
        let background = solid(64, 64, [90, 90, 90, 255]);

        let composed = compose(&subject, &background);
        assert_eq!(composed.dimensions(), (7, 2));
        assert!(composed
            .pixels()
            .all(|p| p.0.iter().take(3).all(|c| c.abs_diff(90) <= 1) && p.0[3] >= 254));
    }

    #[test]
    fn test_half_alpha_blends() {
        let mut dst = Rgba([0, 0, 0, 255]);
        blend_over(&mut dst, &Rgba([255, 255, 255, 128]));
        assert_eq!(dst.0[3], 255);
        assert!((127..=129).contains(&dst.0[0]));

        let mut dst = Rgba([0, 0, 0, 0]);
        blend_over(&mut dst, &Rgba([200, 100, 50, 128]));
        assert_eq!(dst, Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn test_compose_to_data_url_round_trip() {
        let subject = solid(3, 3, [1, 2, 3, 255]);
        let background = solid(9, 9, [4, 5, 6, 255]);

        let url = compose_to_data_url(&png_bytes(&subject), &png_bytes(&background)).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let decoded = DataUrl::parse(&url).unwrap();
        let image = image::load_from_memory(&decoded.data).unwrap().to_rgba8();
        assert_eq!(image, subject.to_rgba8());
    }

    #[test]
    fn test_undecodable_input_is_composition_error() {
        let background = png_bytes(&solid(2, 2, [0, 0, 0, 255]));
        let err = compose_to_data_url(b"not an image", &background).unwrap_err();
        assert!(matches!(err, MorphError::Composition(_)));
        assert!(err.to_string().contains("subject"));
    }

    #[tokio::test]
    async fn test_missing_background_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("bg2.png");
        let err = compose_file(png_bytes(&solid(1, 1, [0, 0, 0, 255])), &path)
            .await
            .unwrap_err();
        assert!(matches!(err, MorphError::BackgroundNotFound(_)));
        assert!(err.to_string().starts_with("Background image not found: "));
        assert!(err.to_string().ends_with("bg2.png"));
    }
}
