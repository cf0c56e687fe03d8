//! Bitmap decode, transform execution and thumbnail encoding
//!
//! This is the bitmap collaborator boundary: raw bytes in, `DynamicImage`
//! out, and a `TransformPlan` executor that applies rotation, scaling and
//! cropping exactly as planned. Thumbnail variants are encoded as PNG for
//! deterministic, lossless cache write-back.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::app::geometry::{Dimensions, Rotation, TransformPlan};
use crate::errors::{LoadError, LoadResult};

/// Decode raw bytes into a bitmap
///
/// # Errors
///
/// Returns `LoadError::Decode` for corrupt or unsupported image data.
pub fn decode(bytes: &[u8]) -> LoadResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(LoadError::Decode)
}

/// Natural dimensions of a decoded bitmap
pub fn dimensions(bitmap: &DynamicImage) -> Dimensions {
    Dimensions::new(f64::from(bitmap.width()), f64::from(bitmap.height()))
}

/// Apply a transform plan: rotate, then scale, then crop
///
/// # Errors
///
/// Returns `LoadError::Transform` when the plan resolves to a zero-sized
/// result after rounding to whole pixels.
pub fn apply(bitmap: &DynamicImage, plan: &TransformPlan) -> LoadResult<DynamicImage> {
    if plan.is_identity() {
        return Ok(bitmap.clone());
    }

    let mut out = match plan.rotation {
        Rotation::None => bitmap.clone(),
        Rotation::Right => bitmap.rotate90(),
        Rotation::Left => bitmap.rotate270(),
    };

    if plan.scale_x != 1.0 || plan.scale_y != 1.0 {
        let scaled = Dimensions::new(
            f64::from(out.width()) * plan.scale_x,
            f64::from(out.height()) * plan.scale_y,
        );
        if scaled.width < 0.5 || scaled.height < 0.5 {
            return Err(LoadError::Transform {
                reason: format!("scaling produced an empty image ({})", scaled),
            });
        }
        let (w, h) = scaled.round_to_pixels();
        out = out.resize_exact(w, h, FilterType::Triangle);
    }

    if let Some(crop) = plan.crop {
        let x = crop.x.round().max(0.0) as u32;
        let y = crop.y.round().max(0.0) as u32;
        let w = (crop.width.round() as u32).min(out.width().saturating_sub(x));
        let h = (crop.height.round() as u32).min(out.height().saturating_sub(y));
        if w == 0 || h == 0 {
            return Err(LoadError::Transform {
                reason: format!(
                    "crop window {}x{} at ({}, {}) lies outside the {}x{} image",
                    crop.width,
                    crop.height,
                    crop.x,
                    crop.y,
                    out.width(),
                    out.height()
                ),
            });
        }
        out = out.crop_imm(x, y, w, h);
    }

    Ok(out)
}

/// Encode a bitmap as PNG for cache write-back
pub fn encode_png(bitmap: &DynamicImage) -> LoadResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    bitmap
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| LoadError::Transform {
            reason: format!("PNG encode failed: {}", e),
        })?;
    Ok(buffer.into_inner())
}
