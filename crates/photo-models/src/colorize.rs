//! DeOldify-style colorization
//!
//! The network sees a grayscale copy of the photo at a reduced, square
//! resolution controlled by the render factor. Only the chroma of its output
//! is kept: it is scaled back to the source size and recombined with the
//! source luminance so that fine detail comes from the original.

use crate::error::{ModelError, Result};
use crate::onnx;
use crate::tensor::{self, Normalization};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Render factor used by the restoration pipeline
pub const DEFAULT_RENDER_FACTOR: u32 = 35;

/// Pixels of model input per render factor step
const RENDER_BASE: u32 = 16;

/// A colorization model operating on RGB images
pub trait Colorizer: Send + Sync {
    fn colorize(&self, image: &RgbImage, render_factor: u32) -> Result<RgbImage>;
}

/// Colorizer backed by a DeOldify ONNX export
pub struct OnnxColorizer {
    session: Mutex<Session>,
}

impl OnnxColorizer {
    /// Load the model from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading colorization model");
        let session = onnx::load_session(path)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl Colorizer for OnnxColorizer {
    fn colorize(&self, image: &RgbImage, render_factor: u32) -> Result<RgbImage> {
        let size = render_size(render_factor)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ModelError::Preprocess("empty image".to_string()));
        }

        let gray = grayscale_rgb(image);
        let small = imageops::resize(&gray, size, size, FilterType::Triangle);

        let input = tensor::rgb_to_nchw(&small, Normalization::IMAGENET);
        let (shape, data) = onnx::run_single(&self.session, &input)?;
        let colored = tensor::nchw_to_rgb(&shape, &data, Normalization::IMAGENET)?;

        let chroma = imageops::resize(&colored, width, height, FilterType::Lanczos3);
        debug!(width, height, render_size = size, "Colorization complete");

        Ok(merge_luma_chroma(image, &chroma))
    }
}

/// Square model input size for a render factor
fn render_size(render_factor: u32) -> Result<u32> {
    match render_factor.checked_mul(RENDER_BASE) {
        Some(size) if size > 0 => Ok(size),
        _ => Err(ModelError::Preprocess(format!(
            "invalid render factor {}",
            render_factor
        ))),
    }
}

/// Grayscale copy kept in three channels
fn grayscale_rgb(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let (y, _, _) = to_ycbcr(px);
        let y = y.clamp(0.0, 255.0).round() as u8;
        *px = Rgb([y, y, y]);
    }
    out
}

/// Luma from `luma_src`, chroma from `chroma_src`. Both must share dimensions.
fn merge_luma_chroma(luma_src: &RgbImage, chroma_src: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(luma_src.width(), luma_src.height());
    for ((dst, l), c) in out
        .pixels_mut()
        .zip(luma_src.pixels())
        .zip(chroma_src.pixels())
    {
        let (y, _, _) = to_ycbcr(l);
        let (_, cb, cr) = to_ycbcr(c);
        *dst = from_ycbcr(y, cb, cr);
    }
    out
}

// BT.601 full range
fn to_ycbcr(px: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = px.0.map(f32::from);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

fn from_ycbcr(y: f32, cb: f32, cr: f32) -> Rgb<u8> {
    let r = y + 1.402 * (cr - 128.0);
    let g = y - 0.344_136 * (cb - 128.0) - 0.714_136 * (cr - 128.0);
    let b = y + 1.772 * (cb - 128.0);
    Rgb([r, g, b].map(|v| v.clamp(0.0, 255.0).round() as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_size() {
        assert_eq!(render_size(DEFAULT_RENDER_FACTOR).unwrap(), 560);
        assert!(render_size(0).is_err());
    }

    #[test]
    fn test_grayscale_rgb_equalizes_channels() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([200, 30, 90]));
        img.put_pixel(1, 1, Rgb([0, 255, 0]));

        for px in grayscale_rgb(&img).pixels() {
            assert_eq!(px.0[0], px.0[1]);
            assert_eq!(px.0[1], px.0[2]);
        }
    }

    #[test]
    fn test_ycbcr_roundtrip_is_close() {
        for rgb in [[0, 0, 0], [255, 255, 255], [12, 200, 99], [250, 3, 180]] {
            let px = Rgb(rgb);
            let (y, cb, cr) = to_ycbcr(&px);
            let back = from_ycbcr(y, cb, cr);
            for c in 0..3 {
                assert!((i16::from(back.0[c]) - i16::from(rgb[c])).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_merge_keeps_source_luma() {
        let luma = RgbImage::from_pixel(3, 3, Rgb([120, 120, 120]));
        let chroma = RgbImage::from_pixel(3, 3, Rgb([200, 80, 40]));

        let merged = merge_luma_chroma(&luma, &chroma);
        let (y, _, _) = to_ycbcr(merged.get_pixel(1, 1));
        assert!((y - 120.0).abs() < 2.0);
        // Chroma from the second image tints the result
        assert!(merged.get_pixel(1, 1).0[0] > merged.get_pixel(1, 1).0[2]);
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxColorizer::load(dir.path().join("deoldify.onnx")).err().unwrap();
        assert!(matches!(err, ModelError::NotFound(_)));
    }
}
