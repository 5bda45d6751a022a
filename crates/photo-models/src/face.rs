//! GFPGAN-style face restoration

use crate::error::{ModelError, Result};
use crate::frame::BgrFrame;
use crate::onnx;
use crate::tensor::{self, Normalization};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Square input resolution expected by the restoration network
const MODEL_INPUT_SIZE: u32 = 512;

/// Parameters passed to every face restoration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreParams {
    /// Output scale relative to the input frame
    pub upscale: u32,
    /// Upsample the non-face background with a dedicated model
    pub background_upsampling: bool,
}

impl Default for RestoreParams {
    fn default() -> Self {
        Self {
            upscale: 2,
            background_upsampling: false,
        }
    }
}

/// A face restoration model
///
/// Input and output frames are in BGR channel order.
pub trait FaceRestorer: Send + Sync {
    fn enhance(&self, frame: &BgrFrame, params: &RestoreParams) -> Result<BgrFrame>;
}

/// Face restorer backed by a GFPGAN ONNX export
///
/// The input is first upscaled with Lanczos3 so the background keeps full
/// detail at the output size. The network then runs over that image in
/// `512`×`512` windows and each restored window replaces its source region.
/// The session is guarded by a mutex since inference needs exclusive access.
pub struct OnnxFaceRestorer {
    session: Mutex<Session>,
}

impl OnnxFaceRestorer {
    /// Load the model from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading face restoration model");
        let session = onnx::load_session(path)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn run_network(&self, tile: &RgbImage) -> Result<RgbImage> {
        let input = tensor::rgb_to_nchw(tile, Normalization::SYMMETRIC);
        let (shape, data) = onnx::run_single(&self.session, &input)?;
        tensor::nchw_to_rgb(&shape, &data, Normalization::SYMMETRIC)
    }
}

impl FaceRestorer for OnnxFaceRestorer {
    fn enhance(&self, frame: &BgrFrame, params: &RestoreParams) -> Result<BgrFrame> {
        validate_params(frame, params)?;

        let rgb = frame.to_rgb();
        let (width, height) = rgb.dimensions();
        let (out_w, out_h) = scaled_size(width, height, params.upscale)?;

        let background = imageops::resize(&rgb, out_w, out_h, FilterType::Lanczos3);
        let output = restore_tiles(&background, MODEL_INPUT_SIZE, |tile| self.run_network(tile))?;
        debug!(width, height, out_w, out_h, "Face restoration complete");

        Ok(BgrFrame::from_rgb(&output))
    }
}

/// A region of the image handed to the network in one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Split `width`×`height` into row-major windows of at most `tile`×`tile`
fn tile_windows(width: u32, height: u32, tile: u32) -> Vec<Window> {
    let step = tile.max(1) as usize;
    let mut windows = Vec::new();
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            windows.push(Window {
                x,
                y,
                width: tile.min(width - x),
                height: tile.min(height - y),
            });
        }
    }
    windows
}

/// Pad a crop to `size`×`size` by repeating its right and bottom edges
///
/// The crop sits at the top-left corner unscaled. `crop` must be non-empty
/// and no larger than `size` in either direction.
fn pad_to_square(crop: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = crop.dimensions();
    RgbImage::from_fn(size, size, |x, y| *crop.get_pixel(x.min(w - 1), y.min(h - 1)))
}

/// Run `run` on every padded window of `image` and paste the results back
///
/// Outputs that come back at a different resolution are resized to the
/// window square before the padding is cropped away, so the result always
/// has the dimensions of `image`.
fn restore_tiles(
    image: &RgbImage,
    tile: u32,
    mut run: impl FnMut(&RgbImage) -> Result<RgbImage>,
) -> Result<RgbImage> {
    let mut output = image.clone();

    for window in tile_windows(image.width(), image.height(), tile) {
        let crop = imageops::crop_imm(image, window.x, window.y, window.width, window.height).to_image();
        let mut restored = run(&pad_to_square(&crop, tile))?;
        if restored.dimensions() != (tile, tile) {
            restored = imageops::resize(&restored, tile, tile, FilterType::Lanczos3);
        }
        let restored = imageops::crop_imm(&restored, 0, 0, window.width, window.height).to_image();
        imageops::replace(&mut output, &restored, i64::from(window.x), i64::from(window.y));
    }

    Ok(output)
}

fn scaled_size(width: u32, height: u32, upscale: u32) -> Result<(u32, u32)> {
    match (width.checked_mul(upscale), height.checked_mul(upscale)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(ModelError::Preprocess(format!(
            "{}x{} cannot be upscaled by {}",
            width, height, upscale
        ))),
    }
}

fn validate_params(frame: &BgrFrame, params: &RestoreParams) -> Result<()> {
    if params.background_upsampling {
        return Err(ModelError::Unavailable(
            "background upsampler is not loaded".to_string(),
        ));
    }
    if params.upscale == 0 {
        return Err(ModelError::Preprocess("upscale must be at least 1".to_string()));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ModelError::Preprocess("empty frame".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_default_params() {
        let params = RestoreParams::default();
        assert_eq!(params.upscale, 2);
        assert!(!params.background_upsampling);
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gfpgan_v1.4.onnx");

        let err = OnnxFaceRestorer::load(&path).err().unwrap();
        assert!(matches!(err, ModelError::NotFound(p) if p == path));
    }

    #[test]
    fn test_background_upsampling_unavailable() {
        let frame = BgrFrame::from_rgb(&RgbImage::new(4, 4));
        let params = RestoreParams {
            background_upsampling: true,
            ..RestoreParams::default()
        };
        assert!(matches!(
            validate_params(&frame, &params),
            Err(ModelError::Unavailable(_))
        ));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = BgrFrame::from_rgb(&RgbImage::new(0, 0));
        assert!(validate_params(&frame, &RestoreParams::default()).is_err());
    }

    #[test]
    fn test_tile_windows_cover_non_square_image() {
        let windows = tile_windows(1200, 520, 512);
        assert_eq!(windows.len(), 6);
        assert_eq!(windows[0], Window { x: 0, y: 0, width: 512, height: 512 });
        assert_eq!(windows[2], Window { x: 1024, y: 0, width: 176, height: 512 });
        assert_eq!(windows[5], Window { x: 1024, y: 512, width: 176, height: 8 });

        let area: u32 = windows.iter().map(|w| w.width * w.height).sum();
        assert_eq!(area, 1200 * 520);
    }

    #[test]
    fn test_padded_tile_keeps_crop_unscaled() {
        let crop = RgbImage::from_fn(300, 120, |x, y| Rgb([(x % 256) as u8, y as u8, 9]));
        let padded = pad_to_square(&crop, MODEL_INPUT_SIZE);

        assert_eq!(padded.dimensions(), (512, 512));
        assert_eq!(padded.get_pixel(299, 119), crop.get_pixel(299, 119));
        assert_eq!(padded.get_pixel(17, 42), crop.get_pixel(17, 42));
        // Edges are repeated into the padding
        assert_eq!(padded.get_pixel(511, 511), crop.get_pixel(299, 119));
        assert_eq!(padded.get_pixel(100, 400), crop.get_pixel(100, 119));

        let input = tensor::rgb_to_nchw(&padded, Normalization::SYMMETRIC);
        assert_eq!(input.shape(), &[1, 3, 512, 512]);
    }

    #[test]
    fn test_restore_tiles_sees_square_tiles_and_keeps_size() {
        let image = RgbImage::from_fn(700, 300, |x, y| Rgb([(x % 200) as u8, (y % 200) as u8, 50]));
        let mut calls = 0;

        let output = restore_tiles(&image, MODEL_INPUT_SIZE, |tile| {
            calls += 1;
            assert_eq!(tile.dimensions(), (512, 512));
            // Round-trip through the network tensor layout
            let input = tensor::rgb_to_nchw(tile, Normalization::SYMMETRIC);
            let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
            let data: Vec<f32> = input.iter().map(|v| -v).collect();
            tensor::nchw_to_rgb(&shape, &data, Normalization::SYMMETRIC)
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(output.dimensions(), (700, 300));
        for (x, y) in [(0, 0), (511, 299), (512, 0), (699, 150)] {
            let src = image.get_pixel(x, y).0;
            let out = output.get_pixel(x, y).0;
            for c in 0..3 {
                assert_eq!(out[c], 255 - src[c], "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_restore_tiles_resizes_mismatched_output() {
        let image = RgbImage::new(600, 200);
        let output = restore_tiles(&image, MODEL_INPUT_SIZE, |_| {
            Ok(RgbImage::from_pixel(256, 256, Rgb([90, 80, 70])))
        })
        .unwrap();

        assert_eq!(output.dimensions(), (600, 200));
        assert!(output.pixels().all(|p| p.0 == [90, 80, 70]));
    }

    #[test]
    fn test_restore_tiles_propagates_errors() {
        let image = RgbImage::new(64, 64);
        let err = restore_tiles(&image, MODEL_INPUT_SIZE, |_| {
            Err(ModelError::Inference("boom".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, ModelError::Inference(_)));
    }

    #[test]
    fn test_scaled_size_overflow() {
        assert_eq!(scaled_size(300, 200, 2).unwrap(), (600, 400));
        assert!(scaled_size(u32::MAX, 2, 2).is_err());
    }
}
