//! Free-tier preview: downscale and watermark
//!
//! The preview is only cosmetically degraded. The unwatermarked artifact on
//! disk is what a paying customer downloads; nothing here checks payment.

use ab_glyph::{FontArc, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

pub const WATERMARK_TEXT: &str = "PREVIEW";

/// DejaVu Sans Bold, see `assets/DejaVuSans-LICENSE.txt`
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// Distance between the watermark and the image edges
const WATERMARK_MARGIN: u32 = 20;

/// Size of the fallback rectangle when no font could be parsed
const FALLBACK_WIDTH: u32 = 80;
const FALLBACK_HEIGHT: u32 = 30;

/// How the watermark is drawn
#[derive(Clone)]
pub struct WatermarkStyle {
    pub text: String,
    /// 0.0 (invisible) to 1.0 (opaque white)
    pub opacity: f32,
    /// Text font; `None` draws the rectangle marker instead
    pub font: Option<FontArc>,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        let font = match FontArc::try_from_slice(BUNDLED_FONT) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!(error = %e, "Bundled watermark font is invalid");
                None
            }
        };

        Self {
            text: WATERMARK_TEXT.to_string(),
            opacity: 0.3,
            font,
        }
    }
}

impl WatermarkStyle {
    /// Replace the watermark font with a TrueType/OpenType file
    ///
    /// On failure the current font is kept.
    pub fn with_font_file(mut self, path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => self.font = Some(font),
                Err(e) => warn!(path = %path.display(), error = %e, "Invalid watermark font"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read watermark font"),
        }
        self
    }
}

/// Preview settings
#[derive(Clone)]
pub struct PreviewConfig {
    pub max_size: u32,
    pub watermark: WatermarkStyle,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_size: 600,
            watermark: WatermarkStyle::default(),
        }
    }
}

/// Downscale and watermark a processed image
pub fn preview(image: &DynamicImage, config: &PreviewConfig) -> RgbImage {
    let resized = resize_for_preview(image, config.max_size);
    apply_watermark(&resized, &config.watermark)
}

/// Shrink so the longer edge is at most `max_size`, keeping aspect ratio
///
/// Images already within bounds are returned unchanged.
pub fn resize_for_preview(image: &DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width.max(height) <= max_size {
        return image.clone();
    }

    let (new_width, new_height) = if width > height {
        (max_size, scale_edge(height, max_size, width))
    } else {
        (scale_edge(width, max_size, height), max_size)
    };

    debug!(width, height, new_width, new_height, "Resizing for preview");
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// `edge * numerator / denominator`, truncated, never zero
fn scale_edge(edge: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = u64::from(edge) * u64::from(numerator) / u64::from(denominator);
    u32::try_from(scaled).unwrap_or(numerator).max(1)
}

/// Composite the watermark near the bottom-right corner
pub fn apply_watermark(image: &DynamicImage, style: &WatermarkStyle) -> RgbImage {
    let mut base = image.to_rgba8();
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return DynamicImage::ImageRgba8(base).to_rgb8();
    }

    let alpha = (255.0 * style.opacity.clamp(0.0, 1.0)).round() as u8;
    let color = Rgba([255, 255, 255, alpha]);
    let mut overlay = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));

    match &style.font {
        Some(font) => draw_text_marker(&mut overlay, color, font, &style.text),
        None => draw_fallback_marker(&mut overlay, color),
    }

    imageops::overlay(&mut base, &overlay, 0, 0);
    DynamicImage::ImageRgba8(base).to_rgb8()
}

fn draw_text_marker(overlay: &mut RgbaImage, color: Rgba<u8>, font: &FontArc, text: &str) {
    let (width, height) = overlay.dimensions();
    let font_size = (width.min(height) / 15).max(20);
    let scale = PxScale::from(font_size as f32);

    let (text_w, text_h) = text_size(scale, font, text);
    let x = i64::from(width) - i64::from(text_w) - i64::from(WATERMARK_MARGIN);
    let y = i64::from(height) - i64::from(text_h) - i64::from(WATERMARK_MARGIN);

    draw_text_mut(overlay, color, x as i32, y as i32, scale, font, text);
}

fn draw_fallback_marker(overlay: &mut RgbaImage, color: Rgba<u8>) {
    let (width, height) = overlay.dimensions();
    let rect_w = FALLBACK_WIDTH.min(width);
    let rect_h = FALLBACK_HEIGHT.min(height);
    let x = width - rect_w;
    let y = height - rect_h;

    draw_filled_rect_mut(
        overlay,
        Rect::at(x as i32, y as i32).of_size(rect_w, rect_h),
        color,
    );
}
