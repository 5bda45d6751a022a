//! Conversions between RGB images and NCHW float tensors

use crate::error::{ModelError, Result};
use image::RgbImage;
use ndarray::Array4;

/// Per-channel affine normalization: `(value / 255 - mean) / std`
#[derive(Debug, Clone, Copy)]
pub(crate) struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// Maps 0..=255 onto -1..=1
    pub const SYMMETRIC: Self = Self {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    pub const IMAGENET: Self = Self {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
    };

    fn normalize(&self, channel: usize, value: u8) -> f32 {
        (f32::from(value) / 255.0 - self.mean[channel]) / self.std[channel]
    }

    fn denormalize(&self, channel: usize, value: f32) -> u8 {
        let v = (value * self.std[channel] + self.mean[channel]) * 255.0;
        v.clamp(0.0, 255.0).round() as u8
    }
}

/// Convert an RGB image to a (1, 3, H, W) tensor in RGB channel order
pub(crate) fn rgb_to_nchw(image: &RgbImage, norm: Normalization) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = norm.normalize(c, pixel.0[c]);
        }
    }

    tensor
}

/// Convert a flat NCHW output (RGB channel order) back to an image
pub(crate) fn nchw_to_rgb(shape: &[i64], data: &[f32], norm: Normalization) -> Result<RgbImage> {
    if shape.len() != 4 {
        return Err(ModelError::Postprocess(format!(
            "Expected 4D tensor, got {}D",
            shape.len()
        )));
    }
    if shape[1] != 3 {
        return Err(ModelError::Postprocess(format!(
            "Expected 3 channels, got {}",
            shape[1]
        )));
    }

    let height = usize::try_from(shape[2])
        .map_err(|_| ModelError::Postprocess("Invalid tensor height".to_string()))?;
    let width = usize::try_from(shape[3])
        .map_err(|_| ModelError::Postprocess("Invalid tensor width".to_string()))?;
    let plane = height * width;

    if data.len() < plane * 3 {
        return Err(ModelError::Postprocess(format!(
            "Tensor data too short: {} values for {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut pixels = Vec::with_capacity(plane * 3);
    for idx in 0..plane {
        for c in 0..3 {
            pixels.push(norm.denormalize(c, data[c * plane + idx]));
        }
    }

    let width = u32::try_from(width)
        .map_err(|_| ModelError::Postprocess("Image width too large".to_string()))?;
    let height = u32::try_from(height)
        .map_err(|_| ModelError::Postprocess("Image height too large".to_string()))?;

    RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| ModelError::Postprocess("Failed to create image".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_to_nchw_shape() {
        let img = RgbImage::new(100, 80);
        let tensor = rgb_to_nchw(&img, Normalization::SYMMETRIC);
        assert_eq!(tensor.shape(), &[1, 3, 80, 100]);
    }

    #[test]
    fn test_symmetric_normalization_range() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 128]));

        let tensor = rgb_to_nchw(&img, Normalization::SYMMETRIC);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
        assert!(tensor[[0, 2, 0, 0]].abs() < 0.01);
    }

    #[test]
    fn test_nchw_to_rgb_inverts_normalization() {
        let mut img = RgbImage::new(4, 3);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = Rgb([(i * 20) as u8, 128, 255 - (i * 10) as u8]);
        }

        for norm in [Normalization::SYMMETRIC, Normalization::IMAGENET] {
            let tensor = rgb_to_nchw(&img, norm);
            let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
            let data: Vec<f32> = tensor.iter().copied().collect();
            let back = nchw_to_rgb(&shape, &data, norm).unwrap();
            assert_eq!(back, img);
        }
    }

    #[test]
    fn test_nchw_to_rgb_rejects_bad_shape() {
        let err = nchw_to_rgb(&[1, 3, 2], &[0.0; 6], Normalization::SYMMETRIC).unwrap_err();
        assert!(err.to_string().contains("Expected 4D tensor"));

        let err = nchw_to_rgb(&[1, 1, 2, 2], &[0.0; 4], Normalization::SYMMETRIC).unwrap_err();
        assert!(err.to_string().contains("Expected 3 channels"));
    }

    #[test]
    fn test_nchw_to_rgb_rejects_short_data() {
        let err = nchw_to_rgb(&[1, 3, 2, 2], &[0.0; 5], Normalization::SYMMETRIC).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}
