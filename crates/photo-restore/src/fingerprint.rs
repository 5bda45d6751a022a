//! Content fingerprints used as cache identity

use crate::error::Result;
use image::{DynamicImage, ImageFormat};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Cursor;

/// Hex-encoded SHA-256 of an image's PNG encoding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which processing steps to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOptions {
    pub restore_face: bool,
    pub colorize: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            restore_face: true,
            colorize: true,
        }
    }
}

/// Encode an image losslessly as PNG
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Fingerprint an in-memory image
///
/// Identical pixel content and layout always produce the same fingerprint.
pub fn fingerprint(image: &DynamicImage) -> Result<Fingerprint> {
    let png = encode_png(image)?;
    let mut hasher = Sha256::new();
    hasher.update(&png);
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Cache key for a fingerprint processed with the given options
pub fn cache_key(fingerprint: &Fingerprint, options: ProcessOptions) -> String {
    format!(
        "{}_{}_{}",
        fingerprint, options.restore_face, options.colorize
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&gradient(32, 16)).unwrap();
        let b = fingerprint(&gradient(32, 16)).unwrap();
        assert_eq!(a, b);

        // SHA-256 hex
        assert_eq!(a.0.len(), 64);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let mut other = gradient(32, 16).to_rgb8();
        other.put_pixel(0, 0, Rgb([255, 255, 255]));

        let a = fingerprint(&gradient(32, 16)).unwrap();
        let b = fingerprint(&DynamicImage::ImageRgb8(other)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_survives_png_roundtrip() {
        let original = gradient(20, 10);
        let png = encode_png(&original).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();

        assert_eq!(
            fingerprint(&original).unwrap(),
            fingerprint(&decoded).unwrap()
        );
    }

    #[test]
    fn test_cache_key_includes_flags() {
        let fp = fingerprint(&gradient(4, 4)).unwrap();

        let key = cache_key(
            &fp,
            ProcessOptions {
                restore_face: true,
                colorize: false,
            },
        );
        assert_eq!(key, format!("{}_true_false", fp));
        assert_ne!(key, cache_key(&fp, ProcessOptions::default()));
    }
}
