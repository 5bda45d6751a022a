//! Interleaved BGR pixel buffer used at the face-restoration boundary

use image::RgbImage;

/// An 8-bit, 3-channel image stored in BGR channel order
///
/// The face restorer consumes and produces frames in this layout, while the
/// rest of the pipeline works with RGB [`RgbImage`] buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgrFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BgrFrame {
    /// Convert an RGB image into BGR order
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.as_raw().clone();
        swap_red_blue(&mut data);
        Self {
            width,
            height,
            data,
        }
    }

    /// Convert back into an RGB image
    pub fn to_rgb(&self) -> RgbImage {
        let mut data = self.data.clone();
        swap_red_blue(&mut data);
        // Only built from whole RGB images, so the length always matches
        RgbImage::from_raw(self.width, self.height, data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_rgb_swaps_channels() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([10, 20, 30]));
        img.put_pixel(1, 0, Rgb([200, 100, 0]));

        let frame = BgrFrame::from_rgb(&img);
        assert_eq!(frame.data, vec![30, 20, 10, 0, 100, 200]);
    }

    #[test]
    fn test_to_rgb_restores_original_pixels() {
        let mut img = RgbImage::new(3, 2);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = Rgb([i as u8 * 40, 255 - i as u8, 7]);
        }

        let back = BgrFrame::from_rgb(&img).to_rgb();
        assert_eq!(back, img);
    }

    #[test]
    fn test_dimensions() {
        let frame = BgrFrame::from_rgb(&RgbImage::new(7, 5));
        assert_eq!((frame.width(), frame.height()), (7, 5));
        assert_eq!(frame.data.len(), 7 * 5 * 3);
    }
}
