//! Frame data structures for captured camera content

use image::RgbImage;
use std::time::Instant;

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Position of the frame in the session
    pub index: u64,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(image: RgbImage, index: u64) -> Self {
        Self {
            image,
            index,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Mirror the frame horizontally, as a selfie camera view would
    pub fn mirrored(mut self) -> Self {
        image::imageops::flip_horizontal_in_place(&mut self.image);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mirrored_swaps_columns() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(2, 0, Rgb([0, 0, 255]));

        let frame = CapturedFrame::new(img, 7).mirrored();

        assert_eq!(frame.index, 7);
        assert_eq!(frame.dimensions(), (3, 1));
        assert_eq!(frame.image.get_pixel(0, 0), &Rgb([0, 0, 255]));
        assert_eq!(frame.image.get_pixel(2, 0), &Rgb([255, 0, 0]));
    }
}
