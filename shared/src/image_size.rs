//! Image dimensions and the aspect-preserving fit used to pick a working resolution

use ndarray::Array2;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel dimensions of an image.
///
/// Used both for the original photograph and for the downscaled working image
/// that detection runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Dimensions of an `image` crate buffer, which reports `u32` sizes.
    pub fn from_u32(width: u32, height: u32) -> Self {
        Self::from_width_height(width as usize, height as usize)
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// True when both sides are non-zero.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Fit these dimensions into the `max` bounding box, preserving aspect ratio.
    ///
    /// When the source is relatively wider than the box, the width is clamped to
    /// `max.width` and the height is derived from it; otherwise the height is
    /// clamped to `max.height` and the width is derived. Derived sides are rounded
    /// to the nearest integer and never drop below one pixel.
    ///
    /// Note that a source smaller than the box is scaled *up* to touch it. The
    /// detection parameters are tuned for a fixed working size, so every image is
    /// normalized regardless of its original resolution.
    ///
    /// # Examples
    /// ```rust
    /// use shared::ImageSize;
    ///
    /// let photo = ImageSize::from_width_height(6000, 4000);
    /// let working = photo.fit_within(ImageSize::from_width_height(1920, 1080));
    /// assert_eq!(working, ImageSize::from_width_height(1620, 1080));
    /// ```
    pub fn fit_within(&self, max: ImageSize) -> ImageSize {
        let target_ratio = max.aspect_ratio();
        let source_ratio = self.aspect_ratio();

        if source_ratio > target_ratio {
            let height = (max.width as f64 / source_ratio).round().max(1.0) as usize;
            Self::from_width_height(max.width, height)
        } else {
            let width = (source_ratio * max.height as f64).round().max(1.0) as usize;
            Self::from_width_height(width, max.height)
        }
    }

    /// Create a zeroed array with this size.
    ///
    /// Shape is (height, width): rows come first.
    pub fn zeros<T>(&self) -> Array2<T>
    where
        T: Clone + Zero,
    {
        Array2::zeros((self.height, self.width))
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
