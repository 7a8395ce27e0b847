//! Circle geometry and coordinate-space bookkeeping.
//!
//! Detection runs on a downscaled *working* image while everything reported to the
//! outside world is expressed in *original* image pixels. Every [`Circle`] carries
//! the space it lives in so the two can never be mixed silently.
//!
//! # Examples
//!
//! ```rust
//! use eclipse::image_proc::geometry::{crop_box, rescale_circle, Circle, CoordSpace};
//! use shared::ImageSize;
//!
//! // A disk found at working resolution (1920 wide) in a 3840-wide photograph
//! let found = Circle::working(480.0, 270.0, 100.0);
//! let disk = rescale_circle(&found, 1920, 3840);
//! assert_eq!(disk.space, CoordSpace::Original);
//! assert_eq!((disk.center_x, disk.center_y, disk.radius), (960.0, 540.0, 200.0));
//!
//! // Square crop of side 4r around it, which fits inside the photograph
//! let bbox = crop_box(&disk, 4.0, ImageSize::from_width_height(3840, 2160)).unwrap();
//! assert_eq!((bbox.x_min, bbox.y_min, bbox.width, bbox.height), (560, 140, 800, 800));
//! ```

use serde::{Deserialize, Serialize};
use shared::ImageSize;
use std::fmt;

/// Default crop side length as a multiple of the disk radius.
pub const DEFAULT_CROP_FACTOR: f64 = 4.0;

/// Pixel grid a circle is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordSpace {
    /// Downscaled image that detection operates on
    Working,
    /// Unmodified source photograph
    Original,
}

/// A detected disk.
///
/// Circles are plain values: rescaling produces a new circle and never touches
/// the one it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center column in pixels
    pub center_x: f64,
    /// Center row in pixels
    pub center_y: f64,
    /// Radius in pixels
    pub radius: f64,
    /// Coordinate space of the three fields above
    pub space: CoordSpace,
}

impl Circle {
    pub fn new(center_x: f64, center_y: f64, radius: f64, space: CoordSpace) -> Self {
        Self {
            center_x,
            center_y,
            radius,
            space,
        }
    }

    /// Circle in working-resolution coordinates.
    pub fn working(center_x: f64, center_y: f64, radius: f64) -> Self {
        Self::new(center_x, center_y, radius, CoordSpace::Working)
    }

    /// Circle in original-resolution coordinates.
    pub fn original(center_x: f64, center_y: f64, radius: f64) -> Self {
        Self::new(center_x, center_y, radius, CoordSpace::Original)
    }

    /// Euclidean distance between the two centers.
    pub fn center_distance(&self, other: &Circle) -> f64 {
        let dx = self.center_x - other.center_x;
        let dy = self.center_y - other.center_y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Exact center equality, no tolerance.
    pub fn same_center(&self, other: &Circle) -> bool {
        self.center_x == other.center_x && self.center_y == other.center_y
    }

    /// Multiply every field by `factor`, round to whole pixels and retag.
    fn scaled(&self, factor: f64, space: CoordSpace) -> Circle {
        Circle::new(
            (self.center_x * factor).round(),
            (self.center_y * factor).round(),
            (self.radius * factor).round(),
            space,
        )
    }
}

impl fmt::Display for Circle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, r={})",
            self.center_x, self.center_y, self.radius
        )
    }
}

/// Map a working-resolution circle into original-resolution coordinates.
///
/// A single uniform factor `original_width / working_width` is applied to the
/// center and the radius; the working image preserves the aspect ratio so the
/// vertical factor is the same up to rounding. Results are rounded to whole pixels.
pub fn rescale_circle(circle: &Circle, working_width: usize, original_width: usize) -> Circle {
    debug_assert_eq!(circle.space, CoordSpace::Working);
    let factor = original_width as f64 / working_width as f64;
    circle.scaled(factor, CoordSpace::Original)
}

/// Inverse of [`rescale_circle`]: map an original-resolution circle back onto the
/// working image.
pub fn unscale_circle(circle: &Circle, working_width: usize, original_width: usize) -> Circle {
    debug_assert_eq!(circle.space, CoordSpace::Original);
    let factor = working_width as f64 / original_width as f64;
    circle.scaled(factor, CoordSpace::Working)
}

/// Axis-aligned pixel rectangle, top-left origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropBox {
    /// Left column
    pub x_min: usize,
    /// Top row
    pub y_min: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl CropBox {
    pub fn new(x_min: usize, y_min: usize, width: usize, height: usize) -> Self {
        Self {
            x_min,
            y_min,
            width,
            height,
        }
    }

    /// One past the rightmost column
    pub fn x_max(&self) -> usize {
        self.x_min + self.width
    }

    /// One past the bottom row
    pub fn y_max(&self) -> usize {
        self.y_min + self.height
    }

    /// True when the box lies entirely inside an image of the given size.
    pub fn fits_in(&self, size: ImageSize) -> bool {
        self.x_max() <= size.width && self.y_max() <= size.height
    }
}

/// Square box of side `factor * radius` centered on the disk.
///
/// Returns `None` when the box would reach outside `image` on any side; the
/// disk is then too close to the frame edge to crop around.
///
/// Origin and side are truncated to whole pixels, so a box that fits in real
/// coordinates also fits after conversion.
pub fn crop_box(disk: &Circle, factor: f64, image: ImageSize) -> Option<CropBox> {
    let side = factor * disk.radius;
    let x0 = disk.center_x - side / 2.0;
    let y0 = disk.center_y - side / 2.0;

    if side <= 0.0
        || x0 < 0.0
        || y0 < 0.0
        || x0 + side > image.width as f64
        || y0 + side > image.height as f64
    {
        return None;
    }

    let side = side.floor() as usize;
    let bbox = CropBox::new(x0.floor() as usize, y0.floor() as usize, side, side);
    bbox.fits_in(image).then_some(bbox)
}
