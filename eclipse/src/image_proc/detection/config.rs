//! Tuning parameters for the circle-detection primitive.
//!
//! The four knobs exposed on the command line follow the usual gradient Hough
//! conventions:
//!
//! - **dp**: inverse accumulator resolution. `dp = 2` votes into a grid half the
//!   size of the image.
//! - **param1**: upper edge threshold handed to Canny; the lower threshold is half of it.
//! - **param2**: accumulator votes a center must exceed to become a candidate.
//! - **min_dist**: minimum distance between two candidate centers. Unset means
//!   one eighth of the working image height.
//!
//! # Usage
//!
//! ```rust
//! use eclipse::image_proc::detection::config::DetectionParams;
//! use shared::ImageSize;
//!
//! let params = DetectionParams::default();
//! assert_eq!(params.min_dist_for(1080), 135.0);
//!
//! // A zero upper radius bound means half the shorter image side
//! let (lo, hi) = params.radius_bounds(ImageSize::from_width_height(1920, 1080));
//! assert_eq!((lo, hi), (1, 540));
//! ```

use super::DetectionError;
use serde::{Deserialize, Serialize};
use shared::ImageSize;

pub const DEFAULT_DP: f64 = 2.0;
pub const DEFAULT_PARAM1: f64 = 30.0;
pub const DEFAULT_PARAM2: f64 = 15.0;

/// Detection parameters in working-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionParams {
    /// Inverse ratio of accumulator resolution to image resolution
    pub dp: f64,
    /// Upper Canny threshold
    pub param1: f64,
    /// Accumulator threshold for center candidates
    pub param2: f64,
    /// Minimum center separation, `None` for `height / 8`
    pub min_dist: Option<f64>,
    /// Smallest radius searched (0 for no lower bound)
    pub min_radius: u32,
    /// Largest radius searched (0 for half the shorter image side)
    pub max_radius: u32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            dp: DEFAULT_DP,
            param1: DEFAULT_PARAM1,
            param2: DEFAULT_PARAM2,
            min_dist: None,
            min_radius: 0,
            max_radius: 0,
        }
    }
}

impl DetectionParams {
    /// Effective minimum center distance for a working image of the given height.
    pub fn min_dist_for(&self, working_height: usize) -> f64 {
        self.min_dist.unwrap_or(working_height as f64 / 8.0)
    }

    /// Inclusive radius search range for an image of the given size.
    pub fn radius_bounds(&self, size: ImageSize) -> (u32, u32) {
        let half_side = (size.width.min(size.height) / 2) as u32;
        let hi = if self.max_radius == 0 {
            half_side
        } else {
            self.max_radius
        };
        (self.min_radius.max(1), hi.max(1))
    }

    /// Reject parameter combinations the detector cannot work with.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let invalid = |msg: String| Err(DetectionError::InvalidParams(msg));

        if !self.dp.is_finite() || self.dp < 1.0 {
            return invalid(format!("dp must be at least 1, got {}", self.dp));
        }
        if !self.param1.is_finite() || self.param1 <= 0.0 {
            return invalid(format!("param1 must be positive, got {}", self.param1));
        }
        if !self.param2.is_finite() || self.param2 <= 0.0 {
            return invalid(format!("param2 must be positive, got {}", self.param2));
        }
        if let Some(min_dist) = self.min_dist {
            if !min_dist.is_finite() || min_dist <= 0.0 {
                return invalid(format!("min_dist must be positive, got {min_dist}"));
            }
        }
        if self.max_radius != 0 && self.max_radius < self.min_radius {
            return invalid(format!(
                "max_radius {} is below min_radius {}",
                self.max_radius, self.min_radius
            ));
        }
        Ok(())
    }
}
