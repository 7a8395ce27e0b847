//! Gradient Hough transform for bright or dark disks.
//!
//! Every Canny edge pixel casts votes along its Sobel gradient line, in both
//! directions, into an accumulator `dp` times coarser than the image. Disk
//! boundaries have radial gradients, so their lines meet at the disk center.
//!
//! Center candidates are accumulator local maxima with more than `param2`
//! votes, taken strongest first and skipped when closer than `min_dist` to an
//! accepted center. Each surviving center gets the radius with the best edge
//! support, where support at radius `r` is the number of edge pixels at distance
//! `r ± 1` divided by `r`.

use super::{CircleDetector, DetectionError, DetectionParams};
use crate::image_proc::geometry::Circle;
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use ndarray::Array2;
use shared::ImageSize;

/// Default [`CircleDetector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughCircleDetector {
    /// Edge pixels with a Sobel magnitude below this do not vote
    pub min_gradient: f32,
}

impl Default for HoughCircleDetector {
    fn default() -> Self {
        Self { min_gradient: 1.0 }
    }
}

impl HoughCircleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn edges(&self, image: &GrayImage, params: &DetectionParams) -> GrayImage {
        let high = params.param1 as f32;
        let low = (high / 2.0).max(1.0);
        canny(image, low, high)
    }

    /// Cast gradient-line votes, returning the accumulator and the edge pixel list.
    fn vote(
        &self,
        image: &GrayImage,
        edges: &GrayImage,
        dp: f64,
        (min_r, max_r): (u32, u32),
    ) -> (Array2<u32>, Vec<(f64, f64)>) {
        let (w, h) = (image.width() as f64, image.height() as f64);
        let acc_size =
            ImageSize::from_width_height((w / dp).ceil() as usize, (h / dp).ceil() as usize);
        let mut acc: Array2<u32> = acc_size.zeros();

        let gx = horizontal_sobel(image);
        let gy = vertical_sobel(image);
        let mut edge_points = Vec::new();

        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel[0] == 0 {
                continue;
            }
            edge_points.push((x as f64, y as f64));

            let gxv = gx.get_pixel(x, y)[0] as f32;
            let gyv = gy.get_pixel(x, y)[0] as f32;
            let mag = gxv.hypot(gyv);
            if mag < self.min_gradient {
                continue;
            }
            let dx = (gxv / mag) as f64;
            let dy = (gyv / mag) as f64;

            for sign in [-1.0, 1.0] {
                // Each line votes once per accumulator cell it crosses
                let mut last_cell = None;
                for r in min_r..=max_r {
                    let vx = x as f64 + sign * dx * r as f64;
                    let vy = y as f64 + sign * dy * r as f64;
                    if vx < 0.0 || vy < 0.0 || vx >= w || vy >= h {
                        break;
                    }
                    let cell = ((vy / dp) as usize, (vx / dp) as usize);
                    if last_cell == Some(cell) {
                        continue;
                    }
                    last_cell = Some(cell);
                    acc[cell] += 1;
                }
            }
        }

        (acc, edge_points)
    }
}

/// Accumulator local maxima above `threshold`, strongest first.
///
/// A cell must beat its left and upper neighbors and at least tie its right and
/// lower ones, so a horizontal plateau of two yields its left cell.
fn accumulator_peaks(acc: &Array2<u32>, threshold: f64) -> Vec<(usize, usize, u32)> {
    let (rows, cols) = acc.dim();
    let at = |row: usize, col: usize| acc[[row, col]];

    let mut peaks: Vec<(usize, usize, u32)> = acc
        .indexed_iter()
        .filter(|&(_, &votes)| votes as f64 > threshold)
        .filter(|&((row, col), &votes)| {
            let left = if col > 0 { at(row, col - 1) } else { 0 };
            let right = if col + 1 < cols { at(row, col + 1) } else { 0 };
            let up = if row > 0 { at(row - 1, col) } else { 0 };
            let down = if row + 1 < rows { at(row + 1, col) } else { 0 };
            votes > left && votes >= right && votes > up && votes >= down
        })
        .map(|((row, col), &votes)| (row, col, votes))
        .collect();

    // Stable sort keeps raster order among equal vote counts
    peaks.sort_by(|a, b| b.2.cmp(&a.2));
    peaks
}

/// Radius around `(cx, cy)` best supported by the edge pixels.
///
/// Returns `None` when no radius window collects at least `min_support` edges.
fn estimate_radius(
    edge_points: &[(f64, f64)],
    (cx, cy): (f64, f64),
    (min_r, max_r): (u32, u32),
    min_support: f64,
) -> Option<f64> {
    let (min_r, max_r) = (min_r as usize, max_r as usize);
    let mut counts = vec![0u32; max_r + 1];
    let mut sums = vec![0.0f64; max_r + 1];

    for &(x, y) in edge_points {
        let d = (x - cx).hypot(y - cy);
        let bin = d.round() as usize;
        if (min_r..=max_r).contains(&bin) {
            counts[bin] += 1;
            sums[bin] += d;
        }
    }

    let mut best: Option<(f64, f64)> = None;
    for r in min_r..=max_r {
        let window = r.saturating_sub(1).max(min_r)..=(r + 1).min(max_r);
        let count: u32 = counts[window.clone()].iter().sum();
        if count == 0 || (count as f64) < min_support {
            continue;
        }
        let score = count as f64 / r as f64;
        if best.map_or(true, |(best_score, _)| score > best_score) {
            let mean = sums[window].iter().sum::<f64>() / count as f64;
            best = Some((score, mean));
        }
    }

    best.map(|(_, radius)| radius)
}

impl CircleDetector for HoughCircleDetector {
    fn find_circles(
        &self,
        image: &GrayImage,
        params: &DetectionParams,
        limit: usize,
    ) -> Result<Vec<Circle>, DetectionError> {
        let size = ImageSize::from_u32(image.width(), image.height());
        if !size.is_valid() {
            return Err(DetectionError::EmptyImage(size));
        }
        params.validate()?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let bounds = params.radius_bounds(size);
        let edges = self.edges(image, params);
        let (acc, edge_points) = self.vote(image, &edges, params.dp, bounds);
        if edge_points.is_empty() {
            return Ok(Vec::new());
        }

        let min_dist = params.min_dist_for(size.height);
        let mut circles: Vec<Circle> = Vec::new();

        for (row, col, _votes) in accumulator_peaks(&acc, params.param2) {
            let center = ((col as f64 + 0.5) * params.dp, (row as f64 + 0.5) * params.dp);
            let candidate = Circle::working(center.0, center.1, 0.0);
            if circles
                .iter()
                .any(|c| c.center_distance(&candidate) < min_dist)
            {
                continue;
            }

            let Some(radius) = estimate_radius(&edge_points, center, bounds, params.param2)
            else {
                continue;
            };
            circles.push(Circle::working(center.0, center.1, radius));
            if circles.len() >= limit {
                break;
            }
        }

        Ok(circles)
    }

    fn edge_map(&self, image: &GrayImage, params: &DetectionParams) -> Option<GrayImage> {
        Some(self.edges(image, params))
    }
}
