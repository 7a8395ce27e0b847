//! Mean pixel intensity sampling over grayscale images.

use crate::image_proc::geometry::Circle;
use image::GrayImage;

/// Capability to measure average brightness, used by the view classifier.
pub trait IntensitySampler {
    /// Mean intensity over the whole image.
    fn mean_intensity(&self) -> f64;

    /// Mean intensity over the pixels inside `circle`.
    ///
    /// Returns `None` when no pixel of the circle lies inside the image.
    fn mean_intensity_in_circle(&self, circle: &Circle) -> Option<f64>;
}

impl IntensitySampler for GrayImage {
    fn mean_intensity(&self) -> f64 {
        let count = self.as_raw().len();
        if count == 0 {
            return 0.0;
        }
        let sum: u64 = self.as_raw().iter().map(|&v| v as u64).sum();
        sum as f64 / count as f64
    }

    /// Center and radius are truncated to whole pixels. A pixel belongs to the
    /// disk when its squared offset from the center is at most `r²`; the scan is
    /// clipped to the image so disks overlapping the frame edge are sampled
    /// partially.
    fn mean_intensity_in_circle(&self, circle: &Circle) -> Option<f64> {
        let (width, height) = self.dimensions();
        let cx = circle.center_x as i64;
        let cy = circle.center_y as i64;
        let r = circle.radius as i64;
        if r < 0 {
            return None;
        }
        let r2 = r * r;

        let x_lo = (cx - r).max(0);
        let x_hi = (cx + r).min(width as i64 - 1);
        let y_lo = (cy - r).max(0);
        let y_hi = (cy + r).min(height as i64 - 1);

        let mut sum = 0u64;
        let mut count = 0u64;
        for y in y_lo..=y_hi {
            let dy = y - cy;
            for x in x_lo..=x_hi {
                let dx = x - cx;
                if dx * dx + dy * dy <= r2 {
                    sum += self.get_pixel(x as u32, y as u32)[0] as u64;
                    count += 1;
                }
            }
        }

        (count > 0).then(|| sum as f64 / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    #[test]
    fn test_mean_of_uniform_image() {
        let img = GrayImage::from_pixel(40, 30, Luma([17]));
        assert_relative_eq!(img.mean_intensity(), 17.0);
    }

    #[test]
    fn test_disk_region_mean() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([10]));
        draw_filled_circle_mut(&mut img, (50, 50), 20, Luma([200]));

        let inside = img
            .mean_intensity_in_circle(&Circle::original(50.0, 50.0, 15.0))
            .unwrap();
        assert_relative_eq!(inside, 200.0);

        let whole = img.mean_intensity();
        assert!(whole > 10.0 && whole < 200.0);
    }

    #[test]
    fn test_circle_clipped_at_frame_edge() {
        let mut img = GrayImage::from_pixel(50, 50, Luma([0]));
        for x in 0..5 {
            for y in 0..5 {
                img.put_pixel(x, y, Luma([100]));
            }
        }
        // Only the in-frame quarter of the disk is sampled
        let mean = img
            .mean_intensity_in_circle(&Circle::original(0.0, 0.0, 4.0))
            .unwrap();
        assert_relative_eq!(mean, 100.0);
    }

    #[test]
    fn test_circle_outside_frame_has_no_mean() {
        let img = GrayImage::from_pixel(20, 20, Luma([5]));
        let far = Circle::original(500.0, 500.0, 10.0);
        assert_eq!(img.mean_intensity_in_circle(&far), None);
    }
}
