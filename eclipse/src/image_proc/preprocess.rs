//! Preprocessing strategies that turn a decoded photograph into the working image.
//!
//! Every strategy starts the same way (grayscale, then resize to the working
//! size) and differs only in the contrast and denoising steps that follow:
//!
//! | Strategy           | Steps after resize                                         |
//! |--------------------|------------------------------------------------------------|
//! | `unsharp-gaussian` | unsharp mask (gaussian 15 taps, σ 20), gaussian 9 taps σ 30 |
//! | `unsharp-median`   | unsharp mask (gaussian 15 taps, σ 20), median 11×11        |
//! | `bilateral`        | unsharp mask (bilateral 9, σ 75/75), bilateral 9 σ 75/75   |
//! | `opening`          | erode 5×1, dilate 5×1, gaussian 9 taps σ 30                |
//! | `blur-only`        | gaussian 91 taps σ 30                                      |
//!
//! The unsharp mask is `1.5·img − 0.5·blurred(img)`, clamped to `0..=255`.
//! Gaussian kernels are truncated to the given tap count, so a large σ on a short
//! kernel behaves close to a box filter.

use clap::ValueEnum;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::{bilateral_filter, median_filter, separable_filter_equal};
use serde::{Deserialize, Serialize};
use shared::ImageSize;
use std::fmt;

/// Working image plus any intermediate steps kept for display.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub working: GrayImage,
    /// Named intermediate images in the order they were produced
    pub intermediates: Vec<(String, GrayImage)>,
}

/// How a photograph is prepared for circle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum PreprocessStrategy {
    /// Gaussian unsharp mask followed by a gaussian blur
    #[default]
    UnsharpGaussian,
    /// Gaussian unsharp mask followed by a median filter
    UnsharpMedian,
    /// Edge-preserving bilateral unsharp mask and denoise
    Bilateral,
    /// Horizontal morphological opening followed by a gaussian blur
    Opening,
    /// A single heavy gaussian blur
    BlurOnly,
}

impl fmt::Display for PreprocessStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PreprocessStrategy::UnsharpGaussian => "unsharp-gaussian",
            PreprocessStrategy::UnsharpMedian => "unsharp-median",
            PreprocessStrategy::Bilateral => "bilateral",
            PreprocessStrategy::Opening => "opening",
            PreprocessStrategy::BlurOnly => "blur-only",
        };
        f.write_str(name)
    }
}

/// Records intermediates only when asked to.
struct Steps {
    keep: bool,
    images: Vec<(String, GrayImage)>,
}

impl Steps {
    fn record(&mut self, name: &str, image: &GrayImage) {
        if self.keep {
            self.images.push((name.to_string(), image.clone()));
        }
    }
}

impl PreprocessStrategy {
    /// Produce the working image of size `working` from `image`.
    ///
    /// # Arguments
    /// * `image` - Decoded photograph, any color type
    /// * `working` - Target size, normally from [`ImageSize::fit_within`]
    /// * `keep_intermediates` - Retain copies of each step (interactive mode)
    pub fn apply(
        &self,
        image: &DynamicImage,
        working: ImageSize,
        keep_intermediates: bool,
    ) -> Preprocessed {
        let mut steps = Steps {
            keep: keep_intermediates,
            images: Vec::new(),
        };

        let gray = image.to_luma8();
        let resized = if gray.dimensions() == (working.width as u32, working.height as u32) {
            gray
        } else {
            imageops::resize(
                &gray,
                working.width as u32,
                working.height as u32,
                FilterType::Triangle,
            )
        };
        steps.record("gray", &resized);

        let working = match self {
            PreprocessStrategy::UnsharpGaussian => {
                let sharp = unsharp(&resized, &gaussian_blur(&resized, 15, 20.0));
                steps.record("unsharp", &sharp);
                let blurred = gaussian_blur(&sharp, 9, 30.0);
                steps.record("blur", &blurred);
                blurred
            }
            PreprocessStrategy::UnsharpMedian => {
                let sharp = unsharp(&resized, &gaussian_blur(&resized, 15, 20.0));
                steps.record("unsharp", &sharp);
                let blurred = median_filter(&sharp, 5, 5);
                steps.record("blur", &blurred);
                blurred
            }
            PreprocessStrategy::Bilateral => {
                let sharp = unsharp(&resized, &bilateral_filter(&resized, 9, 75.0, 75.0));
                steps.record("unsharp", &sharp);
                let blurred = bilateral_filter(&sharp, 9, 75.0, 75.0);
                steps.record("blur", &blurred);
                blurred
            }
            PreprocessStrategy::Opening => {
                let eroded = horizontal_extremum(&resized, 2, u8::min);
                steps.record("erode", &eroded);
                let dilated = horizontal_extremum(&eroded, 2, u8::max);
                steps.record("dilate", &dilated);
                let blurred = gaussian_blur(&dilated, 9, 30.0);
                steps.record("blur", &blurred);
                blurred
            }
            PreprocessStrategy::BlurOnly => {
                let blurred = gaussian_blur(&resized, 91, 30.0);
                steps.record("blur", &blurred);
                blurred
            }
        };

        Preprocessed {
            working,
            intermediates: steps.images,
        }
    }
}

/// Normalized gaussian weights over `taps` samples centered on the middle one.
pub fn gaussian_kernel(taps: usize, sigma: f32) -> Vec<f32> {
    let center = (taps as f32 - 1.0) / 2.0;
    let weights: Vec<f32> = (0..taps)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

fn gaussian_blur(image: &GrayImage, taps: usize, sigma: f32) -> GrayImage {
    separable_filter_equal(image, &gaussian_kernel(taps, sigma))
}

/// `1.5·image − 0.5·blurred`, rounded and clamped.
fn unsharp(image: &GrayImage, blurred: &GrayImage) -> GrayImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let a = image.get_pixel(x, y)[0] as f32;
        let b = blurred.get_pixel(x, y)[0] as f32;
        Luma([(1.5 * a - 0.5 * b).round().clamp(0.0, 255.0) as u8])
    })
}

/// Min or max over a `2·half_width + 1` wide horizontal window, clipped at the edges.
fn horizontal_extremum(image: &GrayImage, half_width: u32, pick: fn(u8, u8) -> u8) -> GrayImage {
    let width = image.width();
    ImageBuffer::from_fn(width, image.height(), |x, y| {
        let lo = x.saturating_sub(half_width);
        let hi = (x + half_width).min(width - 1);
        let value = (lo..=hi)
            .map(|xx| image.get_pixel(xx, y)[0])
            .reduce(pick)
            .unwrap_or(0);
        Luma([value])
    })
}
