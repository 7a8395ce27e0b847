//! Final output image: detected disks drawn over a copy of the photograph.

use crate::image_proc::detection::DiskPair;
use crate::image_proc::geometry::{Circle, CropBox};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

/// Outline color of the primary disk.
pub const PRIMARY_COLOR: Rgb<u8> = Rgb([0, 0, 255]);

/// Outline color of the secondary disk.
pub const SECONDARY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Radius of the center marker.
pub const CENTER_DOT_RADIUS: i32 = 3;

/// Outline thickness in pixels.
pub const OUTLINE_THICKNESS: i32 = 4;

fn draw_disk(canvas: &mut RgbImage, circle: &Circle, color: Rgb<u8>) {
    let center = (circle.center_x.round() as i32, circle.center_y.round() as i32);
    let radius = circle.radius.round() as i32;

    draw_filled_circle_mut(canvas, center, CENTER_DOT_RADIUS, color);
    // Outline band straddles the circle edge
    for offset in -(OUTLINE_THICKNESS / 2 - 1)..=OUTLINE_THICKNESS / 2 {
        let r = radius + offset;
        if r > 0 {
            draw_hollow_circle_mut(canvas, center, r, color);
        }
    }
}

/// Draw the disks on an RGB copy of `image`.
///
/// Grayscale sources are expanded to three channels. Circles must be in the
/// image's own (original) coordinates. The input is left untouched.
pub fn annotate(image: &DynamicImage, disks: Option<&DiskPair>) -> RgbImage {
    let mut canvas = image.to_rgb8();
    if let Some(disks) = disks {
        draw_disk(&mut canvas, &disks.primary, PRIMARY_COLOR);
        if let Some(secondary) = &disks.secondary {
            draw_disk(&mut canvas, secondary, SECONDARY_COLOR);
        }
    }
    canvas
}

/// Copy of the `bbox` region of `image`.
pub fn crop(image: &DynamicImage, bbox: &CropBox) -> DynamicImage {
    image.crop_imm(
        bbox.x_min as u32,
        bbox.y_min as u32,
        bbox.width as u32,
        bbox.height as u32,
    )
}
