//! Shared components for the eclipse image pipeline crates.

pub mod image_size;

pub use image_size::ImageSize;
