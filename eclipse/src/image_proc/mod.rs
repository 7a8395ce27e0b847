//! Image-level stages: preprocessing, disk detection, geometry and annotation.

pub mod annotate;
pub mod detection;
pub mod geometry;
pub mod intensity;
pub mod preprocess;

pub use annotate::{annotate, crop};
pub use detection::{detect_disks, CircleDetector, DetectionError, DetectionParams, DiskPair};
pub use geometry::{crop_box, rescale_circle, unscale_circle, Circle, CoordSpace, CropBox};
pub use intensity::IntensitySampler;
pub use preprocess::{PreprocessStrategy, Preprocessed};
