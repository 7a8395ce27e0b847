//! Run configuration, built once at startup and passed by reference everywhere.

use crate::classify::SingleCirclePolicy;
use crate::gate::DEFAULT_MIN_SUN_RADIUS;
use crate::image_proc::detection::{DetectionError, DetectionParams};
use crate::image_proc::preprocess::PreprocessStrategy;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use shared::ImageSize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default working-resolution bounding box.
pub const DEFAULT_WORKING_BOX: ImageSize = ImageSize {
    width: 1920,
    height: 1080,
};

/// How results are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum Mode {
    /// Write annotated images and metadata to the output directory
    #[default]
    Batch,
    /// Show each result and wait for the user
    Window,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Batch => write!(f, "batch"),
            Mode::Window => write!(f, "window"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("batch mode requires an output directory")]
    MissingOutputDir,

    #[error("working box must have non-zero sides, got {0}")]
    InvalidWorkingBox(ImageSize),

    #[error(transparent)]
    InvalidDetectionParams(#[from] DetectionError),

    #[error("minimum sun radius must be a non-negative number, got {0}")]
    InvalidMinRadius(f64),

    #[error("crop factor must be positive, got {0}")]
    InvalidCropFactor(f64),

    #[error("at least one job is required")]
    ZeroJobs,
}

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Text file listing one image path per line
    pub input_list: PathBuf,
    /// Destination of annotated images and `metadata.txt` (batch mode)
    pub output_dir: Option<PathBuf>,
    pub detection: DetectionParams,
    /// Smallest acceptable primary radius, original pixels
    pub min_sun_radius: f64,
    /// Box the working image is fitted into
    pub working_box: ImageSize,
    pub preprocess: PreprocessStrategy,
    pub single_circle: SingleCirclePolicy,
    /// Write a disk crop of side `factor * radius` next to each annotated image
    pub crop_factor: Option<f64>,
    /// Images analysed concurrently in batch mode
    pub jobs: usize,
    /// Where the console viewer writes preview images (window mode)
    pub preview_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Batch,
            input_list: PathBuf::new(),
            output_dir: None,
            detection: DetectionParams::default(),
            min_sun_radius: DEFAULT_MIN_SUN_RADIUS,
            working_box: DEFAULT_WORKING_BOX,
            preprocess: PreprocessStrategy::default(),
            single_circle: SingleCirclePolicy::default(),
            crop_factor: None,
            jobs: 1,
            preview_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Check everything that can be checked before touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == Mode::Batch && self.output_dir.is_none() {
            return Err(ConfigError::MissingOutputDir);
        }
        if !self.working_box.is_valid() {
            return Err(ConfigError::InvalidWorkingBox(self.working_box));
        }
        self.detection.validate()?;
        if !self.min_sun_radius.is_finite() || self.min_sun_radius < 0.0 {
            return Err(ConfigError::InvalidMinRadius(self.min_sun_radius));
        }
        if let Some(factor) = self.crop_factor {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(ConfigError::InvalidCropFactor(factor));
            }
        }
        if self.jobs == 0 {
            return Err(ConfigError::ZeroJobs);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> PipelineConfig {
        PipelineConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.working_box, ImageSize::from_width_height(1920, 1080));
        assert_eq!(config.min_sun_radius, 50.0);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.single_circle, SingleCirclePolicy::SkipCrescent);
        assert!(batch().validate().is_ok());
    }

    #[test]
    fn test_batch_needs_output_dir() {
        let config = PipelineConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingOutputDir)));

        let window = PipelineConfig {
            mode: Mode::Window,
            ..Default::default()
        };
        assert!(window.validate().is_ok());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let config = PipelineConfig {
            working_box: ImageSize::from_width_height(0, 1080),
            ..batch()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWorkingBox(_))));

        let config = PipelineConfig {
            detection: DetectionParams {
                param2: 0.0,
                ..Default::default()
            },
            ..batch()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDetectionParams(_))
        ));

        let config = PipelineConfig {
            min_sun_radius: -1.0,
            ..batch()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMinRadius(_))));

        let config = PipelineConfig {
            crop_factor: Some(0.0),
            ..batch()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCropFactor(_))));

        let config = PipelineConfig { jobs: 0, ..batch() };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroJobs)));
    }
}
