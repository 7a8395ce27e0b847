use crate::classify::SingleCirclePolicy;
use crate::config::{Mode, PipelineConfig, DEFAULT_WORKING_BOX};
use crate::gate::DEFAULT_MIN_SUN_RADIUS;
use crate::image_proc::detection::config::{DEFAULT_DP, DEFAULT_PARAM1, DEFAULT_PARAM2};
use crate::image_proc::detection::DetectionParams;
use crate::image_proc::preprocess::PreprocessStrategy;
use clap::Parser;
use shared::ImageSize;
use std::path::PathBuf;

/// Parse a strictly positive, finite floating point value
fn parse_positive(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid numeric value: {s}"))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("Value must be positive, got {value}"));
    }
    Ok(value)
}

/// Parse the accumulator resolution ratio, which cannot drop below one
fn parse_dp(s: &str) -> Result<f64, String> {
    let value = parse_positive(s)?;
    if value < 1.0 {
        return Err(format!("dp must be at least 1, got {value}"));
    }
    Ok(value)
}

/// Parse a non-zero pixel count
fn parse_pixels(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("Pixel count must be non-zero".to_string()),
        Ok(value) => Ok(value),
        Err(_) => Err(format!("Invalid pixel count: {s}")),
    }
}

/// Detect solar/lunar disks in eclipse photographs and classify the phase
#[derive(Parser, Debug, Clone)]
#[command(name = "imgproc", version, about)]
pub struct ImgprocArgs {
    /// Text file listing one image path per line
    pub input_list: PathBuf,

    /// Batch writes results to disk, window shows each image in turn
    #[arg(long, value_enum, default_value_t = Mode::Batch)]
    pub mode: Mode,

    /// Output directory for annotated images and metadata.txt (required in batch mode)
    #[arg(long, short = 'o')]
    pub output_dir: Option<PathBuf>,

    /// Inverse ratio of accumulator resolution to working image resolution
    #[arg(long, default_value_t = DEFAULT_DP, value_parser = parse_dp)]
    pub dp: f64,

    /// Upper Canny edge threshold
    #[arg(long, default_value_t = DEFAULT_PARAM1, value_parser = parse_positive)]
    pub param1: f64,

    /// Accumulator votes needed for a circle center
    #[arg(long, default_value_t = DEFAULT_PARAM2, value_parser = parse_positive)]
    pub param2: f64,

    /// Minimum distance between circle centers in working pixels
    /// Defaults to one eighth of the working image height
    #[arg(long, value_parser = parse_positive)]
    pub min_dist: Option<f64>,

    /// Discard images whose sun radius is below this many original pixels
    #[arg(long, default_value_t = DEFAULT_MIN_SUN_RADIUS)]
    pub min_sun_radius: f64,

    /// Maximum working image width
    #[arg(long, default_value_t = DEFAULT_WORKING_BOX.width, value_parser = parse_pixels)]
    pub max_width: usize,

    /// Maximum working image height
    #[arg(long, default_value_t = DEFAULT_WORKING_BOX.height, value_parser = parse_pixels)]
    pub max_height: usize,

    /// Preprocessing applied before circle detection
    #[arg(long, value_enum, default_value_t = PreprocessStrategy::UnsharpGaussian)]
    pub preprocess: PreprocessStrategy,

    /// Classification when only one disk is detected
    #[arg(long, value_enum, default_value_t = SingleCirclePolicy::SkipCrescent)]
    pub single_circle: SingleCirclePolicy,

    /// Also save a square crop of side FACTOR * radius around the sun
    #[arg(long, value_parser = parse_positive)]
    pub crop_factor: Option<f64>,

    /// Images analysed in parallel in batch mode
    #[arg(long, short = 'j', default_value_t = 1, value_parser = parse_pixels)]
    pub jobs: usize,

    /// Directory for preview images in window mode
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,
}

impl ImgprocArgs {
    /// Build the run configuration. Cross-field checks happen in [`PipelineConfig::validate`].
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            mode: self.mode,
            input_list: self.input_list.clone(),
            output_dir: self.output_dir.clone(),
            detection: DetectionParams {
                dp: self.dp,
                param1: self.param1,
                param2: self.param2,
                min_dist: self.min_dist,
                ..Default::default()
            },
            min_sun_radius: self.min_sun_radius,
            working_box: ImageSize::from_width_height(self.max_width, self.max_height),
            preprocess: self.preprocess,
            single_circle: self.single_circle,
            crop_factor: self.crop_factor,
            jobs: self.jobs,
            preview_dir: self.preview_dir.clone(),
        }
    }
}
