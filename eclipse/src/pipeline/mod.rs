//! Pipeline driver.
//!
//! Each image goes through `load → preprocess → detect → gate/classify →
//! annotate → record` before the next one is considered. Anything that goes
//! wrong with a single image ends up in that image's [`ImageRecord`]; only
//! startup problems (configuration, input list, output directory, metadata
//! file) are returned as [`PipelineError`].
//!
//! Batch mode writes results to disk ([`batch`]); window mode hands every
//! result to a [`Viewer`] and stops when the viewer asks to quit ([`viewer`]).

pub mod batch;
pub mod viewer;

pub use batch::{destination_for, disk_crop_path, MetadataWriter, METADATA_FILE};
pub use viewer::{ConsoleViewer, Viewer, ViewerAction};

use crate::classify::{classify_view, EclipseView};
use crate::config::{ConfigError, Mode, PipelineConfig};
use crate::gate::{DiscardReason, QualityGate};
use crate::image_proc::annotate::{annotate, crop};
use crate::image_proc::detection::{detect_disks, CircleDetector, HoughCircleDetector};
use crate::image_proc::geometry::crop_box;
use crate::record::ImageRecord;
use image::{DynamicImage, GrayImage, ImageError, RgbImage};
use log::{info, warn};
use shared::ImageSize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Timing name of the preprocessing step.
pub const PREPROCESS_STAGE: &str = "preprocess";

/// Observation recorded when the disk crop would leave the image.
pub const CROP_OUT_OF_BOUNDS: &str = "Disk crop out of bounds";

/// Name of the detector's edge image among the intermediates.
pub const EDGES_INTERMEDIATE: &str = "Canny edges";

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot read input list {path}: {source}")]
    InputList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open metadata file {path}: {source}")]
    MetadataFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write metadata: {0}")]
    MetadataWrite(#[source] io::Error),
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Images that were loaded and analysed
    pub processed: usize,
    /// Processed images that were marked as discarded
    pub discarded: usize,
    /// Input lines whose image could not be loaded
    pub skipped: usize,
    /// The viewer asked to stop before the list was exhausted
    pub quit_early: bool,
}

/// Everything produced for one image.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub record: ImageRecord,
    /// The decoded source image
    pub original: DynamicImage,
    /// Copy of the source with the disks drawn on it
    pub annotated: RgbImage,
    /// Square crop around the primary disk, when configured and in bounds
    pub disk_crop: Option<DynamicImage>,
    /// Preprocessing steps and edge map, window mode only
    pub intermediates: Vec<(String, GrayImage)>,
}

/// Read the input list: one path per line.
///
/// Paths are taken verbatim apart from a trailing `\r`. Blank or all-space
/// lines and lines that are not valid UTF-8 are skipped with a warning.
pub fn read_input_list(path: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let bytes = fs::read(path).map_err(|source| PipelineError::InputList {
        path: path.to_path_buf(),
        source,
    })?;

    let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    let mut inputs = Vec::new();
    for (index, raw) in lines.into_iter().enumerate() {
        let line_no = index + 1;
        let Ok(line) = std::str::from_utf8(raw) else {
            warn!("Skipping line {line_no} of {}: not valid UTF-8", path.display());
            continue;
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            warn!("Skipping blank line {line_no} of {}", path.display());
            continue;
        }
        inputs.push(PathBuf::from(line));
    }

    if inputs.is_empty() {
        warn!("Input list {} contains no images", path.display());
    }
    Ok(inputs)
}

/// Fixed sequence of stages with a pluggable detector.
pub struct Pipeline {
    config: PipelineConfig,
    detector: Box<dyn CircleDetector>,
    gate: QualityGate,
}

impl Pipeline {
    /// Pipeline using the default Hough detector.
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_detector(config, Box::new(HoughCircleDetector::default()))
    }

    pub fn with_detector(config: PipelineConfig, detector: Box<dyn CircleDetector>) -> Self {
        let gate = QualityGate::new(config.min_sun_radius);
        Self {
            config,
            detector,
            gate,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyse one decoded image.
    ///
    /// Never fails: detector errors and crop problems are written into the record.
    pub fn analyze(
        &self,
        source: &Path,
        image: DynamicImage,
        destination: Option<PathBuf>,
    ) -> ImageAnalysis {
        let original_size = ImageSize::from_u32(image.width(), image.height());
        let mut record = ImageRecord::new(source, original_size);
        if let Some(destination) = destination {
            record = record.with_destination(destination);
        }

        let working_size = original_size.fit_within(self.config.working_box);
        record.set_working_size(working_size);
        let keep_intermediates = self.config.mode == Mode::Window;

        let start = Instant::now();
        let preprocessed = self
            .config
            .preprocess
            .apply(&image, working_size, keep_intermediates);
        record.add_timing(PREPROCESS_STAGE, start.elapsed().as_secs_f64());

        let mut intermediates = preprocessed.intermediates;
        if keep_intermediates {
            if let Some(edges) = self
                .detector
                .edge_map(&preprocessed.working, &self.config.detection)
            {
                intermediates.push((EDGES_INTERMEDIATE.to_string(), edges));
            }
        }

        let disks = match detect_disks(
            self.detector.as_ref(),
            &preprocessed.working,
            &self.config.detection,
            original_size,
            &mut record,
        ) {
            Ok(disks) => {
                self.gate.apply(disks.as_ref(), &mut record);
                disks
            }
            Err(err) => {
                warn!("Detection failed for {}: {err}", source.display());
                record.add_observation(&format!("Detection error: {err}"));
                record.discard(DiscardReason::DetectionFailed.as_str());
                None
            }
        };

        let view = match &disks {
            Some(disks) => {
                classify_view(Some(disks), &image.to_luma8(), self.config.single_circle)
            }
            None => EclipseView::Unknown,
        };
        record.set_view(view);
        info!("{}: {view}", source.display());

        let annotated = annotate(&image, disks.as_ref());

        let disk_crop = match (self.config.crop_factor, &disks) {
            (Some(factor), Some(disks)) if !record.is_discarded() => {
                match crop_box(&disks.primary, factor, original_size) {
                    Some(bbox) => Some(crop(&image, &bbox)),
                    None => {
                        warn!("Disk crop for {} leaves the image", source.display());
                        record.add_observation(CROP_OUT_OF_BOUNDS);
                        None
                    }
                }
            }
            _ => None,
        };

        ImageAnalysis {
            record,
            original: image,
            annotated,
            disk_crop,
            intermediates,
        }
    }

    /// Load and analyse the image at `source`.
    pub fn analyze_path(
        &self,
        source: &Path,
        destination: Option<PathBuf>,
    ) -> Result<ImageAnalysis, ImageError> {
        let image = image::open(source)?;
        info!(
            "Opened {} ({}x{})",
            source.display(),
            image.width(),
            image.height()
        );
        Ok(self.analyze(source, image, destination))
    }

    /// Load-and-analyse with load failures logged and turned into `None`.
    fn load(&self, source: &Path, destination: Option<PathBuf>) -> Option<ImageAnalysis> {
        match self.analyze_path(source, destination) {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                warn!("Skipping {}: {err}", source.display());
                None
            }
        }
    }

    /// Show each image in turn until the list ends or the viewer quits.
    pub fn run_interactive(&self, inputs: &[PathBuf], viewer: &mut dyn Viewer) -> RunSummary {
        let mut summary = RunSummary::default();
        for source in inputs {
            let Some(analysis) = self.load(source, None) else {
                summary.skipped += 1;
                continue;
            };
            summary.processed += 1;
            if analysis.record.is_discarded() {
                summary.discarded += 1;
            }
            if viewer.show(&analysis) == ViewerAction::Quit {
                info!("Viewer requested quit");
                summary.quit_early = true;
                break;
            }
        }
        summary
    }
}

/// Run with the console viewer for window mode.
pub fn run(config: PipelineConfig) -> Result<RunSummary, PipelineError> {
    let mut viewer = ConsoleViewer::stdin(config.preview_dir.clone());
    run_with_viewer(config, &mut viewer)
}

/// Validate, read the input list and process every image.
pub fn run_with_viewer(
    config: PipelineConfig,
    viewer: &mut dyn Viewer,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let inputs = read_input_list(&config.input_list)?;
    info!("{} image(s) listed in {}", inputs.len(), config.input_list.display());

    match config.mode {
        Mode::Batch => {
            let output_dir = config
                .output_dir
                .clone()
                .ok_or(ConfigError::MissingOutputDir)?;
            let output_dir = batch::prepare_output_dir(&output_dir)?;
            let pipeline = Pipeline::new(config);
            pipeline.run_batch(&inputs, &output_dir)
        }
        Mode::Window => Ok(Pipeline::new(config).run_interactive(&inputs, viewer)),
    }
}
