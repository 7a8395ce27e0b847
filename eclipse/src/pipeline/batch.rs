//! Batch mode: annotated images plus one `metadata.txt` line per image.
//!
//! With `jobs > 1` images are analysed a chunk at a time on the rayon pool.
//! Each worker owns its image and record; writing happens afterwards on the
//! driver thread, in input order, so the metadata file reads the same whatever
//! the job count.

use super::{ImageAnalysis, Pipeline, PipelineError, RunSummary};
use crate::record::ImageRecord;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use rayon::prelude::*;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Metadata file name inside the output directory.
pub const METADATA_FILE: &str = "metadata.txt";

/// Extensions kept as-is for annotated images; anything else gets `.jpg` appended.
const IMAGE_EXTENSIONS: [&str; 6] = [".png", ".PNG", ".jpg", ".JPG", ".jpeg", ".JPEG"];

/// Annotated-image path for `source`: its basename under `output_dir`.
pub fn destination_for(output_dir: &Path, source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("image"));
    let has_image_ext = IMAGE_EXTENSIONS
        .iter()
        .any(|ext| name.to_string_lossy().ends_with(ext));
    if !has_image_ext {
        name.push(".jpg");
    }
    output_dir.join(name)
}

/// `<stem>_disk.<ext>` next to the annotated image.
pub fn disk_crop_path(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = destination
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jpg".to_string());
    destination.with_file_name(format!("{stem}_disk.{ext}"))
}

/// Create the output directory if needed and return its canonical path.
pub(crate) fn prepare_output_dir(path: &Path) -> Result<PathBuf, PipelineError> {
    let map_err = |source| PipelineError::OutputDir {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(path).map_err(map_err)?;
    fs::canonicalize(path).map_err(map_err)
}

/// Single owner of the metadata stream; one flushed line per record.
pub struct MetadataWriter<W: Write> {
    inner: W,
}

impl MetadataWriter<BufWriter<fs::File>> {
    /// Create `metadata.txt` in `output_dir`, replacing any earlier run's file.
    pub fn open(output_dir: &Path) -> Result<Self, PipelineError> {
        let path = output_dir.join(METADATA_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| PipelineError::MetadataFile { path, source })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> MetadataWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, record: &ImageRecord) -> io::Result<()> {
        writeln!(self.inner, "{}", record.metadata_line())?;
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

/// Write the annotated image and disk crop. Failures are logged and noted on the record.
fn save_outputs(analysis: &mut ImageAnalysis) {
    let Some(destination) = analysis.record.destination().map(Path::to_path_buf) else {
        return;
    };

    if let Err(err) = analysis.annotated.save(&destination) {
        error!("Failed to save {}: {err}", destination.display());
        analysis
            .record
            .add_observation(&format!("Could not save annotated image: {err}"));
    } else {
        debug!("Wrote {}", destination.display());
    }

    if let Some(disk_crop) = &analysis.disk_crop {
        let crop_path = disk_crop_path(&destination);
        if let Err(err) = disk_crop.to_rgb8().save(&crop_path) {
            error!("Failed to save {}: {err}", crop_path.display());
            analysis
                .record
                .add_observation(&format!("Could not save disk crop: {err}"));
        }
    }
}

impl Pipeline {
    /// Analyse every listed image and write results under `output_dir`.
    ///
    /// `output_dir` must exist; [`super::run`] creates and canonicalizes it.
    pub fn run_batch(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<RunSummary, PipelineError> {
        let mut writer = MetadataWriter::open(output_dir)?;
        let progress = progress_bar(inputs.len());
        let mut summary = RunSummary::default();

        let analyse = |source: &PathBuf| {
            let destination = destination_for(output_dir, source);
            self.load(source, Some(destination))
        };

        for chunk in inputs.chunks(self.config.jobs.max(1)) {
            let analyses: Vec<Option<ImageAnalysis>> = if self.config.jobs > 1 {
                chunk.par_iter().map(analyse).collect()
            } else {
                chunk.iter().map(analyse).collect()
            };

            for analysis in analyses {
                progress.inc(1);
                let Some(mut analysis) = analysis else {
                    summary.skipped += 1;
                    continue;
                };

                save_outputs(&mut analysis);
                writer
                    .write_record(&analysis.record)
                    .map_err(PipelineError::MetadataWrite)?;

                summary.processed += 1;
                if analysis.record.is_discarded() {
                    summary.discarded += 1;
                }
            }
        }

        progress.finish_and_clear();
        info!(
            "Processed {} image(s): {} discarded, {} skipped",
            summary.processed, summary.discarded, summary.skipped
        );
        Ok(summary)
    }
}
