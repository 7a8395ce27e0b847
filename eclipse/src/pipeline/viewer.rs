//! Window mode: show each result and wait for the user.

use super::ImageAnalysis;
use image::DynamicImage;
use log::warn;
use std::fs;
use std::io::{self, BufRead, StdinLock};
use std::path::{Path, PathBuf};

/// What the user asked for after seeing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerAction {
    /// Continue with the next image
    Next,
    /// Stop the run
    Quit,
}

/// Presents one analysed image and blocks until the user responds.
pub trait Viewer {
    fn show(&mut self, analysis: &ImageAnalysis) -> ViewerAction;
}

/// Map a line of user input to an action. End of input quits.
pub fn action_for_input(line: Option<&str>) -> ViewerAction {
    match line.map(str::trim) {
        None | Some("q") | Some("Q") | Some("quit") => ViewerAction::Quit,
        Some(_) => ViewerAction::Next,
    }
}

/// Terminal viewer: prints the record, optionally writes preview images, then
/// reads one line of input.
pub struct ConsoleViewer<R: BufRead> {
    input: R,
    preview_dir: Option<PathBuf>,
}

impl ConsoleViewer<StdinLock<'static>> {
    pub fn stdin(preview_dir: Option<PathBuf>) -> Self {
        Self::new(io::stdin().lock(), preview_dir)
    }
}

impl<R: BufRead> ConsoleViewer<R> {
    pub fn new(input: R, preview_dir: Option<PathBuf>) -> Self {
        Self { input, preview_dir }
    }

    fn write_previews(&self, dir: &Path, analysis: &ImageAnalysis) -> Vec<PathBuf> {
        if let Err(err) = fs::create_dir_all(dir) {
            warn!("Cannot create preview directory {}: {err}", dir.display());
            return Vec::new();
        }

        let stem = analysis
            .record
            .source()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let mut images: Vec<(String, DynamicImage)> = vec![(
            "original".to_string(),
            DynamicImage::ImageRgb8(analysis.original.to_rgb8()),
        )];
        images.extend(
            analysis
                .intermediates
                .iter()
                .map(|(name, img)| (name.replace(' ', "_"), DynamicImage::ImageLuma8(img.clone()))),
        );
        images.push((
            "annotated".to_string(),
            DynamicImage::ImageRgb8(analysis.annotated.clone()),
        ));

        let mut written = Vec::new();
        for (name, img) in images {
            let path = dir.join(format!("{stem}_{name}.png"));
            match img.save(&path) {
                Ok(()) => written.push(path),
                Err(err) => warn!("Cannot write preview {}: {err}", path.display()),
            }
        }
        written
    }
}

impl<R: BufRead> Viewer for ConsoleViewer<R> {
    fn show(&mut self, analysis: &ImageAnalysis) -> ViewerAction {
        let record = &analysis.record;
        println!("{}", record.source().display());
        for circle in record.circles() {
            println!("  circle {circle}");
        }
        for (stage, seconds) in record.timings() {
            println!("  {stage}: {seconds:.3}s");
        }
        for observation in record.observations() {
            println!("  {observation}");
        }
        if record.is_discarded() {
            println!("  discarded: {}", record.discard_reasons());
        }

        if let Some(dir) = &self.preview_dir {
            for path in self.write_previews(dir, analysis) {
                println!("  preview {}", path.display());
            }
        }

        println!("Press Enter for the next image, q to quit");
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => action_for_input(None),
            Ok(_) => action_for_input(Some(&line)),
            Err(err) => {
                warn!("Cannot read input: {err}");
                ViewerAction::Quit
            }
        }
    }
}
