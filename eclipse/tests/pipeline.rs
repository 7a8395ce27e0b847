//! End-to-end runs over synthetic eclipse photographs.

use approx::assert_abs_diff_eq;
use eclipse::pipeline::{ImageAnalysis, Viewer, ViewerAction, METADATA_FILE};
use eclipse::{run_with_viewer, Mode, PipelineConfig, PipelineError, RunSummary};
use eclipse::{ConfigError, MetadataLine};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use shared::ImageSize;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 800x600 dark frame with a bright disk of the given radius in the middle.
fn write_disk(dir: &Path, name: &str, radius: Option<i32>) -> PathBuf {
    let mut img = GrayImage::from_pixel(800, 600, Luma([2]));
    if let Some(radius) = radius {
        draw_filled_circle_mut(&mut img, (400, 300), radius, Luma([250]));
    }
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

/// Input list with a full disk, a small disk, a blank frame, plus a blank line
/// and a missing file that must both be skipped.
fn write_inputs(dir: &Path) -> PathBuf {
    let full = write_disk(dir, "full.png", Some(60));
    let small = write_disk(dir, "small.png", Some(20));
    let blank = write_disk(dir, "blank.png", None);
    let missing = dir.join("missing.png");

    let list = dir.join("list.txt");
    let content = format!(
        "{}\n\n{}\n{}\n{}\n",
        full.display(),
        missing.display(),
        small.display(),
        blank.display()
    );
    fs::write(&list, content).unwrap();
    list
}

fn batch_config(list: PathBuf, output_dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        mode: Mode::Batch,
        input_list: list,
        output_dir: Some(output_dir),
        working_box: ImageSize::from_width_height(640, 480),
        crop_factor: Some(4.0),
        ..Default::default()
    }
}

struct NoViewer;

impl Viewer for NoViewer {
    fn show(&mut self, _analysis: &ImageAnalysis) -> ViewerAction {
        panic!("batch mode must not show images");
    }
}

/// Replays fixed answers and remembers what it was shown.
struct ScriptedViewer {
    answers: Vec<ViewerAction>,
    shown: Vec<(PathBuf, usize)>,
}

impl Viewer for ScriptedViewer {
    fn show(&mut self, analysis: &ImageAnalysis) -> ViewerAction {
        self.shown.push((
            analysis.record.source().to_path_buf(),
            analysis.intermediates.len(),
        ));
        if self.answers.is_empty() {
            ViewerAction::Next
        } else {
            self.answers.remove(0)
        }
    }
}

fn read_metadata(output_dir: &Path) -> Vec<MetadataLine> {
    let text = fs::read_to_string(output_dir.join(METADATA_FILE)).unwrap();
    text.lines().map(|line| MetadataLine::parse(line).unwrap()).collect()
}

fn has_observation(line: &MetadataLine, text: &str) -> bool {
    line.observations.iter().any(|o| o == text)
}

#[test]
fn test_batch_run_end_to_end() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let list = write_inputs(dir.path());
    let out = dir.path().join("out");

    let summary = run_with_viewer(batch_config(list, out.clone()), &mut NoViewer).unwrap();
    assert_eq!(
        summary,
        RunSummary {
            processed: 3,
            discarded: 2,
            skipped: 1,
            quit_early: false,
        }
    );

    let lines = read_metadata(&out);
    assert_eq!(lines.len(), 3);
    let out = fs::canonicalize(&out).unwrap();

    // Full disk, in input order first
    let full = &lines[0];
    assert_eq!(PathBuf::from(&full.destination), out.join("full.png"));
    let sun = full.circles[0];
    assert_abs_diff_eq!(sun.center_x, 400.0, epsilon = 4.0);
    assert_abs_diff_eq!(sun.center_y, 300.0, epsilon = 4.0);
    assert_abs_diff_eq!(sun.radius, 60.0, epsilon = 4.0);
    let stages: Vec<&str> = full.timings.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(stages, ["preprocess", "circles"]);
    assert!(has_observation(full, "View: full-disk"));
    assert!(!has_observation(full, "No sun found"));
    assert!(out.join("full.png").exists());
    assert!(out.join("full_disk.png").exists());

    // Too small, still reported with its circle
    let small = &lines[1];
    assert_eq!(PathBuf::from(&small.destination), out.join("small.png"));
    assert!(!small.circles.is_empty());
    assert!(small.circles[0].radius < 50.0);
    assert!(has_observation(small, "Sun is too small"));
    assert!(!out.join("small_disk.png").exists());

    // Nothing to find
    let blank = &lines[2];
    assert!(blank.circles.is_empty());
    assert_eq!(blank.observations, ["No sun found", "View: unknown"]);
    assert!(out.join("blank.png").exists());
}

#[test]
fn test_parallel_batch_matches_sequential() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let list = write_inputs(dir.path());

    let sequential_out = dir.path().join("seq");
    run_with_viewer(
        batch_config(list.clone(), sequential_out.clone()),
        &mut NoViewer,
    )
    .unwrap();

    let parallel_out = dir.path().join("par");
    let config = PipelineConfig {
        jobs: 3,
        ..batch_config(list, parallel_out.clone())
    };
    run_with_viewer(config, &mut NoViewer).unwrap();

    let sequential = read_metadata(&sequential_out);
    let parallel = read_metadata(&parallel_out);
    assert_eq!(sequential.len(), parallel.len());
    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(
            Path::new(&a.destination).file_name(),
            Path::new(&b.destination).file_name()
        );
        assert_eq!(a.circles, b.circles);
        assert_eq!(a.observations, b.observations);
    }
}

#[test]
fn test_rerun_replaces_metadata_file() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let list = write_inputs(dir.path());
    let out = dir.path().join("out");

    run_with_viewer(batch_config(list.clone(), out.clone()), &mut NoViewer).unwrap();
    let first = read_metadata(&out);
    run_with_viewer(batch_config(list, out.clone()), &mut NoViewer).unwrap();
    let second = read_metadata(&out);

    assert_eq!(second.len(), 3);
    let names = |lines: &[MetadataLine]| -> Vec<String> {
        lines.iter().map(|l| l.destination.clone()).collect()
    };
    assert_eq!(names(&first), names(&second));
}

#[test]
fn test_window_mode_stops_on_quit() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let list = write_inputs(dir.path());
    let config = PipelineConfig {
        mode: Mode::Window,
        input_list: list,
        working_box: ImageSize::from_width_height(640, 480),
        ..Default::default()
    };

    let mut viewer = ScriptedViewer {
        answers: vec![ViewerAction::Next, ViewerAction::Quit],
        shown: Vec::new(),
    };
    let summary = run_with_viewer(config, &mut viewer).unwrap();

    assert!(summary.quit_early);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.skipped, 1);
    let shown: Vec<&str> = viewer
        .shown
        .iter()
        .map(|(path, _)| path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(shown, ["full.png", "small.png"]);
    // gray, unsharp, blur and the edge map
    assert!(viewer.shown.iter().all(|&(_, n)| n == 4));
    assert!(!dir.path().join(METADATA_FILE).exists());
}

#[test]
fn test_startup_errors_are_fatal() {
    init_logging();
    let dir = TempDir::new().unwrap();

    let missing_list = batch_config(dir.path().join("nope.txt"), dir.path().join("out"));
    assert!(matches!(
        run_with_viewer(missing_list, &mut NoViewer),
        Err(PipelineError::InputList { .. })
    ));

    let list = write_inputs(dir.path());
    let no_output = PipelineConfig {
        output_dir: None,
        ..batch_config(list.clone(), PathBuf::new())
    };
    assert!(matches!(
        run_with_viewer(no_output, &mut NoViewer),
        Err(PipelineError::Config(ConfigError::MissingOutputDir))
    ));

    // Output "directory" that is actually a file
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "x").unwrap();
    assert!(matches!(
        run_with_viewer(batch_config(list, blocker), &mut NoViewer),
        Err(PipelineError::OutputDir { .. })
    ));
}

#[test]
fn test_empty_input_list_is_not_an_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("empty.txt");
    fs::write(&list, "\n\n").unwrap();

    let summary =
        run_with_viewer(batch_config(list, dir.path().join("out")), &mut NoViewer).unwrap();
    assert_eq!(summary, RunSummary::default());
    assert!(read_metadata(&dir.path().join("out")).is_empty());
}
