//! Eclipse photograph triage
//!
//! Locates the solar and lunar disks in eclipse photographs, classifies the
//! visible phase, discards unusable frames and records per-image metadata.
//! The `imgproc` binary drives the [`pipeline`] over a list of images.

pub mod classify;
pub mod config;
pub mod gate;
pub mod image_proc;
pub mod pipeline;
pub mod record;
pub mod shared_args;

pub use classify::{classify_view, EclipseView, SingleCirclePolicy};
pub use config::{ConfigError, Mode, PipelineConfig};
pub use gate::{DiscardReason, QualityGate};
pub use pipeline::{run, run_with_viewer, Pipeline, PipelineError, RunSummary};
pub use record::{ImageRecord, MetadataLine, MetadataParseError};
pub use shared_args::ImgprocArgs;
