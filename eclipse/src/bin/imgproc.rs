//! Batch or interactive eclipse photo triage.
//!
//! ```text
//! imgproc photos.txt --output-dir out/
//! imgproc photos.txt --mode window --preview-dir previews/
//! ```

use clap::Parser;
use eclipse::{run, ImgprocArgs};
use env_logger::Env;
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = ImgprocArgs::parse();
    let config = args.to_config();

    match run(config) {
        Ok(summary) => {
            info!(
                "Done: {} processed, {} discarded, {} skipped{}",
                summary.processed,
                summary.discarded,
                summary.skipped,
                if summary.quit_early { " (quit early)" } else { "" }
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
