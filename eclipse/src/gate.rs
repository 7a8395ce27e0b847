//! Quality gate: decide whether an image is usable after detection.

use crate::image_proc::detection::DiskPair;
use crate::record::ImageRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default smallest acceptable primary radius, original-resolution pixels.
pub const DEFAULT_MIN_SUN_RADIUS: f64 = 50.0;

/// Why an image was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscardReason {
    /// The detector found no disk at all
    NoSunFound,
    /// The primary disk is below the configured minimum radius
    SunTooSmall,
    /// The detector itself failed on this image
    DetectionFailed,
}

impl DiscardReason {
    /// Exact text written to the metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::NoSunFound => "No sun found",
            DiscardReason::SunTooSmall => "Sun is too small",
            DiscardReason::DetectionFailed => "Detection failed",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discard rules applied to the original-resolution disks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_radius: f64,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self {
            min_radius: DEFAULT_MIN_SUN_RADIUS,
        }
    }
}

impl QualityGate {
    pub fn new(min_radius: f64) -> Self {
        Self { min_radius }
    }

    /// Reasons to discard, empty when the image passes.
    ///
    /// Rules run in order and a later rule only applies when the earlier one
    /// passed: no disk, then a primary radius below `min_radius`.
    pub fn evaluate(&self, disks: Option<&DiskPair>) -> Vec<DiscardReason> {
        match disks {
            None => vec![DiscardReason::NoSunFound],
            Some(disks) if disks.primary.radius < self.min_radius => {
                vec![DiscardReason::SunTooSmall]
            }
            Some(_) => Vec::new(),
        }
    }

    /// Evaluate and mark `record`. Returns true when the image passed.
    pub fn apply(&self, disks: Option<&DiskPair>, record: &mut ImageRecord) -> bool {
        let reasons = self.evaluate(disks);
        for reason in &reasons {
            record.discard(reason.as_str());
        }
        reasons.is_empty()
    }
}
