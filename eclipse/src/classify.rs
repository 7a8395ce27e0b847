//! Eclipse phase classification from the detected disks.
//!
//! Two overlapping disks of similar size with distinct centers are the sun
//! partially covered by the moon: a crescent. Otherwise brightness decides: a
//! disk far brighter than the frame as a whole is the uneclipsed sun, anything
//! dimmer is read as totality (the corona glow around a dark moon).
//!
//! | Test            | Definition                                           |
//! |-----------------|------------------------------------------------------|
//! | `same_center`   | centers exactly equal                                |
//! | `radii_close`   | smaller radius above 70% of the larger               |
//! | `overlapping`   | center distance below the sum of radii               |
//! | crescent        | `radii_close && overlapping && !same_center`         |
//! | full disk       | disk mean above 10x the whole-image mean             |

use crate::image_proc::detection::DiskPair;
use crate::image_proc::geometry::Circle;
use crate::image_proc::intensity::IntensitySampler;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smaller radius must exceed this fraction of the larger for a crescent.
pub const CRESCENT_RADIUS_RATIO: f64 = 0.7;

/// Disk-to-frame brightness ratio above which the disk is the bare sun.
pub const FULL_DISK_INTENSITY_RATIO: f64 = 10.0;

/// Visible phase of the eclipse in one photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EclipseView {
    /// Uneclipsed (or nearly uneclipsed) solar disk
    FullDisk,
    /// Partial phase, moon overlapping the sun
    Crescent,
    /// Total phase, sun fully covered
    Totality,
    /// Not enough information to decide
    Unknown,
}

impl EclipseView {
    /// Stable lowercase label used in metadata observations.
    pub fn label(&self) -> &'static str {
        match self {
            EclipseView::FullDisk => "full-disk",
            EclipseView::Crescent => "crescent",
            EclipseView::Totality => "totality",
            EclipseView::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EclipseView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do when only one disk was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum SingleCirclePolicy {
    /// Skip the crescent test and decide by brightness alone
    #[default]
    SkipCrescent,
    /// Run the crescent test against a zero circle at the origin
    ZeroCircle,
}

/// Pairwise relations between the primary and secondary disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskRelation {
    /// Euclidean center distance
    pub distance: f64,
    /// Centers exactly equal
    pub same_center: bool,
    /// Radii within 30% of each other
    pub radii_close: bool,
    /// Disks intersect
    pub overlapping: bool,
}

impl DiskRelation {
    pub fn between(c1: &Circle, c2: &Circle) -> Self {
        let distance = c1.center_distance(c2);
        let (r1, r2) = (c1.radius, c2.radius);
        let radii_close = (r2 > CRESCENT_RADIUS_RATIO * r1 && r2 <= r1)
            || (r1 > CRESCENT_RADIUS_RATIO * r2 && r1 <= r2);

        Self {
            distance,
            same_center: c1.same_center(c2),
            radii_close,
            overlapping: distance < r1 + r2,
        }
    }

    pub fn is_crescent(&self) -> bool {
        self.radii_close && self.overlapping && !self.same_center
    }
}

/// Classify the view from up to two disks.
///
/// Both circles and the sampler must share one coordinate space; pairing a
/// working-space circle with an original-resolution image yields `Unknown`.
pub fn classify_view<S>(
    disks: Option<&DiskPair>,
    sampler: &S,
    policy: SingleCirclePolicy,
) -> EclipseView
where
    S: IntensitySampler + ?Sized,
{
    let Some(disks) = disks else {
        return EclipseView::Unknown;
    };
    let primary = disks.primary;

    let secondary = match (disks.secondary, policy) {
        (Some(secondary), _) => Some(secondary),
        (None, SingleCirclePolicy::SkipCrescent) => None,
        (None, SingleCirclePolicy::ZeroCircle) => Some(Circle::new(0.0, 0.0, 0.0, primary.space)),
    };

    if let Some(secondary) = secondary {
        if secondary.space != primary.space {
            return EclipseView::Unknown;
        }
        if DiskRelation::between(&primary, &secondary).is_crescent() {
            return EclipseView::Crescent;
        }
    }

    classify_by_intensity(&primary, sampler)
}

/// Brightness-only decision between full disk and totality.
pub fn classify_by_intensity<S>(primary: &Circle, sampler: &S) -> EclipseView
where
    S: IntensitySampler + ?Sized,
{
    let Some(disk) = sampler.mean_intensity_in_circle(primary) else {
        return EclipseView::Unknown;
    };
    let overall = sampler.mean_intensity();

    if disk > FULL_DISK_INTENSITY_RATIO * overall {
        EclipseView::FullDisk
    } else {
        EclipseView::Totality
    }
}
