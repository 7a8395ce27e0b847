//! Disk detection: the circle-detector seam and the adapter that feeds the record.
//!
//! The detector itself is a replaceable collaborator behind [`CircleDetector`].
//! [`detect_disks`] wraps one call to it: it times the call, keeps at most
//! [`MAX_DISKS`] candidates in detector order and rescales them to original
//! resolution. Circles never leave this module in working coordinates.

pub mod config;
pub mod hough;

pub use config::DetectionParams;
pub use hough::HoughCircleDetector;

use crate::image_proc::geometry::{rescale_circle, Circle, CoordSpace};
use crate::record::ImageRecord;
use image::GrayImage;
use log::{debug, info};
use shared::ImageSize;
use std::time::Instant;
use thiserror::Error;

/// At most this many candidates are kept: primary and secondary disk.
pub const MAX_DISKS: usize = 2;

/// Timing name of the detection call.
pub const CIRCLES_STAGE: &str = "circles";

/// Observation recorded when the detector returns nothing.
pub const NO_SUN_FOUND: &str = "No sun found";

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("cannot detect circles in an empty {0} image")]
    EmptyImage(ImageSize),

    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
}

/// Circle-detection primitive.
///
/// Implementations return candidates in their own preferred order; callers
/// never re-sort them.
pub trait CircleDetector: Send + Sync {
    /// Find up to `limit` circles in a working-resolution grayscale image.
    ///
    /// Returned circles are in [`CoordSpace::Working`].
    fn find_circles(
        &self,
        image: &GrayImage,
        params: &DetectionParams,
        limit: usize,
    ) -> Result<Vec<Circle>, DetectionError>;

    /// Edge image the detector votes from, for display. Detectors without one return `None`.
    fn edge_map(&self, _image: &GrayImage, _params: &DetectionParams) -> Option<GrayImage> {
        None
    }
}

/// Primary disk plus an optional second one, both in original coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskPair {
    pub primary: Circle,
    pub secondary: Option<Circle>,
}

impl DiskPair {
    /// Build from detector output, ignoring anything past the second candidate.
    pub fn from_candidates(candidates: &[Circle]) -> Option<Self> {
        let (&primary, rest) = candidates.split_first()?;
        Some(Self {
            primary,
            secondary: rest.first().copied(),
        })
    }

    /// The circles in order, primary first.
    pub fn circles(&self) -> impl Iterator<Item = Circle> {
        std::iter::once(self.primary).chain(self.secondary)
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.secondary.is_some())
    }
}

/// Run the detector on the working image and attach the result to `record`.
///
/// Records the `"circles"` timing whether or not detection succeeds. With no
/// candidates the observation `"No sun found"` is added and `Ok(None)` returned;
/// the caller gates on that. Otherwise the first two candidates are rescaled
/// to `original_size` and appended to the record's circle list.
pub fn detect_disks(
    detector: &dyn CircleDetector,
    working: &GrayImage,
    params: &DetectionParams,
    original_size: ImageSize,
    record: &mut ImageRecord,
) -> Result<Option<DiskPair>, DetectionError> {
    let start = Instant::now();
    let result = detector.find_circles(working, params, MAX_DISKS);
    let elapsed = start.elapsed().as_secs_f64();
    record.add_timing(CIRCLES_STAGE, elapsed);
    debug!("Circle detection took {elapsed:.3}s");

    let candidates = result?;
    info!("Found {} circle candidate(s)", candidates.len());

    let working_width = working.width() as usize;
    let rescaled: Vec<Circle> = candidates
        .iter()
        .take(MAX_DISKS)
        .map(|c| match c.space {
            CoordSpace::Working => rescale_circle(c, working_width, original_size.width),
            CoordSpace::Original => *c,
        })
        .collect();

    let Some(disks) = DiskPair::from_candidates(&rescaled) else {
        record.add_observation(NO_SUN_FOUND);
        return Ok(None);
    };

    for circle in disks.circles() {
        record.add_circle(circle);
    }
    Ok(Some(disks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns a fixed candidate list and remembers the limit it was asked for.
    struct ScriptedDetector {
        circles: Vec<Circle>,
        last_limit: Mutex<Option<usize>>,
    }

    impl ScriptedDetector {
        fn new(circles: Vec<Circle>) -> Self {
            Self {
                circles,
                last_limit: Mutex::new(None),
            }
        }
    }

    impl CircleDetector for ScriptedDetector {
        fn find_circles(
            &self,
            _image: &GrayImage,
            _params: &DetectionParams,
            limit: usize,
        ) -> Result<Vec<Circle>, DetectionError> {
            *self.last_limit.lock().unwrap() = Some(limit);
            Ok(self.circles.clone())
        }
    }

    struct FailingDetector;

    impl CircleDetector for FailingDetector {
        fn find_circles(
            &self,
            image: &GrayImage,
            _params: &DetectionParams,
            _limit: usize,
        ) -> Result<Vec<Circle>, DetectionError> {
            Err(DetectionError::EmptyImage(ImageSize::from_u32(
                image.width(),
                image.height(),
            )))
        }
    }

    fn setup() -> (GrayImage, ImageRecord) {
        let working = GrayImage::new(960, 540);
        let record = ImageRecord::new("in.jpg", ImageSize::from_width_height(3840, 2160));
        (working, record)
    }

    #[test]
    fn test_no_candidates_notes_missing_sun() {
        let (working, mut record) = setup();
        let detector = ScriptedDetector::new(vec![]);
        let disks = detect_disks(
            &detector,
            &working,
            &DetectionParams::default(),
            record.original_size(),
            &mut record,
        )
        .unwrap();

        assert!(disks.is_none());
        assert_eq!(record.observations(), [NO_SUN_FOUND]);
        assert!(record.circles().is_empty());
        assert!(record.timing(CIRCLES_STAGE).is_some());
    }

    #[test]
    fn test_keeps_detector_order_and_first_two() {
        let (working, mut record) = setup();
        let detector = ScriptedDetector::new(vec![
            Circle::working(100.0, 100.0, 20.0),
            Circle::working(300.0, 200.0, 60.0),
            Circle::working(500.0, 250.0, 90.0),
        ]);
        let disks = detect_disks(
            &detector,
            &working,
            &DetectionParams::default(),
            record.original_size(),
            &mut record,
        )
        .unwrap()
        .unwrap();

        assert_eq!(*detector.last_limit.lock().unwrap(), Some(MAX_DISKS));
        // Smaller first disk stays primary; factor is 3840 / 960 = 4
        assert_eq!(disks.primary, Circle::original(400.0, 400.0, 80.0));
        assert_eq!(disks.secondary, Some(Circle::original(1200.0, 800.0, 240.0)));
        assert_eq!(disks.len(), 2);
        assert_eq!(record.circles(), [disks.primary, disks.secondary.unwrap()]);
        assert!(record.observations().is_empty());
    }

    #[test]
    fn test_single_candidate() {
        let (working, mut record) = setup();
        let detector = ScriptedDetector::new(vec![Circle::working(480.0, 270.0, 50.0)]);
        let disks = detect_disks(
            &detector,
            &working,
            &DetectionParams::default(),
            record.original_size(),
            &mut record,
        )
        .unwrap()
        .unwrap();

        assert_eq!(disks.secondary, None);
        assert_eq!(disks.circles().count(), 1);
        assert_eq!(record.circles(), [Circle::original(1920.0, 1080.0, 200.0)]);
    }

    #[test]
    fn test_failure_still_records_timing() {
        let (working, mut record) = setup();
        let result = detect_disks(
            &FailingDetector,
            &working,
            &DetectionParams::default(),
            record.original_size(),
            &mut record,
        );
        assert!(matches!(result, Err(DetectionError::EmptyImage(_))));
        assert!(record.timing(CIRCLES_STAGE).is_some());
        assert!(record.circles().is_empty());
    }
}
