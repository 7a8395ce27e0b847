//! Per-image record and the `|`-separated metadata line format.
//!
//! One [`ImageRecord`] is created when an image is loaded, filled in by each
//! pipeline stage, written out once, then dropped. Nothing carries over between
//! images.
//!
//! # Metadata line
//!
//! ```text
//! <destination>|c(<x>,<y>,<r>)|...|t("<stage>",<seconds>)|...|"<observation>"|...
//! ```
//!
//! Every field, the last included, is followed by `|`. Circles appear once per
//! detected disk (original-resolution), then one timing per measured stage, then
//! one quoted observation per note, each group in insertion order.

use crate::classify::EclipseView;
use crate::image_proc::geometry::{Circle, CoordSpace};
use shared::ImageSize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Field separator of the metadata line.
pub const METADATA_SEP: char = '|';

/// Errors produced while reading a metadata line back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetadataParseError {
    #[error("metadata line is empty")]
    Empty,

    #[error("malformed circle field: {0}")]
    Circle(String),

    #[error("malformed timing field: {0}")]
    Timing(String),

    #[error("field {0:?} is out of order (circles, then timings, then observations)")]
    OutOfOrder(String),

    #[error("unrecognized metadata field: {0}")]
    UnknownField(String),
}

/// Replace characters that would break the line format.
fn sanitize(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
        .replace(METADATA_SEP, "/")
        .replace('"', "'")
}

/// Everything the pipeline learned about one input image.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    source: PathBuf,
    destination: Option<PathBuf>,
    original_size: ImageSize,
    working_size: Option<ImageSize>,
    circles: Vec<Circle>,
    timings: Vec<(String, f64)>,
    observations: Vec<String>,
    discard_reasons: Vec<String>,
    view: Option<EclipseView>,
}

impl ImageRecord {
    /// Fresh record for an image that was just loaded.
    pub fn new(source: impl Into<PathBuf>, original_size: ImageSize) -> Self {
        Self {
            source: source.into(),
            destination: None,
            original_size,
            working_size: None,
            circles: Vec::new(),
            timings: Vec::new(),
            observations: Vec::new(),
            discard_reasons: Vec::new(),
            view: None,
        }
    }

    /// Where the annotated image goes (batch mode only).
    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn set_working_size(&mut self, size: ImageSize) {
        self.working_size = Some(size);
    }

    /// Attach a reported circle.
    ///
    /// # Panics
    /// In debug builds, if the circle is not in original-resolution coordinates.
    pub fn add_circle(&mut self, circle: Circle) {
        debug_assert_eq!(
            circle.space,
            CoordSpace::Original,
            "reported circles must be in original coordinates"
        );
        self.circles.push(circle);
    }

    /// Record how long a stage took. Re-recording a stage replaces its value in place.
    pub fn add_timing(&mut self, stage: &str, seconds: f64) {
        let stage = sanitize(stage);
        match self.timings.iter_mut().find(|(name, _)| *name == stage) {
            Some(entry) => entry.1 = seconds,
            None => self.timings.push((stage, seconds)),
        }
    }

    pub fn add_observation(&mut self, observation: &str) {
        self.observations.push(sanitize(observation));
    }

    /// Mark the image as unusable.
    ///
    /// The flag is never cleared. The reason is appended to the discard reasons
    /// and also surfaced as an observation unless that exact note is already present.
    pub fn discard(&mut self, reason: &str) {
        let reason = sanitize(reason);
        if !self.observations.contains(&reason) {
            self.observations.push(reason.clone());
        }
        self.discard_reasons.push(reason);
    }

    /// Store the classification and note it as an observation.
    pub fn set_view(&mut self, view: EclipseView) {
        self.view = Some(view);
        self.add_observation(&format!("View: {view}"));
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn original_size(&self) -> ImageSize {
        self.original_size
    }

    pub fn working_size(&self) -> Option<ImageSize> {
        self.working_size
    }

    pub fn circles(&self) -> &[Circle] {
        &self.circles
    }

    pub fn timings(&self) -> &[(String, f64)] {
        &self.timings
    }

    pub fn timing(&self, stage: &str) -> Option<f64> {
        self.timings
            .iter()
            .find(|(name, _)| name == stage)
            .map(|&(_, seconds)| seconds)
    }

    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    pub fn is_discarded(&self) -> bool {
        !self.discard_reasons.is_empty()
    }

    /// Discard reasons joined with `;`, empty when the image is kept.
    pub fn discard_reasons(&self) -> String {
        self.discard_reasons.join(";")
    }

    pub fn view(&self) -> Option<EclipseView> {
        self.view
    }

    /// The metadata line for this record.
    pub fn metadata_line(&self) -> MetadataLine {
        MetadataLine {
            destination: self
                .destination
                .as_ref()
                .map(|path| sanitize(&path.display().to_string()))
                .unwrap_or_default(),
            circles: self.circles.clone(),
            timings: self.timings.clone(),
            observations: self.observations.clone(),
        }
    }
}

/// One line of `metadata.txt`, without its trailing newline.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataLine {
    pub destination: String,
    pub circles: Vec<Circle>,
    pub timings: Vec<(String, f64)>,
    pub observations: Vec<String>,
}

impl fmt::Display for MetadataLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{METADATA_SEP}", self.destination)?;
        for c in &self.circles {
            write!(
                f,
                "c({},{},{}){METADATA_SEP}",
                c.center_x, c.center_y, c.radius
            )?;
        }
        for (stage, seconds) in &self.timings {
            write!(f, "t(\"{stage}\",{seconds}){METADATA_SEP}")?;
        }
        for observation in &self.observations {
            write!(f, "\"{observation}\"{METADATA_SEP}")?;
        }
        Ok(())
    }
}

/// Position in the fixed field order, used to reject reordered lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum FieldGroup {
    Circles,
    Timings,
    Observations,
}

impl MetadataLine {
    /// Parse a line written by the pipeline. A trailing newline is accepted.
    pub fn parse(line: &str) -> Result<Self, MetadataParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Err(MetadataParseError::Empty);
        }

        let mut fields = line.split(METADATA_SEP);
        let destination = fields.next().unwrap_or_default().to_string();

        let mut parsed = MetadataLine {
            destination,
            circles: Vec::new(),
            timings: Vec::new(),
            observations: Vec::new(),
        };
        let mut group = FieldGroup::Circles;

        for field in fields.filter(|field| !field.is_empty()) {
            let field_group = if field.starts_with("c(") {
                FieldGroup::Circles
            } else if field.starts_with("t(") {
                FieldGroup::Timings
            } else if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
                FieldGroup::Observations
            } else {
                return Err(MetadataParseError::UnknownField(field.to_string()));
            };

            if field_group < group {
                return Err(MetadataParseError::OutOfOrder(field.to_string()));
            }
            group = field_group;

            match field_group {
                FieldGroup::Circles => parsed.circles.push(parse_circle(field)?),
                FieldGroup::Timings => parsed.timings.push(parse_timing(field)?),
                FieldGroup::Observations => parsed
                    .observations
                    .push(field[1..field.len() - 1].to_string()),
            }
        }

        Ok(parsed)
    }
}

fn parse_circle(field: &str) -> Result<Circle, MetadataParseError> {
    let err = || MetadataParseError::Circle(field.to_string());
    let inner = field
        .strip_prefix("c(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(err)?;

    let values = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| err())?;

    match values.as_slice() {
        &[x, y, r] => Ok(Circle::original(x, y, r)),
        _ => Err(err()),
    }
}

fn parse_timing(field: &str) -> Result<(String, f64), MetadataParseError> {
    let err = || MetadataParseError::Timing(field.to_string());
    let inner = field
        .strip_prefix("t(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(err)?;

    let (name, seconds) = inner.rsplit_once(',').ok_or_else(err)?;
    let name = name
        .strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .ok_or_else(err)?;
    let seconds = seconds.trim().parse::<f64>().map_err(|_| err())?;

    Ok((name.to_string(), seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ImageRecord {
        let mut record = ImageRecord::new(
            "/photos/IMG_0042.JPG",
            ImageSize::from_width_height(6000, 4000),
        )
        .with_destination("/out/IMG_0042.JPG");
        record.add_circle(Circle::original(3010.0, 1988.0, 412.0));
        record.add_circle(Circle::original(3105.0, 2011.0, 398.0));
        record.add_timing("circles", 0.734125);
        record.add_observation("Clouds near the disk");
        record
    }

    #[test]
    fn test_metadata_line_format() {
        let line = sample_record().metadata_line().to_string();
        assert_eq!(
            line,
            "/out/IMG_0042.JPG|c(3010,1988,412)|c(3105,2011,398)|\
             t(\"circles\",0.734125)|\"Clouds near the disk\"|"
        );
    }

    #[test]
    fn test_metadata_round_trip() {
        let record = sample_record();
        let written = format!("{}\n", record.metadata_line());
        let parsed = MetadataLine::parse(&written).unwrap();

        assert_eq!(parsed.destination, "/out/IMG_0042.JPG");
        assert_eq!(parsed.circles, record.circles());
        assert_eq!(parsed.timings, record.timings());
        assert_eq!(parsed.observations, record.observations());
    }

    #[test]
    fn test_separator_in_destination() {
        let mut record = ImageRecord::new(
            "/photos/sun|moon.jpg",
            ImageSize::from_width_height(100, 100),
        )
        .with_destination("/out/sun|moon.jpg");
        record.add_circle(Circle::original(50.0, 50.0, 20.0));
        record.add_observation("note");

        let line = record.metadata_line().to_string();
        assert_eq!(line, "/out/sun/moon.jpg|c(50,50,20)|\"note\"|");
        let parsed = MetadataLine::parse(&line).unwrap();
        assert_eq!(parsed.destination, "/out/sun/moon.jpg");
        assert_eq!(parsed.circles, record.circles());
        assert_eq!(parsed.observations, ["note"]);
    }

    #[test]
    fn test_empty_record_line() {
        let record = ImageRecord::new("a.png", ImageSize::from_width_height(10, 10));
        let line = record.metadata_line();
        assert_eq!(line.to_string(), "|");
        assert_eq!(MetadataLine::parse("|").unwrap(), line);
    }

    #[test]
    fn test_observations_are_sanitized() {
        let mut record = ImageRecord::new("a.png", ImageSize::from_width_height(10, 10));
        record.add_observation("say \"cheese\" | smile");
        assert_eq!(record.observations(), ["say 'cheese' / smile"]);

        let parsed = MetadataLine::parse(&record.metadata_line().to_string()).unwrap();
        assert_eq!(parsed.observations, record.observations());
    }

    #[test]
    fn test_timing_replaced_in_place() {
        let mut record = ImageRecord::new("a.png", ImageSize::from_width_height(10, 10));
        record.add_timing("preprocess", 1.0);
        record.add_timing("circles", 2.0);
        record.add_timing("preprocess", 3.0);
        assert_eq!(
            record.timings(),
            [("preprocess".to_string(), 3.0), ("circles".to_string(), 2.0)]
        );
        assert_eq!(record.timing("circles"), Some(2.0));
        assert_eq!(record.timing("annotate"), None);
    }

    #[test]
    fn test_discard_is_monotonic_and_accumulates() {
        let mut record = ImageRecord::new("a.png", ImageSize::from_width_height(10, 10));
        assert!(!record.is_discarded());
        assert_eq!(record.discard_reasons(), "");

        record.add_observation("No sun found");
        record.discard("No sun found");
        assert!(record.is_discarded());
        assert_eq!(record.discard_reasons(), "No sun found");
        // Already noted by the detector, not repeated
        assert_eq!(record.observations(), ["No sun found"]);

        record.discard("Sun is too small");
        assert_eq!(record.discard_reasons(), "No sun found;Sun is too small");
        assert_eq!(record.observations(), ["No sun found", "Sun is too small"]);
    }

    #[test]
    fn test_view_is_noted() {
        let mut record = ImageRecord::new("a.png", ImageSize::from_width_height(10, 10));
        record.set_view(EclipseView::Crescent);
        assert_eq!(record.view(), Some(EclipseView::Crescent));
        assert_eq!(record.observations(), ["View: crescent"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(MetadataLine::parse(""), Err(MetadataParseError::Empty));
        assert!(matches!(
            MetadataLine::parse("x|c(1,2)|"),
            Err(MetadataParseError::Circle(_))
        ));
        assert!(matches!(
            MetadataLine::parse("x|t(circles,0.1)|"),
            Err(MetadataParseError::Timing(_))
        ));
        assert!(matches!(
            MetadataLine::parse("x|\"note\"|c(1,2,3)|"),
            Err(MetadataParseError::OutOfOrder(_))
        ));
        assert!(matches!(
            MetadataLine::parse("x|bogus|"),
            Err(MetadataParseError::UnknownField(_))
        ));
    }
}
