//! Optical detection of calibration markers.
//!
//! Uncalibrated images carry printed reference numbers 1 through 12. We run
//! OCR over the full frame and keep every piece of text that reads as one of
//! those numbers, recording the center of its bounding box so shapes can be
//! matched to the nearest marker.

use std::{collections::HashMap, path::Path};

use anyhow::{anyhow, Context as _};
use lazy_static::lazy_static;
use log::info;
use regex::Regex;

use crate::{report::Reporter, Result};

/// A calibration marker detected in an image.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    /// The marker number, in `[1, 12]`.
    pub number: u32,

    /// The center of the marker's bounding box, in pixel coordinates.
    pub center: (f64, f64),
}

/// One raw OCR word with its bounding box.
#[derive(Debug)]
pub(crate) struct Detection {
    pub(crate) text: String,
    pub(crate) left: f64,
    pub(crate) top: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl Detection {
    /// Center of the bounding box: the mean of its diagonal corners.
    fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// Detect calibration markers in `image_path` by running OCR over the full
/// frame. Returns markers in detection order, one per number.
pub fn detect(image_path: &Path, reporter: &dyn Reporter) -> Result<Vec<Marker>> {
    let img = image::open(image_path)
        .with_context(|| format!("could not decode image {}", image_path.display()))?;
    info!(
        "Using pixel dimensions for {}: {}x{} pixels",
        image_path.display(),
        img.width(),
        img.height()
    );

    let tess_img = rusty_tesseract::Image::from_dynamic_image(&img).map_err(|err| {
        anyhow!("could not prepare {} for OCR: {}", image_path.display(), err)
    })?;
    let output = rusty_tesseract::image_to_data(&tess_img, &ocr_args())
        .map_err(|err| anyhow!("OCR failed for {}: {}", image_path.display(), err))?;

    // Tesseract emits structural rows with no text and confidence -1.
    let detections = output
        .data
        .into_iter()
        .filter(|d| !d.text.trim().is_empty() && d.conf > 0.0)
        .map(|d| Detection {
            text: d.text,
            left: f64::from(d.left),
            top: f64::from(d.top),
            width: f64::from(d.width),
            height: f64::from(d.height),
        })
        .collect();
    Ok(collect_markers(detections, reporter))
}

fn ocr_args() -> rusty_tesseract::Args {
    rusty_tesseract::Args {
        lang: "eng".to_string(),
        config_variables: HashMap::new(),
        dpi: Some(150),
        // Sparse text: find as much text as possible in no particular order.
        psm: Some(11),
        oem: Some(3),
    }
}

lazy_static! {
    // One or two digits forming 1-9 or 10-12, nothing else.
    static ref MARKER_NUMBER: Regex = Regex::new(r"^(1[0-2]|[1-9])$").unwrap();
}

/// Filter raw OCR detections down to unique marker numbers.
///
/// The first detection of each number wins; later duplicates and any text
/// that is not strictly a number 1-12 are reported and discarded. Detection
/// order is preserved.
pub(crate) fn collect_markers(
    detections: Vec<Detection>,
    reporter: &dyn Reporter,
) -> Vec<Marker> {
    let mut markers: Vec<Marker> = vec![];
    for detection in detections {
        let text = detection.text.trim();
        if !MARKER_NUMBER.is_match(text) {
            reporter.diagnostic(&format!("Ignored non-matching OCR result: {:?}", text));
            continue;
        }
        let number = text
            .parse::<u32>()
            .expect("marker regex matched a non-integer");
        if markers.iter().any(|m| m.number == number) {
            reporter
                .diagnostic(&format!("Duplicate marker detected and skipped: {}", number));
            continue;
        }
        markers.push(Marker {
            number,
            center: detection.center(),
        });
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing::CollectingReporter;

    fn detection(text: &str, left: f64, top: f64, width: f64, height: f64) -> Detection {
        Detection {
            text: text.to_owned(),
            left,
            top,
            width,
            height,
        }
    }

    #[test]
    fn keeps_only_numbers_one_through_twelve() {
        let reporter = CollectingReporter::default();
        let markers = collect_markers(
            vec![
                detection("1", 0.0, 0.0, 10.0, 10.0),
                detection("12", 20.0, 0.0, 10.0, 10.0),
                detection("13", 40.0, 0.0, 10.0, 10.0),
                detection("0", 60.0, 0.0, 10.0, 10.0),
                detection("7a", 80.0, 0.0, 10.0, 10.0),
                detection("note", 100.0, 0.0, 10.0, 10.0),
            ],
            &reporter,
        );
        let numbers: Vec<u32> = markers.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![1, 12]);

        let diagnostics = reporter.diagnostics.borrow();
        assert_eq!(diagnostics.len(), 4);
        assert!(diagnostics[0].contains("\"13\""));
    }

    #[test]
    fn first_detection_of_a_number_wins() {
        let reporter = CollectingReporter::default();
        let markers = collect_markers(
            vec![
                detection("5", 10.0, 10.0, 10.0, 10.0),
                detection("5", 500.0, 500.0, 10.0, 10.0),
            ],
            &reporter,
        );
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].center, (15.0, 15.0));

        let diagnostics = reporter.diagnostics.borrow();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].contains("Duplicate marker"));
        assert!(diagnostics[0].contains('5'));
    }

    #[test]
    fn center_is_the_mean_of_the_diagonal_corners() {
        let reporter = CollectingReporter::default();
        let markers =
            collect_markers(vec![detection("7", 90.0, 80.0, 20.0, 40.0)], &reporter);
        assert_eq!(markers[0].center, (100.0, 100.0));
    }

    #[test]
    fn detection_order_is_preserved() {
        let reporter = CollectingReporter::default();
        let markers = collect_markers(
            vec![
                detection("9", 0.0, 0.0, 2.0, 2.0),
                detection("3", 4.0, 0.0, 2.0, 2.0),
                detection("11", 8.0, 0.0, 2.0, 2.0),
            ],
            &reporter,
        );
        let numbers: Vec<u32> = markers.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![9, 3, 11]);
    }
}
