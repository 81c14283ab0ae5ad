//! Physical-scale resolution from image EXIF metadata.
//!
//! Calibrated microscope captures embed a JSON blob in the EXIF
//! `UserComment` field with the effective pixel size (in µm) and the
//! objective magnification. When that data is present, polygon areas can be
//! reported in square millimeters; otherwise everything stays in raw pixel
//! units and we fall back to optical marker detection.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::Context as _;
use exif::{In, Tag, Value};
use serde::Deserialize;

use crate::{report::Reporter, Result};

/// Conversion basis from raw polygon coordinates to area units.
///
/// Exactly one basis applies per image: either the EXIF calibration data was
/// usable, or areas stay in raw pixel units. Never both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scale {
    /// Physical calibration extracted from EXIF metadata.
    Calibrated {
        /// Size of one pixel, in millimeters.
        pixel_size_mm: f64,
        /// Objective magnification the image was taken at.
        magnification: f64,
    },

    /// No calibration data; areas are measured in square pixels.
    Pixels,
}

impl Scale {
    /// The per-pixel scale factor raw polygon areas are multiplied by.
    pub fn pixel_size(self) -> f64 {
        match self {
            Scale::Calibrated { pixel_size_mm, .. } => pixel_size_mm,
            Scale::Pixels => 1.0,
        }
    }

    /// The magnification scaled areas are divided by.
    pub fn magnification(self) -> f64 {
        match self {
            Scale::Calibrated { magnification, .. } => magnification,
            Scale::Pixels => 1.0,
        }
    }

    /// The unit suffix for areas measured under this scale.
    pub fn unit(self) -> &'static str {
        match self {
            Scale::Calibrated { .. } => "mm²",
            Scale::Pixels => "pixels²",
        }
    }

    /// True if this scale came from EXIF calibration data.
    pub fn is_calibrated(self) -> bool {
        matches!(self, Scale::Calibrated { .. })
    }
}

// The calibration blob embedded in the EXIF user comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalibrationComment {
    /// Size of one pixel, in micrometers.
    effective_pixel_size: f64,
    objective_mag: f64,
}

/// Determine the measurement scale for `image_path`.
///
/// Only files matching `exif_ext` are checked for EXIF data. Anything else,
/// and any image whose metadata lacks a usable calibration comment, falls
/// back to pixel units (with a warning in the latter case). A file that
/// cannot be opened at all is a hard error.
pub fn resolve(
    image_path: &Path,
    exif_ext: &str,
    reporter: &dyn Reporter,
) -> Result<Scale> {
    if !has_extension(image_path, exif_ext) {
        return Ok(Scale::Pixels);
    }
    let file = File::open(image_path)
        .with_context(|| format!("could not open image {}", image_path.display()))?;
    let exif = exif::Reader::new().read_from_container(&mut BufReader::new(file));
    match exif.ok().as_ref().and_then(calibration_from_exif) {
        Some(scale) => Ok(scale),
        None => {
            reporter.warning(&format!(
                "{} has no valid EXIF calibration data",
                image_path.display()
            ));
            Ok(Scale::Pixels)
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.file_name()
        .map_or(false, |name| name.to_string_lossy().ends_with(ext))
}

/// Extract calibration data from the EXIF user comment, if there is one and
/// it parses.
fn calibration_from_exif(exif: &exif::Exif) -> Option<Scale> {
    let field = exif.get_field(Tag::UserComment, In::PRIMARY)?;
    let comment = match &field.value {
        Value::Undefined(bytes, _) => decode_user_comment(bytes),
        Value::Ascii(chunks) => {
            String::from_utf8_lossy(&chunks.concat()).into_owned()
        }
        _ => return None,
    };
    parse_calibration_comment(&comment)
}

/// Decode an EXIF `UserComment` payload. The first eight bytes name the
/// character code (`ASCII\0\0\0`, `UNICODE\0`, or all zeroes for
/// "undefined"); the rest is the comment itself.
fn decode_user_comment(bytes: &[u8]) -> String {
    const CHARSET_CODES: [&[u8]; 3] = [b"ASCII\0\0\0", b"UNICODE\0", &[0; 8]];
    let payload = if bytes.len() >= 8 && CHARSET_CODES.contains(&&bytes[..8]) {
        &bytes[8..]
    } else {
        bytes
    };
    String::from_utf8_lossy(payload)
        .trim_matches(char::from(0))
        .trim()
        .to_string()
}

/// Parse the calibration JSON, converting the pixel size from µm to mm.
fn parse_calibration_comment(comment: &str) -> Option<Scale> {
    let parsed: CalibrationComment = serde_json::from_str(comment).ok()?;
    Some(Scale::Calibrated {
        pixel_size_mm: parsed.effective_pixel_size / 1e6,
        magnification: parsed.objective_mag,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::report::testing::CollectingReporter;

    #[test]
    fn calibration_comment_converts_micrometers_to_millimeters() {
        let scale = parse_calibration_comment(
            r#"{"effectivePixelSize": 2000000, "objectiveMag": 10}"#,
        )
        .unwrap();
        assert_eq!(
            scale,
            Scale::Calibrated {
                pixel_size_mm: 2.0,
                magnification: 10.0
            }
        );
        assert!(scale.is_calibrated());
        assert_eq!(scale.unit(), "mm²");
    }

    #[test]
    fn unparseable_comment_yields_no_calibration() {
        assert_eq!(parse_calibration_comment("not json"), None);
        assert_eq!(parse_calibration_comment(r#"{"objectiveMag": 10}"#), None);
    }

    #[test]
    fn user_comment_charset_header_is_stripped() {
        let mut bytes = b"ASCII\0\0\0".to_vec();
        bytes.extend_from_slice(br#"{"effectivePixelSize": 1, "objectiveMag": 1}"#);
        assert_eq!(
            decode_user_comment(&bytes),
            r#"{"effectivePixelSize": 1, "objectiveMag": 1}"#
        );

        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice(b"payload\0\0");
        assert_eq!(decode_user_comment(&bytes), "payload");

        // No header at all: use the bytes as-is.
        assert_eq!(decode_user_comment(b"raw comment"), "raw comment");
    }

    #[test]
    fn pixel_scale_is_the_identity() {
        assert_eq!(Scale::Pixels.pixel_size(), 1.0);
        assert_eq!(Scale::Pixels.magnification(), 1.0);
        assert_eq!(Scale::Pixels.unit(), "pixels²");
        assert!(!Scale::Pixels.is_calibrated());
    }

    #[test]
    fn non_exif_extensions_fall_back_without_a_warning() {
        let reporter = CollectingReporter::default();
        let scale =
            resolve(&PathBuf::from("does-not-exist.png"), ".jpg", &reporter).unwrap();
        assert_eq!(scale, Scale::Pixels);
        assert!(reporter.warnings.borrow().is_empty());
    }

    #[test]
    fn missing_exif_image_is_a_hard_error() {
        let reporter = CollectingReporter::default();
        assert!(resolve(&PathBuf::from("does-not-exist.jpg"), ".jpg", &reporter).is_err());
    }

    #[test]
    fn jpg_without_exif_warns_and_falls_back() {
        // Not a real JPEG, so the EXIF reader can't find any metadata in it.
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("plain.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let reporter = CollectingReporter::default();
        let scale = resolve(&path, ".jpg", &reporter).unwrap();
        assert_eq!(scale, Scale::Pixels);
        let warnings = reporter.warnings.borrow();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("no valid EXIF calibration data"));
    }
}
