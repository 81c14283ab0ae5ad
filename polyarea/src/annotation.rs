//! Labelme-style annotation files: one JSON record per image, holding the
//! image path and a list of annotated polygons.

use std::{collections::HashMap, fs, path::Path};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors which can occur while loading an annotation file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The file could not be read at all.
    #[error("could not read {path}")]
    Io {
        /// Path to the unreadable file.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file was not valid JSON.
    #[error("could not parse {path} as JSON")]
    InvalidJson {
        /// Path to the malformed file.
        path: String,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// The JSON was valid but contained no `shapes` collection. Callers are
    /// expected to warn and skip the file.
    #[error("{path} has no shapes data")]
    MissingShapes {
        /// Path to the skipped file.
        path: String,
    },

    /// The JSON had a `shapes` key but did not match the annotation schema.
    #[error("{path} does not match the annotation schema")]
    InvalidSchema {
        /// Path to the mismatched file.
        path: String,
        /// The underlying error.
        source: serde_json::Error,
    },
}

/// One image's annotations: the image it refers to, plus the polygons drawn
/// over it. All fields we don't model are kept in `unknown` and round-trip
/// unchanged.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Annotation {
    /// Path to the annotated image, relative to the annotation file's
    /// directory.
    #[serde(rename = "imagePath")]
    pub image_path: String,

    /// The annotated polygons.
    pub shapes: Vec<Shape>,

    /// Unknown fields, preserved unchanged.
    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

/// A single polygon annotation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Shape {
    /// The polygon's vertices, as `[x, y]` pixel coordinates.
    pub points: Vec<[f64; 2]>,

    /// Computed area, in square millimeters or square pixels depending on
    /// whether the image carried calibration data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    /// Human-readable label: the computed area, prefixed with the nearest
    /// calibration marker's number when one was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Unknown fields, preserved unchanged.
    #[serde(flatten)]
    pub unknown: HashMap<String, Value>,
}

impl Annotation {
    /// Load an annotation file from disk.
    ///
    /// Parsing happens in two phases so that a file which is valid JSON but
    /// has no `shapes` collection is distinguishable (and recoverable) from a
    /// file that is not valid JSON at all.
    pub fn from_path(path: &Path) -> Result<Annotation, LoadError> {
        let display = path.display().to_string();
        let data = fs::read_to_string(path).map_err(|err| LoadError::Io {
            path: display.clone(),
            source: err,
        })?;
        let value: Value =
            serde_json::from_str(&data).map_err(|err| LoadError::InvalidJson {
                path: display.clone(),
                source: err,
            })?;
        if value.get("shapes").is_none() {
            return Err(LoadError::MissingShapes { path: display });
        }
        serde_json::from_value(value).map_err(|err| LoadError::InvalidSchema {
            path: display,
            source: err,
        })
    }

    /// Write this annotation back to `path`, pretty-printed.
    ///
    /// The data is first written to a temporary file in the same directory
    /// and then renamed over the original, so a crash mid-write cannot leave
    /// a half-written file behind.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir).with_context(|| {
            format!("could not create a temporary file in {}", dir.display())
        })?;
        serde_json::to_writer_pretty(tmp.as_file(), self)
            .with_context(|| format!("could not serialize {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("could not replace {}", path.display()))?;
        Ok(())
    }
}
