//! Batch measurement of annotated polygons in labelme-style JSON files.

#![warn(missing_docs)]

use std::path::{Path, PathBuf};

pub use anyhow::{Error, Result};
use clap::Parser;

use crate::{
    annotation::{Annotation, LoadError},
    report::{LogReporter, Reporter},
    ui::Ui,
};

pub mod annotation;
pub mod markers;
pub mod measure;
pub mod report;
pub mod scale;
pub mod scan;
pub mod ui;

#[derive(Debug, Parser)]
/// Measurement tools for labelme-style polygon annotations. Computes the
/// physical or pixel area of every annotated polygon, matches each polygon
/// to the nearest optically-detected calibration marker, and rewrites the
/// annotation files in place.
#[command(name = "polyarea", version)]
enum Args {
    /// Compute areas and marker labels for all annotation files found under
    /// the given directories.
    #[command(name = "analyze")]
    Analyze {
        /// Directories to scan for annotation files.
        #[arg(required = true)]
        directories: Vec<PathBuf>,

        /// File extension to search for.
        #[arg(long, default_value = ".json")]
        ext: String,

        /// Image file extension to check for EXIF calibration data.
        #[arg(long, default_value = ".jpg")]
        exif_ext: String,
    },
}

fn main() -> Result<()> {
    let ui = Ui::init();
    let args = Args::parse();
    match args {
        Args::Analyze {
            directories,
            ext,
            exif_ext,
        } => cmd_analyze(&ui, &directories, &ext, &exif_ext),
    }
}

fn cmd_analyze(
    ui: &Ui,
    directories: &[PathBuf],
    ext: &str,
    exif_ext: &str,
) -> Result<()> {
    let reporter = LogReporter;

    let spinner = ui.new_spinner();
    spinner.set_message("Scanning for annotation files");
    let found = scan::find_files(directories, ext)?;
    spinner.finish_with_message(format!("Found {} annotation files", found.len()));

    // Keep only files with shapes data. A file we can't parse at all is a
    // hard error; a file without shapes is just skipped.
    let pb = ui.new_progress_bar(found.len() as u64);
    pb.set_message("Parsing annotations");
    let mut annotations = Vec::new();
    for path in found {
        match Annotation::from_path(&path) {
            Ok(annotation) => annotations.push((path, annotation)),
            Err(err @ LoadError::MissingShapes { .. }) => {
                reporter.warning(&err.to_string());
            }
            Err(err) => return Err(err.into()),
        }
        pb.inc(1);
    }
    pb.finish();

    let pb = ui.new_progress_bar(annotations.len() as u64);
    pb.set_message("Computing areas");
    for (path, annotation) in &mut annotations {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        let image_path = dir.join(&annotation.image_path);
        let scale = scale::resolve(&image_path, exif_ext, &reporter)?;
        let markers = if scale.is_calibrated() {
            vec![]
        } else {
            markers::detect(&image_path, &reporter)?
        };
        measure::apply(annotation, scale, &markers);
        pb.inc(1);
    }
    pb.finish();

    let pb = ui.new_progress_bar(annotations.len() as u64);
    pb.set_message("Writing areas to disk");
    for (path, annotation) in &annotations {
        annotation.save(path)?;
        pb.inc(1);
    }
    pb.finish();

    Ok(())
}
