//! Discovery of annotation files on disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::Result;

/// Collect all files under `roots` whose names end with `ext`.
///
/// Traversal uses an explicit worklist rather than recursion. Symlink cycles
/// are not detected, so a cyclic directory structure will never terminate.
pub fn find_files(roots: &[PathBuf], ext: &str) -> Result<Vec<PathBuf>> {
    let mut todo: Vec<PathBuf> = roots.to_vec();
    let mut found = vec![];
    while let Some(dir) = todo.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("could not read directory {}", dir.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("could not read directory {}", dir.display()))?;
            let path = entry.path();
            if path.is_dir() {
                todo.push(path);
            } else if has_matching_name(&path, ext) {
                found.push(path);
            }
        }
    }
    Ok(found)
}

fn has_matching_name(path: &Path, ext: &str) -> bool {
    path.file_name()
        .map_or(false, |name| name.to_string_lossy().ends_with(ext))
}
