//! Sample discovery.
//!
//! Walks a result tree and returns every directory that holds the marker file
//! as an immediate child. The walk is pre-order with entries sorted by file
//! name, so the same tree always yields the same order.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Result, ValidationError};

/// Return every directory under `root` (including `root`) that directly
/// contains a regular file named `marker`.
pub fn locate_samples(root: &Path, marker: &str) -> Result<Vec<PathBuf>> {
    if marker.is_empty() {
        return Err(ValidationError::InvalidArgument(
            "marker file name must not be empty".into(),
        ));
    }
    if !root.is_dir() {
        return Err(ValidationError::InvalidArgument(format!(
            "root directory {} does not exist or is not a directory",
            root.display()
        )));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry during sample discovery");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().join(marker).is_file() {
            found.push(entry.into_path());
        }
    }

    if found.is_empty() {
        return Err(ValidationError::InvalidArgument(format!(
            "no directory under {} contains '{marker}'",
            root.display()
        )));
    }

    tracing::info!(root = %root.display(), samples = found.len(), "discovered sample directories");
    Ok(found)
}
