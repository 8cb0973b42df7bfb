use anyhow::{Context, Result};
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Settings;

/// Collect the source files under `paths` that should be instrumented.
///
/// Each path may be a file, a directory (walked recursively) or a glob
/// pattern. Files are kept when their extension is configured and no skip
/// pattern matches them. The result is sorted and free of duplicates.
pub fn collect_source_files(paths: &[PathBuf], settings: &Settings) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let path_str = path.to_string_lossy();

        // Check if path contains glob pattern characters
        if path_str.contains('*') || path_str.contains('?') || path_str.contains('[') {
            for entry in glob(&path_str).context("Failed to parse glob pattern")? {
                match entry {
                    Ok(file_path) => {
                        if file_path.is_file() && settings.has_extension(&file_path) {
                            files.push(file_path);
                        }
                    }
                    Err(e) => warn!("Error reading glob entry: {}", e),
                }
            }
        } else if path.is_file() {
            if settings.has_extension(path) {
                files.push(path.clone());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && settings.has_extension(e.path()))
            {
                files.push(entry.path().to_path_buf());
            }
        } else {
            warn!(path = %path.display(), "path does not exist");
        }
    }

    files.retain(|file| !skipped(file, settings));
    files.sort();
    files.dedup();
    Ok(files)
}

fn skipped(file: &Path, settings: &Settings) -> bool {
    let skip = settings.is_skipped(file);
    if skip {
        debug!(path = %file.display(), "skipping file");
    }
    skip
}
