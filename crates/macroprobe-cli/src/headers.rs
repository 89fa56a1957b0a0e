//! Header discovery

use anyhow::{bail, Result};
use macroprobe_core::ScanConfig;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand the command-line inputs into header paths. Files are taken as
/// given; directories are walked for files with a header extension. The
/// result keeps argument order, and each directory's files are sorted.
pub fn collect_headers(inputs: &[PathBuf], scan: &ScanConfig) -> Result<Vec<PathBuf>> {
    let mut headers = Vec::new();

    for input in inputs {
        if input.is_file() {
            headers.push(input.clone());
        } else if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_entry(|e| !is_excluded(e.path(), input, scan))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && has_header_extension(e.path(), scan))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            headers.extend(found);
        } else {
            bail!("No such file or directory: {}", input.display());
        }
    }

    Ok(headers)
}

fn is_excluded(path: &Path, root: &Path, scan: &ScanConfig) -> bool {
    path != root
        && path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| scan.exclude_dirs.iter().any(|d| d == n))
}

fn has_header_extension(path: &Path, scan: &ScanConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| scan.extensions.iter().any(|x| x == e))
}
