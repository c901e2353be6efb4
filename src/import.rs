//! Bulk import of every supported export file below a directory.

use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{ImportError, Result};
use crate::model::Geocache;
use crate::parsers::parser_for_path;
use crate::progress::{CombinedProgress, ProgressHandler};

#[derive(Debug, Default)]
pub struct ImportSummary {
    /// Caches in file order, then document order.
    pub caches: Vec<Geocache>,
    pub files_parsed: usize,
    pub failures: Vec<(PathBuf, ImportError)>,
}

impl ImportSummary {
    /// Merge records sharing a geocode. The last record wins, at the
    /// position where the geocode was first seen.
    pub fn deduplicated(&self) -> Vec<Geocache> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut merged: Vec<Geocache> = Vec::with_capacity(self.caches.len());

        for cache in &self.caches {
            match index.get(cache.geocode.as_str()) {
                Some(&slot) => merged[slot] = cache.clone(),
                None => {
                    index.insert(&cache.geocode, merged.len());
                    merged.push(cache.clone());
                }
            }
        }
        merged
    }
}

/// Find every file below `dir` that a parser accepts, sorted by path.
pub fn discover_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && parser_for_path(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Parse every supported file below `dir` in parallel.
///
/// A file failing with an I/O or format error is recorded in
/// [`ImportSummary::failures`] and the others carry on; a cancellation in
/// any file aborts the whole import. `progress` receives the bytes read
/// across all files.
pub fn import_directory(
    dir: &Path,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ImportSummary> {
    info!("Searching for export files in {}...", dir.display());
    let files = discover_files(dir);
    info!("Found {} export files", files.len());

    if files.is_empty() {
        return Ok(ImportSummary::default());
    }

    // files run in parallel, so byte counts are summed across them
    let combined = progress.map(CombinedProgress::new);

    let results: Vec<(PathBuf, Result<Vec<Geocache>>)> = files
        .into_par_iter()
        .progress()
        .map(|path| {
            let file_progress = combined.as_ref().map(CombinedProgress::file);
            let result = import_file(
                &path,
                file_progress.as_ref().map(|p| p as &dyn ProgressHandler),
            );
            (path, result)
        })
        .collect();

    let mut summary = ImportSummary::default();
    for (path, result) in results {
        match result {
            Ok(mut caches) => {
                summary.files_parsed += 1;
                summary.caches.append(&mut caches);
            }
            Err(ImportError::Cancelled) => return Err(ImportError::Cancelled),
            Err(e) => {
                warn!("✗ Error processing {}: {}", path.display(), e);
                summary.failures.push((path, e));
            }
        }
    }

    info!(
        "✓ Extracted {} caches from {} files ({} failed)",
        summary.caches.len(),
        summary.files_parsed,
        summary.failures.len()
    );
    Ok(summary)
}

/// Parse one file with the parser its name selects.
pub fn import_file(path: &Path, progress: Option<&dyn ProgressHandler>) -> Result<Vec<Geocache>> {
    let parser =
        parser_for_path(path).ok_or_else(|| ImportError::UnsupportedFile(path.to_path_buf()))?;
    let caches = parser.parse_file(path, progress)?;
    info!("{} read {} caches from {}", parser.name(), caches.len(), path.display());
    Ok(caches)
}
