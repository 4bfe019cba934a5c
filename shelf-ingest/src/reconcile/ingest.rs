//! Cover image ingest
//!
//! Scans a directory for cover images, seeds one record per image,
//! reconciles the batch and merges completed records into the library.

use crate::error::ReconcileError;
use crate::reconcile::{Outcome, Reconciler};
use chrono::Utc;
use serde::Serialize;
use shelf_common::{BookRecord, BookStore, Error};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

/// Recognized cover image extensions (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// What an ingest run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Images found in the directory
    pub images: usize,
    /// Records written to the library
    pub saved: usize,
    /// Records left out because the run was cancelled
    pub cancelled: usize,
}

/// Find cover images under `dir`, sorted by path
pub fn scan_images(dir: &Path) -> shelf_common::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(Error::NotFound(format!("Image directory {}", dir.display())));
    }
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!("Not a directory: {}", dir.display())));
    }

    let mut images = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_image(entry.path()) => {
                images.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }

    images.sort();
    Ok(images)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Reconcile every image in `dir` and upsert the results into `store`
pub async fn ingest_directory(
    reconciler: &Reconciler,
    store: &BookStore,
    dir: &Path,
    cancel: &CancellationToken,
) -> Result<IngestSummary, ReconcileError> {
    let images = scan_images(dir)?;
    info!(dir = %dir.display(), images = images.len(), "Cover images found");

    if images.is_empty() {
        return Ok(IngestSummary::default());
    }

    let seeds: Vec<BookRecord> = images
        .iter()
        .map(|path| BookRecord::from_image(path.to_string_lossy()))
        .collect();

    let results = reconciler.reconcile_batch(seeds, cancel).await;

    let mut summary = IngestSummary {
        images: images.len(),
        ..Default::default()
    };

    let processed_at = Utc::now();
    let completed: Vec<BookRecord> = results
        .into_iter()
        .filter_map(|result| match result.outcome {
            Outcome::Completed => {
                let mut record = result.record;
                record.processed_at = Some(processed_at);
                Some(record)
            }
            Outcome::Cancelled => {
                summary.cancelled += 1;
                None
            }
        })
        .collect();

    summary.saved = store.upsert(completed)?;

    info!(
        library = %store.path().display(),
        saved = summary.saved,
        cancelled = summary.cancelled,
        "Ingest complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.JPG"), b"x").unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join("shelf2")).unwrap();
        fs::write(dir.path().join("shelf2").join("c.jpeg"), b"x").unwrap();
        fs::create_dir(dir.path().join(".thumbs")).unwrap();
        fs::write(dir.path().join(".thumbs").join("d.jpg"), b"x").unwrap();

        let images = scan_images(dir.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["a.png", "b.JPG", "shelf2/c.jpeg"]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let result = scan_images(Path::new("/nonexistent/covers"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
