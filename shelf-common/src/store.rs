//! JSON library persistence
//!
//! The library is a single pretty-printed JSON array of `BookRecord`s,
//! sorted by original date so timeline consumers can read it in order.
//! Writes go to a temp file first and are renamed into place.

use crate::record::BookRecord;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed book library
#[derive(Debug, Clone)]
pub struct BookStore {
    path: PathBuf,
}

impl BookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all books; a missing file is an empty library
    pub fn load(&self) -> Result<Vec<BookRecord>> {
        if !self.path.exists() {
            debug!("Library {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&data)?)
    }

    /// Replace the library contents
    pub fn save(&self, books: &mut [BookRecord]) -> Result<()> {
        // Stable sort keeps insertion order among equal dates
        books.sort_by_key(|b| b.sortable_date());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_string_pretty(&books)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path)?;

        debug!("Saved {} books to {}", books.len(), self.path.display());
        Ok(())
    }

    /// Insert or replace records by identifier, then save
    ///
    /// A record without an identifier (nothing recovered) is matched by image
    /// path, so a later ingest that recovers a title replaces it.
    pub fn upsert(&self, records: impl IntoIterator<Item = BookRecord>) -> Result<usize> {
        let mut books = self.load()?;
        let mut written = 0;

        for record in records {
            let existing = books.iter().position(|b| same_book(b, &record));
            match existing {
                Some(index) => books[index] = record,
                None => books.push(record),
            }
            written += 1;
        }

        self.save(&mut books)?;
        Ok(written)
    }
}

/// Equal identifiers, or the same cover image when either side has no
/// identifier yet
fn same_book(a: &BookRecord, b: &BookRecord) -> bool {
    if !a.id().is_empty() && !b.id().is_empty() {
        a.id() == b.id()
    } else {
        !a.image_path.is_empty() && a.image_path == b.image_path
    }
}
