//! Book record model
//!
//! `BookRecord` is the working bibliographic entity that the reconciliation
//! engine fills in. Its JSON layout is the library's persistence format:
//! flat keys, nested lists for authors and categories, nullable integers for
//! unknown dates.
//!
//! The identifier is derived from the normalized title and author. It cannot
//! be set directly; `set_title` and `set_author` recompute it, and
//! deserialization recomputes it from the stored title and author.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Working bibliographic record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct BookRecord {
    id: String,
    title: String,
    author: String,

    /// Full ordered author credit (primary author first when known)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,

    pub description: String,

    /// Year of original publication (negative for BC, `None` if unknown)
    pub original_date: Option<i32>,

    /// Year of this specific edition (`None` if unknown)
    pub release_date: Option<i32>,

    pub original_location_name: String,
    pub original_location_latitude: f64,
    pub original_location_longitude: f64,

    pub original_language: String,
    pub edition_language: String,

    /// Cover image this record was extracted from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub isbn: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub publisher: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Provenance tag naming the contributing sources (e.g. "Vision+OpenLibrary")
    pub data_source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl BookRecord {
    /// Create a record from the fragments read off a cover
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        let mut record = Self {
            title: title.into(),
            author: author.into(),
            ..Default::default()
        };
        record.refresh_id();
        record
    }

    /// Seed record for a cover image that has not been read yet
    pub fn from_image(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            ..Default::default()
        }
    }

    /// Builder-style ISBN setter, handy for seeds and tests
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.refresh_id();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
        self.refresh_id();
    }

    fn refresh_id(&mut self) {
        self.id = derive_id(&self.title, &self.author);
    }

    /// Human-readable original date ("350 BC", "1813 AD", "Unknown")
    pub fn display_date(&self) -> String {
        match self.original_date {
            None | Some(0) => "Unknown".to_string(),
            Some(year) if year < 0 => format!("{} BC", -year),
            Some(year) => format!("{} AD", year),
        }
    }

    /// Authors as a comma-separated string
    pub fn authors_display(&self) -> String {
        if !self.authors.is_empty() {
            self.authors.join(", ")
        } else if !self.author.is_empty() {
            self.author.clone()
        } else {
            "Unknown Author".to_string()
        }
    }

    /// Sort key for timeline ordering; unknown dates sort as year 0
    pub fn sortable_date(&self) -> i32 {
        self.original_date.unwrap_or(0)
    }
}

/// Derive the record identifier from title and author
///
/// Lowercased `title-author`, spaces become dashes, punctuation that varies
/// between sources (`.`, `,`, `'`, `"`) is dropped.
pub fn derive_id(title: &str, author: &str) -> String {
    let title = title.trim();
    let author = author.trim();
    if title.is_empty() && author.is_empty() {
        return String::new();
    }

    format!("{}-{}", title, author)
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '\'' | '"'))
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// On-disk shape of a record; `id` is accepted but never trusted
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(default)]
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    original_date: Option<i32>,
    #[serde(default)]
    release_date: Option<i32>,
    #[serde(default)]
    original_location_name: String,
    #[serde(default)]
    original_location_latitude: f64,
    #[serde(default)]
    original_location_longitude: f64,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    edition_language: String,
    #[serde(default)]
    image_path: String,
    #[serde(default)]
    isbn: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    data_source: String,
    #[serde(default)]
    processed_at: Option<DateTime<Utc>>,
}

impl From<StoredRecord> for BookRecord {
    fn from(stored: StoredRecord) -> Self {
        let mut record = BookRecord {
            id: String::new(),
            title: stored.title,
            author: stored.author,
            authors: stored.authors,
            description: stored.description,
            original_date: stored.original_date,
            release_date: stored.release_date,
            original_location_name: stored.original_location_name,
            original_location_latitude: stored.original_location_latitude,
            original_location_longitude: stored.original_location_longitude,
            original_language: stored.original_language,
            edition_language: stored.edition_language,
            image_path: stored.image_path,
            isbn: stored.isbn,
            publisher: stored.publisher,
            categories: stored.categories,
            data_source: stored.data_source,
            processed_at: stored.processed_at,
        };
        record.refresh_id();
        record
    }
}
