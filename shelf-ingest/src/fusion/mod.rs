// Fusion Module - Evidence scoring and record fusion
//
// Pipeline per source: Candidates → Scorer → Selector → Fuser, then the
// Aggregator turns the selected scores into one confidence for the run.

pub mod aggregator;
pub mod fuser;
pub mod location;
pub mod scorer;
pub mod selector;

pub use aggregator::aggregate_confidence;
pub use fuser::{FieldFuser, FusionStep, WorkingRecord};
pub use location::{resolve_location, DEFAULT_COORDINATES};
pub use scorer::match_score;
pub use selector::select_best;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Confidence or match score (0.0-1.0)
pub type Confidence = f64;

/// Trust classification of a registered source
///
/// Governs whether a source may overwrite fields the record already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Direct catalog lookups; may correct title and author
    Authoritative,
    /// Opportunistic evidence (cover text, vision model, web search); fill-only
    Corroborating,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Authoritative => write!(f, "authoritative"),
            Tier::Corroborating => write!(f, "corroborating"),
        }
    }
}

/// Record fields the fuser knows how to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Title,
    Author,
    Authors,
    Publisher,
    Description,
    Isbn,
    OriginalDate,
    ReleaseDate,
    OriginalLocationName,
    OriginalLanguage,
    EditionLanguage,
    Categories,
}

impl RecordField {
    /// JSON key of the field, also used as the correction log key
    pub fn key(&self) -> &'static str {
        match self {
            RecordField::Title => "title",
            RecordField::Author => "author",
            RecordField::Authors => "authors",
            RecordField::Publisher => "publisher",
            RecordField::Description => "description",
            RecordField::Isbn => "isbn",
            RecordField::OriginalDate => "original_date",
            RecordField::ReleaseDate => "release_date",
            RecordField::OriginalLocationName => "original_location_name",
            RecordField::OriginalLanguage => "original_language",
            RecordField::EditionLanguage => "edition_language",
            RecordField::Categories => "categories",
        }
    }

    /// Whether a non-empty value may be replaced by an authoritative source
    pub fn is_overwritable(&self) -> bool {
        matches!(self, RecordField::Title | RecordField::Author)
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fields a source actually supplied
///
/// `None` means the source said nothing about the field. The `with_*`
/// builders drop blank strings so an empty value can never win a fill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_date: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Unstructured text the candidate was derived from (OCR output, snippet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One source's proposed answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Source that produced the candidate (may be finer than the adapter, e.g. "Bing")
    pub source: String,
    /// Confidence assigned by the adapter
    pub raw_confidence: Confidence,
    /// Match score; equals `raw_confidence` until the selector scores it
    pub score: Confidence,
    pub fields: CandidateFields,
}

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn non_blank_list(values: Vec<String>) -> Option<Vec<String>> {
    let values: Vec<String> = values.into_iter().filter_map(non_blank).collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

impl Candidate {
    pub fn new(source: impl Into<String>, raw_confidence: Confidence) -> Self {
        let raw_confidence = raw_confidence.clamp(0.0, 1.0);
        Self {
            source: source.into(),
            raw_confidence,
            score: raw_confidence,
            fields: CandidateFields::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.fields.title = non_blank(title);
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.fields.author = non_blank(author);
        self
    }

    /// Full author credit; also supplies the primary author when none was given
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.fields.authors = non_blank_list(authors);
        if self.fields.author.is_none() {
            self.fields.author = self
                .fields
                .authors
                .as_ref()
                .and_then(|a| a.first().cloned());
        }
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.fields.publisher = non_blank(publisher);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.fields.description = non_blank(description);
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.fields.isbn = non_blank(isbn);
        self
    }

    pub fn with_original_date(mut self, year: Option<i32>) -> Self {
        self.fields.original_date = year;
        self
    }

    pub fn with_release_date(mut self, year: Option<i32>) -> Self {
        self.fields.release_date = year;
        self
    }

    pub fn with_location(mut self, name: impl Into<String>) -> Self {
        self.fields.location_name = non_blank(name);
        self
    }

    pub fn with_original_language(mut self, language: impl Into<String>) -> Self {
        self.fields.original_language = non_blank(language);
        self
    }

    pub fn with_edition_language(mut self, language: impl Into<String>) -> Self {
        self.fields.edition_language = non_blank(language);
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.fields.categories = non_blank_list(categories);
        self
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.fields.raw_text = non_blank(text);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.fields.url = non_blank(url);
        self
    }

    /// True when the candidate carries no usable field at all
    pub fn is_empty(&self) -> bool {
        let f = &self.fields;
        f.title.is_none()
            && f.author.is_none()
            && f.authors.is_none()
            && f.publisher.is_none()
            && f.description.is_none()
            && f.isbn.is_none()
            && f.original_date.is_none()
            && f.release_date.is_none()
            && f.location_name.is_none()
            && f.original_language.is_none()
            && f.edition_language.is_none()
            && f.categories.is_none()
    }
}

/// Field-level audit trail for one reconciliation run
///
/// At most one entry per field; a later change replaces the earlier entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionLog(BTreeMap<String, String>);

impl CorrectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; `""` stands in for an empty old value
    pub fn record(&mut self, field: RecordField, old: &str, new: &str) {
        let old = if old.is_empty() { "\"\"" } else { old };
        self.0
            .insert(field.key().to_string(), format!("{} -> {}", old, new));
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fold another log in, later entries replacing earlier ones
    pub fn merge(&mut self, other: CorrectionLog) {
        self.0.extend(other.0);
    }
}

/// Disagreement a source could not resolve in its favour
///
/// Informational only; conflicts never block fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub field: RecordField,
    pub source: String,
    pub current: String,
    pub proposed: String,
    /// Normalized Levenshtein similarity of the two values (0.0-1.0)
    pub similarity: f64,
}

impl ConflictReport {
    pub fn new(
        field: RecordField,
        source: &str,
        current: impl Into<String>,
        proposed: impl Into<String>,
    ) -> Self {
        let current = current.into();
        let proposed = proposed.into();
        let similarity =
            strsim::normalized_levenshtein(&current.to_lowercase(), &proposed.to_lowercase());
        Self {
            field,
            source: source.to_string(),
            current,
            proposed,
            similarity,
        }
    }
}
