// Match Scorer - Field-overlap heuristics
//
// Candidates corroborating several independent fields outrank one strong but
// isolated signal. Boosts are additive and the sum is clamped to [0, 1].

use crate::fusion::{Candidate, CandidateFields, Confidence};
use shelf_common::BookRecord;

const TITLE_BOOST: Confidence = 0.2;
const AUTHOR_BOOST: Confidence = 0.2;
const ISBN_BOOST: Confidence = 0.3;

/// Score a candidate against the current record
pub fn match_score(candidate: &Candidate, record: &BookRecord) -> Confidence {
    let fields = &candidate.fields;
    let description = fields
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let mut score = candidate.raw_confidence;

    // An empty record title is contained in every candidate
    let title = record.title().trim().to_lowercase();
    if title.is_empty()
        || overlaps(fields.title.as_deref(), &title)
        || description.contains(&title)
    {
        score += TITLE_BOOST;
    }

    // An empty record author never earns the boost
    let author = record.author().trim().to_lowercase();
    if !author.is_empty()
        && (overlaps(fields.author.as_deref(), &author) || description.contains(&author))
    {
        score += AUTHOR_BOOST;
    }

    let isbn = record.isbn.trim();
    if !isbn.is_empty() && mentions_isbn(fields, isbn) {
        score += ISBN_BOOST;
    }

    score.clamp(0.0, 1.0)
}

/// Case-insensitive substring match in either direction
fn overlaps(candidate_value: Option<&str>, record_value_lower: &str) -> bool {
    match candidate_value {
        Some(value) if !value.trim().is_empty() => {
            let value = value.trim().to_lowercase();
            value.contains(record_value_lower) || record_value_lower.contains(&value)
        }
        _ => false,
    }
}

/// Exact ISBN string in the candidate's free text; the structured `isbn`
/// field does not count
fn mentions_isbn(fields: &CandidateFields, isbn: &str) -> bool {
    [fields.description.as_deref(), fields.raw_text.as_deref()]
        .into_iter()
        .flatten()
        .any(|text| text.contains(isbn))
}
