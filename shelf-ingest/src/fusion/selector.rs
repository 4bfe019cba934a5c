// Best-Candidate Selector
//
// Strict maximum over match scores; ties keep the first candidate in the
// order the adapter returned them.

use crate::fusion::{match_score, Candidate};
use shelf_common::BookRecord;
use tracing::debug;

/// Pick the best candidate from one adapter call
///
/// The winner's `score` is overwritten with its match score. An empty list
/// selects nothing.
pub fn select_best(candidates: Vec<Candidate>, record: &BookRecord) -> Option<Candidate> {
    let mut best: Option<(Candidate, f64)> = None;

    for candidate in candidates {
        let score = match_score(&candidate, record);
        debug!(
            source = %candidate.source,
            raw = candidate.raw_confidence,
            score,
            "Scored candidate"
        );

        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((candidate, score));
        }
    }

    best.map(|(mut candidate, score)| {
        candidate.score = score;
        candidate
    })
}
