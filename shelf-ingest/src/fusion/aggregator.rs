// Confidence Aggregator
//
// Mean of the selected scores plus a corroboration bonus of 0.05 per
// contributing source, bonus capped at 0.2, result capped at 1.0.

use crate::fusion::Confidence;

const BONUS_PER_SOURCE: Confidence = 0.05;
const MAX_BONUS: Confidence = 0.2;

/// Combine the post-scoring confidences of every contributing source
///
/// Zero contributors yields 0.0.
pub fn aggregate_confidence(scores: &[Confidence]) -> Confidence {
    if scores.is_empty() {
        return 0.0;
    }

    let base = scores.iter().map(|s| s.clamp(0.0, 1.0)).sum::<f64>() / scores.len() as f64;
    let bonus = (BONUS_PER_SOURCE * scores.len() as f64).min(MAX_BONUS);

    (base + bonus).clamp(0.0, 1.0)
}
