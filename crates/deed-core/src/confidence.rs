use crate::types::Evaluation;

pub const CONFIDENCE_FLOOR: f64 = 0.7;
/// Exclusive upper bound.
pub const CONFIDENCE_CEILING: f64 = 0.95;

/// Confidence metadata attached to a response by the calling layer.
///
/// The engine never computes confidence; implementations must return values in
/// `[CONFIDENCE_FLOOR, CONFIDENCE_CEILING)`.
pub trait ConfidenceSource: Send + Sync {
    fn score(&self, evaluation: &Evaluation) -> f64;
}

/// Clamp a raw score into the advertised confidence range.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return CONFIDENCE_FLOOR;
    }
    // Largest f64 strictly below the ceiling.
    let below_ceiling = f64::from_bits(CONFIDENCE_CEILING.to_bits() - 1);
    value.clamp(CONFIDENCE_FLOOR, below_ceiling)
}
