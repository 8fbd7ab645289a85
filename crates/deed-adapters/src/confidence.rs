use deed_core::{clamp_confidence, ConfidenceSource, Evaluation, CONFIDENCE_CEILING, CONFIDENCE_FLOOR};
use rand::Rng;

/// Uniform draw over `[0.7, 0.95)`, independent of the verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformConfidence;

impl ConfidenceSource for UniformConfidence {
    fn score(&self, _evaluation: &Evaluation) -> f64 {
        rand::thread_rng().gen_range(CONFIDENCE_FLOOR..CONFIDENCE_CEILING)
    }
}

/// Constant confidence for reproducible responses. Out-of-range values are clamped.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfidence {
    value: f64,
}

impl FixedConfidence {
    pub fn new(value: f64) -> Self {
        Self {
            value: clamp_confidence(value),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl ConfidenceSource for FixedConfidence {
    fn score(&self, _evaluation: &Evaluation) -> f64 {
        self.value
    }
}
