use thiserror::Error;

/// Failure raised by a text-classification backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifierError {
    #[error("classifier transport error: {0}")]
    Transport(String),

    #[error("classifier timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("classifier returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// The single error an evaluation can surface.
///
/// Malformed or missing dates are routing signals, never errors; only classifier
/// failures abort an evaluation, and no partial verdict escapes alongside them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("classifier '{classifier}' failed at step '{step}': {source}")]
    ClassifierFailure {
        classifier: String,
        step: &'static str,
        #[source]
        source: ClassifierError,
    },
}

impl EvaluationError {
    pub fn classifier_failure(
        classifier: impl Into<String>,
        step: &'static str,
        source: ClassifierError,
    ) -> Self {
        Self::ClassifierFailure {
            classifier: classifier.into(),
            step,
            source,
        }
    }

    pub fn step(&self) -> &'static str {
        match self {
            Self::ClassifierFailure { step, .. } => step,
        }
    }
}
