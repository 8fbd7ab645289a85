//! Classifier and confidence adapters for deed inspection.

#![deny(unsafe_code)]

pub mod chat;
pub mod confidence;

use async_trait::async_trait;
use deed_core::{ClassifierError, Question, TextClassifier};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub use chat::{ChatClassifierConfig, ChatCompletionClassifier};
pub use confidence::{FixedConfidence, UniformConfidence};

const SAMPLE_CHARS: usize = 200;

/// Placeholder classifier answering every question with a fair coin flip. Never fails.
#[derive(Debug, Clone, Default)]
pub struct RandomClassifier;

#[async_trait]
impl TextClassifier for RandomClassifier {
    fn name(&self) -> &str {
        "random"
    }

    async fn classify(&self, text: &str, question: &str) -> Result<bool, ClassifierError> {
        let answer = rand::random::<bool>();
        debug!(
            question,
            text_sample = %text.chars().take(SAMPLE_CHARS).collect::<String>(),
            answer,
            "simulated classifier answer"
        );
        Ok(answer)
    }
}

/// Deterministic classifier with fixed answers per question.
///
/// Questions without a scripted answer get the default. Every call is logged so
/// smoke runs and tests can check which questions were asked, and in what order.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    answers: BTreeMap<Question, bool>,
    default_answer: bool,
    calls: Mutex<Vec<Question>>,
}

impl ScriptedClassifier {
    pub fn new(default_answer: bool) -> Self {
        Self {
            answers: BTreeMap::new(),
            default_answer,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answer(mut self, question: Question, answer: bool) -> Self {
        self.answers.insert(question, answer);
        self
    }

    /// Build from `question key -> answer` pairs, e.g. loaded from configuration.
    pub fn from_keys<'a>(
        default_answer: bool,
        answers: impl IntoIterator<Item = (&'a str, bool)>,
    ) -> Result<Self, ClassifierError> {
        let mut classifier = Self::new(default_answer);
        for (key, answer) in answers {
            let question = Question::from_key(key).ok_or_else(|| {
                ClassifierError::Unavailable(format!("unknown question key '{key}'"))
            })?;
            classifier.answers.insert(question, answer);
        }
        Ok(classifier)
    }

    pub fn calls(&self) -> Vec<Question> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, _text: &str, question: &str) -> Result<bool, ClassifierError> {
        let question = Question::from_prompt(question).ok_or_else(|| {
            ClassifierError::MalformedResponse("question is not in the catalogue".to_string())
        })?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(question);
        }
        Ok(self
            .answers
            .get(&question)
            .copied()
            .unwrap_or(self.default_answer))
    }
}

/// Deterministic failing classifier useful for chaos testing.
#[derive(Debug, Clone)]
pub struct FailingClassifier {
    error: ClassifierError,
}

impl FailingClassifier {
    pub fn new(error: ClassifierError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl TextClassifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn classify(&self, _text: &str, _question: &str) -> Result<bool, ClassifierError> {
        Err(self.error.clone())
    }
}

/// Bounds every call of the wrapped classifier; expiry is reported as a classifier failure.
#[derive(Clone)]
pub struct TimeoutClassifier {
    inner: Arc<dyn TextClassifier>,
    timeout: Duration,
}

impl std::fmt::Debug for TimeoutClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutClassifier")
            .field("inner", &self.inner.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TimeoutClassifier {
    pub fn new(inner: Arc<dyn TextClassifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl TextClassifier for TimeoutClassifier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn classify(&self, text: &str, question: &str) -> Result<bool, ClassifierError> {
        match tokio::time::timeout(self.timeout, self.inner.classify(text, question)).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = self.timeout.as_millis().min(u64::MAX as u128) as u64;
                warn!(classifier = self.inner.name(), after_ms, "classifier call timed out");
                Err(ClassifierError::Timeout { after_ms })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deed_core::{DeedAttributes, DeedEngine, Verdict};

    struct SlowClassifier;

    #[async_trait]
    impl TextClassifier for SlowClassifier {
        fn name(&self) -> &str {
            "slow"
        }

        async fn classify(&self, _text: &str, _question: &str) -> Result<bool, ClassifierError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn random_classifier_never_fails() {
        let classifier = RandomClassifier;
        for question in Question::ALL {
            assert!(classifier.classify("deed", question.prompt()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn scripted_classifier_answers_by_question() {
        let classifier = ScriptedClassifier::new(false).answer(Question::Conditionality, true);

        assert!(classifier
            .classify("deed", Question::Conditionality.prompt())
            .await
            .unwrap());
        assert!(!classifier
            .classify("deed", Question::ResidentialUse.prompt())
            .await
            .unwrap());
        assert_eq!(
            classifier.calls(),
            vec![Question::Conditionality, Question::ResidentialUse]
        );
    }

    #[tokio::test]
    async fn scripted_classifier_rejects_unknown_prompts() {
        let classifier = ScriptedClassifier::new(true);
        let err = classifier.classify("deed", "Is it raining?").await.unwrap_err();
        assert!(matches!(err, ClassifierError::MalformedResponse(_)));
        assert!(classifier.calls().is_empty());
    }

    #[test]
    fn scripted_classifier_from_keys_validates_keys() {
        assert!(ScriptedClassifier::from_keys(false, [("residential_use", true)]).is_ok());
        assert!(ScriptedClassifier::from_keys(false, [("zoning", true)]).is_err());
    }

    #[tokio::test]
    async fn timeout_maps_to_classifier_error() {
        let classifier = TimeoutClassifier::new(Arc::new(SlowClassifier), Duration::from_millis(10));
        let err = classifier
            .classify("deed", Question::ResidentialUse.prompt())
            .await
            .unwrap_err();
        assert_eq!(err, ClassifierError::Timeout { after_ms: 10 });
        assert_eq!(classifier.name(), "slow");
    }

    #[tokio::test]
    async fn engine_runs_with_scripted_backend() {
        let classifier = Arc::new(
            ScriptedClassifier::new(false)
                .answer(Question::JointLiabilities, true)
                .answer(Question::InquiryReference, true),
        );
        let engine = DeedEngine::new(classifier.clone());
        let deed = DeedAttributes::new("booklet", "deed text")
            .with_tashil_law(true)
            .with_inquiry_response_issue(true);

        let evaluation = engine.evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::InquiryResponseIssue);
        assert_eq!(
            classifier.calls(),
            vec![
                Question::JointLiabilities,
                Question::ResidentialUse,
                Question::InquiryReference,
            ]
        );
    }

    #[tokio::test]
    async fn failing_backend_fails_the_evaluation() {
        let engine = DeedEngine::new(Arc::new(FailingClassifier::new(
            ClassifierError::Unavailable("model offline".to_string()),
        )));
        let deed = DeedAttributes::new("booklet", "deed text");

        let err = engine.evaluate(&deed).await.unwrap_err();
        assert_eq!(err.step(), "analyze_residential_use");
    }
}
