use crate::error::{ClassifierError, EvaluationError};
use crate::question::Question;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Pluggable yes/no text classifier.
///
/// Implementations may be slow or non-deterministic across calls. The engine treats any
/// error as fatal for the whole evaluation.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, text: &str, question: &str) -> Result<bool, ClassifierError>;
}

/// Per-evaluation answer memo.
///
/// Each question reaches the classifier at most once; later asks return the first answer.
/// A sheet never outlives the evaluation that created it.
pub struct AnswerSheet<'a> {
    classifier: &'a dyn TextClassifier,
    text: &'a str,
    answers: BTreeMap<Question, bool>,
}

impl<'a> AnswerSheet<'a> {
    pub fn new(classifier: &'a dyn TextClassifier, text: &'a str) -> Self {
        Self {
            classifier,
            text,
            answers: BTreeMap::new(),
        }
    }

    pub async fn ask(&mut self, question: Question) -> Result<bool, EvaluationError> {
        if let Some(answer) = self.answers.get(&question) {
            return Ok(*answer);
        }

        let answer = self
            .classifier
            .classify(self.text, question.prompt())
            .await
            .map_err(|source| {
                EvaluationError::classifier_failure(
                    self.classifier.name(),
                    question.step().name(),
                    source,
                )
            })?;
        self.answers.insert(question, answer);
        Ok(answer)
    }

    pub fn answer(&self, question: Question) -> Option<bool> {
        self.answers.get(&question).copied()
    }

    pub fn asked(&self) -> usize {
        self.answers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextClassifier for CountingClassifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn classify(&self, _text: &str, question: &str) -> Result<bool, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Question::from_prompt(question) == Some(Question::ResidentialUse))
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl TextClassifier for BrokenClassifier {
        fn name(&self) -> &str {
            "broken"
        }

        async fn classify(&self, _text: &str, _question: &str) -> Result<bool, ClassifierError> {
            Err(ClassifierError::Unavailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn repeated_question_is_answered_from_memory() {
        let classifier = CountingClassifier {
            calls: AtomicUsize::new(0),
        };
        let mut sheet = AnswerSheet::new(&classifier, "deed text");

        assert!(sheet.ask(Question::ResidentialUse).await.unwrap());
        assert!(sheet.ask(Question::ResidentialUse).await.unwrap());
        assert!(!sheet.ask(Question::Conditionality).await.unwrap());

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sheet.asked(), 2);
        assert_eq!(sheet.answer(Question::Conditionality), Some(false));
        assert_eq!(sheet.answer(Question::JointLiabilities), None);
    }

    #[tokio::test]
    async fn failure_is_attributed_to_the_asking_step() {
        let mut sheet = AnswerSheet::new(&BrokenClassifier, "deed text");
        let err = sheet.ask(Question::InquiryReference).await.unwrap_err();

        assert_eq!(err.step(), "analyze_inquiry_reference");
        assert!(err.to_string().contains("classifier 'broken'"));
        assert_eq!(sheet.asked(), 0);
    }
}
