use crate::audit::{AuditStep, AuditTrail, Branch};
use crate::classifier::{AnswerSheet, TextClassifier};
use crate::error::EvaluationError;
use crate::observer::{DecisionObserver, TracingObserver};
use crate::question::Question;
use crate::timing::InquiryTiming;
use crate::types::{DeedAttributes, Evaluation, Verdict};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Nodes of the decision tree in evaluation order.
///
/// Every transition moves strictly forward, so an evaluation visits each node at most
/// once and always terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    DocumentType,
    InquiryHistory,
    InquiryTiming,
    TashilLaw,
    JointLiabilities,
    ResidentialUse,
    InquiryReference,
    InquiryResponse,
    Conditionality,
}

impl Stage {
    fn step(self) -> AuditStep {
        match self {
            Self::DocumentType => AuditStep::CheckDocumentType,
            Self::InquiryHistory => AuditStep::CheckInquiryHistory,
            Self::InquiryTiming => AuditStep::CheckInquiryTiming,
            Self::TashilLaw => AuditStep::CheckTashilLaw,
            Self::JointLiabilities => AuditStep::AnalyzeJointLiabilities,
            Self::ResidentialUse => AuditStep::AnalyzeResidentialUse,
            Self::InquiryReference => AuditStep::AnalyzeInquiryReference,
            Self::InquiryResponse => AuditStep::CheckInquiryResponseIssue,
            Self::Conditionality => AuditStep::AnalyzeConditionality,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Advance(Stage),
    Conclude(Verdict),
}

/// Stateless deed violation engine.
///
/// The engine is re-entrant: every call to [`DeedEngine::evaluate`] builds its own audit
/// trail and answer sheet, so one engine can serve concurrent requests.
#[derive(Clone)]
pub struct DeedEngine {
    classifier: Arc<dyn TextClassifier>,
    observer: Arc<dyn DecisionObserver>,
}

impl std::fmt::Debug for DeedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeedEngine")
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

impl DeedEngine {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self {
            classifier,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DecisionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Walk the decision tree for one deed.
    ///
    /// The first violation found wins and short-circuits every later check, including
    /// classifier calls. A classifier failure aborts the evaluation with no verdict.
    pub async fn evaluate(&self, deed: &DeedAttributes) -> Result<Evaluation, EvaluationError> {
        let trace_id = Uuid::new_v4().to_string();
        debug!(
            trace_id = %trace_id,
            document_type = %deed.document_type,
            classifier = self.classifier.name(),
            "deed evaluation started"
        );

        let mut run = Run {
            trace_id: &trace_id,
            deed,
            audit: AuditTrail::new(),
            answers: AnswerSheet::new(self.classifier.as_ref(), &deed.text),
            observer: self.observer.as_ref(),
        };

        let mut stage = Stage::DocumentType;
        let verdict = loop {
            run.audit.enter(stage.step());
            match run.resolve(stage).await? {
                Transition::Advance(next) => {
                    debug_assert!(next > stage, "transition must move forward");
                    stage = next;
                }
                Transition::Conclude(verdict) => break verdict,
            }
        };

        run.audit.enter(if verdict.is_violation() {
            AuditStep::ViolationDetected
        } else {
            AuditStep::AnalysisComplete
        });

        let evaluation = Evaluation {
            trace_id: trace_id.clone(),
            verdict,
            audit: run.audit,
            evaluated_at: Utc::now(),
        };
        self.observer.on_verdict(&evaluation);
        Ok(evaluation)
    }
}

/// State owned by a single evaluation.
struct Run<'a> {
    trace_id: &'a str,
    deed: &'a DeedAttributes,
    audit: AuditTrail,
    answers: AnswerSheet<'a>,
    observer: &'a dyn DecisionObserver,
}

impl Run<'_> {
    async fn resolve(&mut self, stage: Stage) -> Result<Transition, EvaluationError> {
        let deed = self.deed;
        let transition = match stage {
            Stage::DocumentType => {
                self.audit
                    .record_factor("document_type", deed.document_type.as_str());
                if deed.is_booklet() {
                    self.fork(stage, Branch::BookletType);
                    Transition::Advance(Stage::InquiryHistory)
                } else {
                    self.fork(stage, Branch::NonBookletType);
                    Transition::Conclude(Verdict::NonBookletType)
                }
            }
            Stage::InquiryHistory => {
                self.audit
                    .record_factor("has_inquiry_history", deed.has_inquiry_history);
                if deed.has_inquiry_history {
                    self.fork(stage, Branch::HasInquiryHistory);
                    Transition::Advance(Stage::InquiryTiming)
                } else {
                    self.fork(stage, Branch::NoInquiryHistory);
                    Transition::Advance(Stage::TashilLaw)
                }
            }
            Stage::InquiryTiming => {
                let timing =
                    InquiryTiming::assess(deed.inquiry_date.as_deref(), deed.deed_date.as_deref());
                if let Some(days) = timing.days() {
                    self.audit.record_factor("days_difference", days);
                }
                match timing {
                    InquiryTiming::OverWindow { .. } => {
                        self.fork(stage, Branch::TimingOver21Days);
                        Transition::Advance(Stage::TashilLaw)
                    }
                    InquiryTiming::WithinWindow { .. } => {
                        self.fork(stage, Branch::TimingUnder21Days);
                        Transition::Advance(Stage::ResidentialUse)
                    }
                    InquiryTiming::MissingDates => {
                        self.fork(stage, Branch::MissingDates);
                        Transition::Advance(Stage::ResidentialUse)
                    }
                    InquiryTiming::Unparsable => {
                        self.fork(stage, Branch::DateParseError);
                        Transition::Advance(Stage::ResidentialUse)
                    }
                }
            }
            Stage::TashilLaw => {
                self.audit
                    .record_factor("uses_tashil_law", deed.uses_tashil_law);
                if deed.uses_tashil_law {
                    self.fork(stage, Branch::TashilLawUsed);
                    Transition::Advance(Stage::JointLiabilities)
                } else {
                    self.fork(stage, Branch::NoTashilLaw);
                    Transition::Advance(Stage::ResidentialUse)
                }
            }
            Stage::JointLiabilities => {
                if self.ask(Question::JointLiabilities).await? {
                    self.fork(stage, Branch::JointLiabilitiesPresent);
                    Transition::Advance(Stage::ResidentialUse)
                } else {
                    self.fork(stage, Branch::MissingJointLiabilities);
                    Transition::Conclude(Verdict::MissingJointLiabilities)
                }
            }
            Stage::ResidentialUse => {
                if self.ask(Question::ResidentialUse).await? {
                    self.fork(stage, Branch::ResidentialUseInferred);
                    Transition::Conclude(Verdict::ResidentialUseInferred)
                } else {
                    self.fork(stage, Branch::NoResidentialUse);
                    Transition::Advance(Stage::InquiryReference)
                }
            }
            Stage::InquiryReference => {
                // The response-issue flag is only meaningful once the text cites an inquiry;
                // without a citation the flag is never consulted.
                if self.ask(Question::InquiryReference).await? {
                    self.fork(stage, Branch::InquiryReferenceFound);
                    Transition::Advance(Stage::InquiryResponse)
                } else {
                    self.fork(stage, Branch::NoInquiryReference);
                    Transition::Advance(Stage::Conditionality)
                }
            }
            Stage::InquiryResponse => {
                self.audit.record_factor(
                    "inquiry_response_has_issue",
                    deed.inquiry_response_has_issue,
                );
                if deed.inquiry_response_has_issue {
                    self.fork(stage, Branch::InquiryResponseIssue);
                    Transition::Conclude(Verdict::InquiryResponseIssue)
                } else {
                    self.fork(stage, Branch::InquiryResponseClear);
                    Transition::Advance(Stage::Conditionality)
                }
            }
            Stage::Conditionality => {
                if self.ask(Question::Conditionality).await? {
                    self.fork(stage, Branch::ConditionalTransaction);
                    Transition::Conclude(Verdict::ConditionalTransaction)
                } else {
                    self.fork(stage, Branch::NoViolation);
                    Transition::Conclude(Verdict::Clean)
                }
            }
        };
        Ok(transition)
    }

    fn fork(&mut self, stage: Stage, branch: Branch) {
        self.audit.take(branch);
        self.observer.on_fork(self.trace_id, stage.step(), branch);
    }

    async fn ask(&mut self, question: Question) -> Result<bool, EvaluationError> {
        let answer = self.answers.ask(question).await?;
        self.audit.record_factor(question.key(), answer);
        self.observer.on_question(self.trace_id, question, answer);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Deterministic stub: fixed answers per question, records every call.
    struct StubClassifier {
        answers: BTreeMap<Question, bool>,
        fail_on: Option<Question>,
        calls: Mutex<Vec<Question>>,
    }

    impl StubClassifier {
        fn new(answers: &[(Question, bool)]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, question: Question) -> Self {
            self.fail_on = Some(question);
            self
        }

        fn calls(&self) -> Vec<Question> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextClassifier for StubClassifier {
        fn name(&self) -> &str {
            "stub"
        }

        async fn classify(&self, _text: &str, question: &str) -> Result<bool, ClassifierError> {
            let question = Question::from_prompt(question)
                .ok_or_else(|| ClassifierError::MalformedResponse("unknown prompt".to_string()))?;
            self.calls.lock().unwrap().push(question);
            if self.fail_on == Some(question) {
                return Err(ClassifierError::Transport("connection reset".to_string()));
            }
            Ok(self.answers.get(&question).copied().unwrap_or(false))
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        forks: Mutex<Vec<Branch>>,
        verdicts: Mutex<Vec<Verdict>>,
    }

    impl DecisionObserver for RecordingObserver {
        fn on_fork(&self, _trace_id: &str, _step: AuditStep, branch: Branch) {
            self.forks.lock().unwrap().push(branch);
        }

        fn on_verdict(&self, evaluation: &Evaluation) {
            self.verdicts.lock().unwrap().push(evaluation.verdict);
        }
    }

    fn engine_with(stub: &Arc<StubClassifier>) -> DeedEngine {
        DeedEngine::new(stub.clone())
    }

    fn booklet() -> DeedAttributes {
        DeedAttributes::new("booklet", "six donums of agricultural land")
    }

    #[tokio::test]
    async fn non_booklet_short_circuits_without_classifier_calls() {
        let stub = Arc::new(StubClassifier::new(&[]));
        let evaluation = engine_with(&stub)
            .evaluate(
                &DeedAttributes::new("land", "text")
                    .with_inquiry(Some("2025-07-20"), Some("2025-08-15"))
                    .with_tashil_law(true),
            )
            .await
            .unwrap();

        assert_eq!(evaluation.verdict, Verdict::NonBookletType);
        assert_eq!(
            evaluation.audit.step_names(),
            vec!["check_document_type", "violation_detected"]
        );
        assert_eq!(evaluation.audit.branch_tags(), vec!["non_booklet_type"]);
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn recent_inquiry_skips_joint_liabilities_check() {
        let stub = Arc::new(StubClassifier::new(&[(Question::JointLiabilities, false)]));
        let deed = booklet()
            .with_inquiry(Some("2025-08-01"), Some("2025-08-15"))
            .with_tashil_law(true);

        let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::Clean);
        assert!(evaluation.audit.took(Branch::TimingUnder21Days));
        assert!(!evaluation.audit.visited(AuditStep::AnalyzeJointLiabilities));
        assert!(!evaluation.audit.visited(AuditStep::CheckTashilLaw));
        assert_eq!(evaluation.audit.factor("days_difference"), Some(&14.into()));
        assert!(!stub.calls().contains(&Question::JointLiabilities));
    }

    #[tokio::test]
    async fn old_inquiry_without_tashil_reaches_text_analysis() {
        let stub = Arc::new(StubClassifier::new(&[(Question::ResidentialUse, true)]));
        let deed = booklet().with_inquiry(Some("2025-07-20"), Some("2025-08-15"));

        let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::ResidentialUseInferred);
        assert_eq!(
            evaluation.audit.branch_tags(),
            vec![
                "booklet_type",
                "has_inquiry_history",
                "timing_over_21_days",
                "no_tashil_law",
                "residential_use_inferred",
            ]
        );
        assert_eq!(stub.calls(), vec![Question::ResidentialUse]);
    }

    #[tokio::test]
    async fn missing_and_malformed_dates_route_without_error() {
        for (inquiry, deed_date, branch) in [
            (None, Some("2025-08-15"), Branch::MissingDates),
            (Some("2025-07-20"), Some(""), Branch::MissingDates),
            (Some("20-07-2025"), Some("2025-08-15"), Branch::DateParseError),
            (Some("25-07-20"), Some("2025-08-15"), Branch::DateParseError),
            (Some("+2025-07-20"), Some("2025-08-15"), Branch::DateParseError),
            (Some("2025-07-20"), Some("  "), Branch::DateParseError),
        ] {
            let stub = Arc::new(StubClassifier::new(&[]));
            let deed = booklet().with_inquiry(inquiry, deed_date).with_tashil_law(true);

            let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

            assert!(evaluation.audit.took(branch));
            assert!(evaluation.audit.factor("days_difference").is_none());
            assert!(!evaluation.audit.visited(AuditStep::CheckTashilLaw));
            assert_eq!(stub.calls().first(), Some(&Question::ResidentialUse));
        }
    }

    #[tokio::test]
    async fn missing_joint_liabilities_stops_further_questions() {
        let stub = Arc::new(StubClassifier::new(&[(Question::JointLiabilities, false)]));
        let deed = booklet().with_tashil_law(true);

        let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::MissingJointLiabilities);
        assert_eq!(stub.calls(), vec![Question::JointLiabilities]);
        assert_eq!(evaluation.audit.steps.last(), Some(&AuditStep::ViolationDetected));
    }

    #[tokio::test]
    async fn conditional_transaction_after_all_other_checks_pass() {
        let stub = Arc::new(StubClassifier::new(&[
            (Question::JointLiabilities, true),
            (Question::ResidentialUse, false),
            (Question::InquiryReference, false),
            (Question::Conditionality, true),
        ]));
        let deed = booklet().with_tashil_law(true);

        let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::ConditionalTransaction);
        assert_eq!(
            stub.calls(),
            vec![
                Question::JointLiabilities,
                Question::ResidentialUse,
                Question::InquiryReference,
                Question::Conditionality,
            ]
        );
        assert!(!evaluation.audit.visited(AuditStep::CheckInquiryResponseIssue));
    }

    #[tokio::test]
    async fn inquiry_issue_only_checked_when_reference_found() {
        let referenced = Arc::new(StubClassifier::new(&[(Question::InquiryReference, true)]));
        let deed = booklet().with_inquiry_response_issue(true);
        let evaluation = engine_with(&referenced).evaluate(&deed).await.unwrap();
        assert_eq!(evaluation.verdict, Verdict::InquiryResponseIssue);
        assert_eq!(
            evaluation.audit.factor("inquiry_response_has_issue"),
            Some(&true.into())
        );
        assert!(!referenced.calls().contains(&Question::Conditionality));

        let unreferenced = Arc::new(StubClassifier::new(&[]));
        let evaluation = engine_with(&unreferenced).evaluate(&deed).await.unwrap();
        assert_eq!(evaluation.verdict, Verdict::Clean);
        assert!(evaluation.audit.factor("inquiry_response_has_issue").is_none());
    }

    #[tokio::test]
    async fn referenced_inquiry_without_issue_falls_through_to_conditionality() {
        let stub = Arc::new(StubClassifier::new(&[(Question::InquiryReference, true)]));
        let evaluation = engine_with(&stub).evaluate(&booklet()).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::Clean);
        assert!(evaluation.audit.took(Branch::InquiryResponseClear));
        assert_eq!(stub.calls().last(), Some(&Question::Conditionality));
    }

    #[tokio::test]
    async fn clean_deed_ends_with_no_violation() {
        let stub = Arc::new(StubClassifier::new(&[(Question::JointLiabilities, true)]));
        let deed = booklet()
            .with_inquiry(Some("2025-06-01"), Some("2025-08-15"))
            .with_tashil_law(true);

        let evaluation = engine_with(&stub).evaluate(&deed).await.unwrap();

        assert_eq!(evaluation.verdict, Verdict::Clean);
        assert_eq!(evaluation.audit.last_branch(), Some(Branch::NoViolation));
        assert_eq!(evaluation.audit.steps.last(), Some(&AuditStep::AnalysisComplete));
        assert_eq!(evaluation.message(), "پایان (تخلفی شناسایی نشد)");
        // One tag per fork: every non-terminal step entered is a fork.
        assert_eq!(
            evaluation.audit.decision_path.len(),
            evaluation.audit.steps.len() - 1
        );
    }

    #[tokio::test]
    async fn classifier_failure_aborts_evaluation() {
        let stub = Arc::new(
            StubClassifier::new(&[(Question::ResidentialUse, false)])
                .failing_on(Question::InquiryReference),
        );
        let observer = Arc::new(RecordingObserver::default());
        let engine = engine_with(&stub).with_observer(observer.clone());

        let err = engine.evaluate(&booklet()).await.unwrap_err();

        assert_eq!(err.step(), "analyze_inquiry_reference");
        assert!(observer.verdicts.lock().unwrap().is_empty());
        assert!(!stub.calls().contains(&Question::Conditionality));
    }

    #[tokio::test]
    async fn observer_sees_every_fork_in_order() {
        let stub = Arc::new(StubClassifier::new(&[(Question::Conditionality, true)]));
        let observer = Arc::new(RecordingObserver::default());
        let engine = engine_with(&stub).with_observer(observer.clone());

        let evaluation = engine.evaluate(&booklet()).await.unwrap();

        assert_eq!(*observer.forks.lock().unwrap(), evaluation.audit.decision_path);
        assert_eq!(
            *observer.verdicts.lock().unwrap(),
            vec![Verdict::ConditionalTransaction]
        );
    }

    #[tokio::test]
    async fn repeated_evaluations_agree_with_a_fixed_classifier() {
        let stub = Arc::new(StubClassifier::new(&[
            (Question::JointLiabilities, true),
            (Question::InquiryReference, true),
        ]));
        let engine = engine_with(&stub);
        let deed = booklet()
            .with_inquiry(Some("2025-01-01"), Some("2025-03-01"))
            .with_tashil_law(true);

        let first = engine.evaluate(&deed).await.unwrap();
        let second = engine.evaluate(&deed).await.unwrap();

        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.audit, second.audit);
        assert_ne!(first.trace_id, second.trace_id);
    }
}
