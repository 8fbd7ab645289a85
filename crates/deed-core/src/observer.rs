use crate::audit::{AuditStep, Branch};
use crate::question::Question;
use crate::types::Evaluation;
use tracing::{debug, info};

/// Hooks fired while an evaluation walks the tree.
///
/// Observers see events as they happen; the returned [`Evaluation`] remains the
/// authoritative record.
pub trait DecisionObserver: Send + Sync {
    fn on_fork(&self, _trace_id: &str, _step: AuditStep, _branch: Branch) {}

    fn on_question(&self, _trace_id: &str, _question: Question, _answer: bool) {}

    fn on_verdict(&self, _evaluation: &Evaluation) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DecisionObserver for NoopObserver {}

/// Emits evaluation events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DecisionObserver for TracingObserver {
    fn on_fork(&self, trace_id: &str, step: AuditStep, branch: Branch) {
        debug!(trace_id, step = step.name(), branch = branch.tag(), "fork resolved");
    }

    fn on_question(&self, trace_id: &str, question: Question, answer: bool) {
        debug!(trace_id, question = question.key(), answer, "classifier answered");
    }

    fn on_verdict(&self, evaluation: &Evaluation) {
        info!(
            trace_id = %evaluation.trace_id,
            verdict = evaluation.verdict.code(),
            forks = evaluation.audit.decision_path.len(),
            "deed evaluation finished"
        );
    }
}
