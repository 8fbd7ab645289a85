use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Step identifiers recorded as the engine enters each node of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStep {
    CheckDocumentType,
    CheckInquiryHistory,
    CheckInquiryTiming,
    CheckTashilLaw,
    AnalyzeJointLiabilities,
    AnalyzeResidentialUse,
    AnalyzeInquiryReference,
    CheckInquiryResponseIssue,
    AnalyzeConditionality,
    ViolationDetected,
    AnalysisComplete,
}

impl AuditStep {
    pub fn name(self) -> &'static str {
        match self {
            Self::CheckDocumentType => "check_document_type",
            Self::CheckInquiryHistory => "check_inquiry_history",
            Self::CheckInquiryTiming => "check_inquiry_timing",
            Self::CheckTashilLaw => "check_tashil_law",
            Self::AnalyzeJointLiabilities => "analyze_joint_liabilities",
            Self::AnalyzeResidentialUse => "analyze_residential_use",
            Self::AnalyzeInquiryReference => "analyze_inquiry_reference",
            Self::CheckInquiryResponseIssue => "check_inquiry_response_issue",
            Self::AnalyzeConditionality => "analyze_conditionality",
            Self::ViolationDetected => "violation_detected",
            Self::AnalysisComplete => "analysis_complete",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::ViolationDetected | Self::AnalysisComplete)
    }
}

/// Outcome tag recorded at a fork. Exactly one tag is recorded per fork traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    NonBookletType,
    BookletType,
    HasInquiryHistory,
    NoInquiryHistory,
    #[serde(rename = "timing_over_21_days")]
    TimingOver21Days,
    #[serde(rename = "timing_under_21_days")]
    TimingUnder21Days,
    MissingDates,
    DateParseError,
    NoTashilLaw,
    TashilLawUsed,
    MissingJointLiabilities,
    JointLiabilitiesPresent,
    ResidentialUseInferred,
    NoResidentialUse,
    InquiryReferenceFound,
    NoInquiryReference,
    InquiryResponseIssue,
    InquiryResponseClear,
    ConditionalTransaction,
    NoViolation,
}

impl Branch {
    pub fn tag(self) -> &'static str {
        match self {
            Self::NonBookletType => "non_booklet_type",
            Self::BookletType => "booklet_type",
            Self::HasInquiryHistory => "has_inquiry_history",
            Self::NoInquiryHistory => "no_inquiry_history",
            Self::TimingOver21Days => "timing_over_21_days",
            Self::TimingUnder21Days => "timing_under_21_days",
            Self::MissingDates => "missing_dates",
            Self::DateParseError => "date_parse_error",
            Self::NoTashilLaw => "no_tashil_law",
            Self::TashilLawUsed => "tashil_law_used",
            Self::MissingJointLiabilities => "missing_joint_liabilities",
            Self::JointLiabilitiesPresent => "joint_liabilities_present",
            Self::ResidentialUseInferred => "residential_use_inferred",
            Self::NoResidentialUse => "no_residential_use",
            Self::InquiryReferenceFound => "inquiry_reference_found",
            Self::NoInquiryReference => "no_inquiry_reference",
            Self::InquiryResponseIssue => "inquiry_response_issue",
            Self::InquiryResponseClear => "inquiry_response_clear",
            Self::ConditionalTransaction => "conditional_transaction",
            Self::NoViolation => "no_violation",
        }
    }
}

/// Append-only record of one evaluation, kept for replay and debugging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub steps: Vec<AuditStep>,
    pub decision_path: Vec<Branch>,
    pub factors: BTreeMap<String, Value>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Returns `false` and leaves the trail untouched if the step was already visited.
    pub fn enter(&mut self, step: AuditStep) -> bool {
        let fresh = !self.steps.contains(&step);
        debug_assert!(fresh, "step '{}' entered twice", step.name());
        if !fresh {
            return false;
        }
        self.steps.push(step);
        true
    }

    pub fn take(&mut self, branch: Branch) {
        self.decision_path.push(branch);
    }

    pub fn record_factor(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.factors.insert(name.into(), value.into());
    }

    pub fn visited(&self, step: AuditStep) -> bool {
        self.steps.contains(&step)
    }

    pub fn took(&self, branch: Branch) -> bool {
        self.decision_path.contains(&branch)
    }

    pub fn last_branch(&self) -> Option<Branch> {
        self.decision_path.last().copied()
    }

    pub fn factor(&self, name: &str) -> Option<&Value> {
        self.factors.get(name)
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn branch_tags(&self) -> Vec<&'static str> {
        self.decision_path.iter().map(|branch| branch.tag()).collect()
    }
}
