use crate::audit::AuditTrail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only document type the engine distinguishes from every other value.
pub const BOOKLET_DOCUMENT_TYPE: &str = "booklet";

/// Deed attributes entering one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeedAttributes {
    pub document_type: String,
    pub has_inquiry_history: bool,
    /// Expected as `YYYY-MM-DD`; absent, empty, or malformed values are routed, not rejected.
    #[serde(default)]
    pub inquiry_date: Option<String>,
    #[serde(default)]
    pub deed_date: Option<String>,
    /// Facilitation ("tashil") law flag.
    pub uses_tashil_law: bool,
    /// Only consulted once the text is found to reference an inquiry response.
    pub inquiry_response_has_issue: bool,
    pub text: String,
}

impl DeedAttributes {
    pub fn new(document_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            has_inquiry_history: false,
            inquiry_date: None,
            deed_date: None,
            uses_tashil_law: false,
            inquiry_response_has_issue: false,
            text: text.into(),
        }
    }

    pub fn with_inquiry(
        mut self,
        inquiry_date: Option<&str>,
        deed_date: Option<&str>,
    ) -> Self {
        self.has_inquiry_history = true;
        self.inquiry_date = inquiry_date.map(str::to_string);
        self.deed_date = deed_date.map(str::to_string);
        self
    }

    pub fn with_tashil_law(mut self, uses_tashil_law: bool) -> Self {
        self.uses_tashil_law = uses_tashil_law;
        self
    }

    pub fn with_inquiry_response_issue(mut self, has_issue: bool) -> Self {
        self.inquiry_response_has_issue = has_issue;
        self
    }

    pub fn is_booklet(&self) -> bool {
        self.document_type == BOOKLET_DOCUMENT_TYPE
    }

    /// Length of the deed text in characters.
    pub fn text_length(&self) -> usize {
        self.text.chars().count()
    }
}

/// Terminal outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    NonBookletType,
    MissingJointLiabilities,
    ResidentialUseInferred,
    InquiryResponseIssue,
    ConditionalTransaction,
    Clean,
}

impl Verdict {
    pub const ALL: [Verdict; 6] = [
        Verdict::NonBookletType,
        Verdict::MissingJointLiabilities,
        Verdict::ResidentialUseInferred,
        Verdict::InquiryResponseIssue,
        Verdict::ConditionalTransaction,
        Verdict::Clean,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::NonBookletType => "non_booklet_type",
            Self::MissingJointLiabilities => "missing_joint_liabilities",
            Self::ResidentialUseInferred => "residential_use_inferred",
            Self::InquiryResponseIssue => "inquiry_response_issue",
            Self::ConditionalTransaction => "conditional_transaction",
            Self::Clean => "clean",
        }
    }

    /// Operator-facing message. The wording is shared with the inspection desk and must not change.
    pub fn message(self) -> &'static str {
        match self {
            Self::NonBookletType => "ارسال به کارتابل تخلف بازرسی (نوع سند غیر دفترچه‌ای)",
            Self::MissingJointLiabilities => {
                "ارسال به کارتابل تخلف بازرسی (عدم وجود تعهدات تضامنی قانون تسهیل)"
            }
            Self::ResidentialUseInferred => {
                "ارسال به کارتابل تخلف بازرسی (استنباط کاربری مسکونی از متن)"
            }
            Self::InquiryResponseIssue => "ارسال به کارتابل تخلف بازرسی (ایراد در پاسخ استعلام)",
            Self::ConditionalTransaction => "ارسال به کارتابل تخلف بازرسی (مشروط بودن معامله)",
            Self::Clean => "پایان (تخلفی شناسایی نشد)",
        }
    }

    pub fn is_violation(self) -> bool {
        !matches!(self, Self::Clean)
    }
}

/// Result of one evaluation: the verdict plus the audit trail that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub trace_id: String,
    pub verdict: Verdict,
    pub audit: AuditTrail,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn message(&self) -> &'static str {
        self.verdict.message()
    }
}
