use crate::audit::AuditStep;
use serde::{Deserialize, Serialize};

/// Yes/no questions put to the text classifier, one per text-analysis step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Question {
    JointLiabilities,
    ResidentialUse,
    InquiryReference,
    Conditionality,
}

impl Question {
    pub const ALL: [Question; 4] = [
        Question::JointLiabilities,
        Question::ResidentialUse,
        Question::InquiryReference,
        Question::Conditionality,
    ];

    /// Stable identifier; doubles as the audit factor name for the answer.
    pub fn key(self) -> &'static str {
        match self {
            Self::JointLiabilities => "joint_liabilities",
            Self::ResidentialUse => "residential_use",
            Self::InquiryReference => "inquiry_reference",
            Self::Conditionality => "conditionality",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::JointLiabilities => {
                "Does this text contain any clause regarding \"joint liabilities of the parties \
                 according to the facilitation law\" or similar phrases that refer to shared \
                 responsibility of buyer and seller?"
            }
            Self::ResidentialUse => {
                "Can you infer from the content that the property has \"residential use\" or \
                 consists of \"land and building\"? Pay attention to words like \"apartment\", \
                 \"house\", \"residential\", \"land\", \"building\", and similar terms."
            }
            Self::InquiryReference => {
                "Does the text mention obtaining inquiry from an official and acceptable \
                 authority (such as municipality, agricultural jihad, registration office)? Pay \
                 attention to phrases like \"based on inquiry response number...\" or \"with \
                 reference to the letter from the office...\"."
            }
            Self::Conditionality => {
                "Is the transfer of ownership or execution of the transaction conditional on \
                 future events? For example, does the text contain phrases like \"the buyer is \
                 obligated to do something in the future\" or \"the seller has conditioned \
                 that...\"."
            }
        }
    }

    pub fn from_prompt(prompt: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|question| question.prompt() == prompt)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|question| question.key() == key)
    }

    /// The audit step during which this question is asked.
    pub fn step(self) -> AuditStep {
        match self {
            Self::JointLiabilities => AuditStep::AnalyzeJointLiabilities,
            Self::ResidentialUse => AuditStep::AnalyzeResidentialUse,
            Self::InquiryReference => AuditStep::AnalyzeInquiryReference,
            Self::Conditionality => AuditStep::AnalyzeConditionality,
        }
    }
}
