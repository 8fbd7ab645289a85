//! Deed inspection core.
//!
//! This crate routes a property deed to a single inspection verdict by walking a fixed,
//! acyclic decision tree over structured deed fields and text-classifier answers. Every
//! fork taken is recorded in an [`AuditTrail`] returned alongside the verdict.

#![deny(unsafe_code)]

pub mod audit;
pub mod classifier;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod observer;
pub mod question;
pub mod timing;
pub mod types;

pub use audit::{AuditStep, AuditTrail, Branch};
pub use classifier::{AnswerSheet, TextClassifier};
pub use confidence::{clamp_confidence, ConfidenceSource, CONFIDENCE_CEILING, CONFIDENCE_FLOOR};
pub use engine::DeedEngine;
pub use error::{ClassifierError, EvaluationError};
pub use observer::{DecisionObserver, NoopObserver, TracingObserver};
pub use question::Question;
pub use timing::{InquiryTiming, INQUIRY_WINDOW_DAYS};
pub use types::{DeedAttributes, Evaluation, Verdict, BOOKLET_DOCUMENT_TYPE};
