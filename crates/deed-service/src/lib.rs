#![deny(unsafe_code)]

pub mod config;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use deed_adapters::{
    ChatClassifierConfig, ChatCompletionClassifier, FixedConfidence, RandomClassifier,
    ScriptedClassifier, TimeoutClassifier, UniformConfidence,
};
use deed_core::{
    AuditStep, Branch, ClassifierError, ConfidenceSource, DeedAttributes, DeedEngine,
    EvaluationError, TextClassifier, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{
    ClassifierBackend, ClassifierConfig, ConfidenceMode, ServiceConfig,
};

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<DeedEngine>,
    pub confidence: Arc<dyn ConfidenceSource>,
}

impl ServiceState {
    pub fn new(engine: DeedEngine, confidence: Arc<dyn ConfidenceSource>) -> Self {
        Self {
            engine: Arc::new(engine),
            confidence,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let classifier = build_classifier(&config.classifier)?;
        let confidence: Arc<dyn ConfidenceSource> = match config.confidence.mode {
            ConfidenceMode::Uniform => Arc::new(UniformConfidence),
            ConfidenceMode::Fixed => Arc::new(FixedConfidence::new(config.confidence.value)),
        };
        Ok(Self::new(DeedEngine::new(classifier), confidence))
    }
}

/// Build the configured classifier, bounded by `timeout_ms` when it is non-zero.
pub fn build_classifier(config: &ClassifierConfig) -> Result<Arc<dyn TextClassifier>, ServiceError> {
    let classifier: Arc<dyn TextClassifier> = match config.backend {
        ClassifierBackend::Random => Arc::new(RandomClassifier),
        ClassifierBackend::Scripted => Arc::new(ScriptedClassifier::from_keys(
            config.default_answer,
            config
                .answers
                .iter()
                .map(|(key, answer)| (key.as_str(), *answer)),
        )?),
        ClassifierBackend::ChatCompletion => {
            Arc::new(ChatCompletionClassifier::new(ChatClassifierConfig {
                endpoint: config.endpoint.clone(),
                model: config.model.clone(),
                api_key: config.api_key.clone(),
                request_timeout_ms: chat_request_timeout(config.timeout_ms),
            })?)
        }
    };

    if config.timeout_ms == 0 {
        return Ok(classifier);
    }
    Ok(Arc::new(TimeoutClassifier::new(
        classifier,
        Duration::from_millis(config.timeout_ms),
    )))
}

// The HTTP client gets a little headroom so the outer timeout reports expiry first.
fn chat_request_timeout(timeout_ms: u64) -> u64 {
    if timeout_ms == 0 {
        ChatClassifierConfig::default().request_timeout_ms
    } else {
        timeout_ms.saturating_add(1_000)
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/analyze/sample", get(analyze_sample))
        .with_state(state)
}

/// Router plus request tracing, CORS, and the request timeout.
pub fn build_app(state: ServiceState, config: &ServiceConfig) -> Result<Router, ServiceError> {
    let mut app = build_router(state)
        .layer(cors_layer(&config.server.allowed_origins)?)
        .layer(TraceLayer::new_for_http());
    if let Some(timeout) = config.request_timeout() {
        app = app.layer(TimeoutLayer::new(timeout));
    }
    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServiceError> {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ServiceError::Config(format!("invalid CORS origin '{}'", origin)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// The fixed deed behind `GET /analyze/sample`.
pub fn sample_deed() -> DeedAttributes {
    DeedAttributes::new("booklet", SAMPLE_DEED_TEXT)
        .with_inquiry(Some("2025-07-20"), Some("2025-08-15"))
        .with_tashil_law(false)
        .with_inquiry_response_issue(false)
}

const SAMPLE_DEED_TEXT: &str = "This non-movable property deed number 1234 was executed on 1403/06/07.
The seller, Mr. Ahmad Ahmadi, transfers six donums of a piece of land with agricultural use covering 500 square meters located in ABC village to the buyer, Ms. Sara Saraei.
This transaction was executed based on Article 10 of the Civil Code and with all legal conditions. Both parties, by way of an obligatory extrajudicial instrument, waive all options including the option of fraud.
The buyer is obligated to pay the remaining amount of the purchase price within three months, otherwise the seller shall have the right to rescind the transaction.
This deed was executed based on inquiry response number 11-A dated 1403/05/10 from the Registration of Deeds and Property Office.";

/// Run one deed through the engine and shape the response.
pub async fn analyze_deed(
    state: &ServiceState,
    deed: DeedAttributes,
) -> Result<AnalyzeResponse, ApiError> {
    let summary = DeedSummary::from(&deed);
    info!(
        document_type = %summary.document_type,
        has_inquiry_history = summary.has_inquiry_history,
        uses_tashil_law = summary.uses_tashil_law,
        inquiry_response_has_issue = summary.inquiry_response_has_issue,
        text_length = summary.text_length,
        "deed analysis requested"
    );

    let evaluation = state.engine.evaluate(&deed).await.map_err(|err| {
        error!(step = err.step(), error = %err, "deed analysis failed");
        ApiError::Analysis(err)
    })?;

    let confidence = state.confidence.score(&evaluation);
    info!(
        trace_id = %evaluation.trace_id,
        verdict = evaluation.verdict.code(),
        confidence,
        "deed analysis completed"
    );

    let result = evaluation.message().to_string();
    Ok(AnalyzeResponse {
        result: result.clone(),
        verdict: evaluation.verdict,
        confidence,
        analysis_details: AnalysisDetails {
            trace_id: evaluation.trace_id,
            timestamp: evaluation.evaluated_at,
            deed_summary: summary,
            steps: evaluation.audit.steps,
            decision_path: evaluation.audit.decision_path,
            factors: evaluation.audit.factors,
            result,
            confidence,
        },
    })
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("classifier setup failed: {0}")]
    Classifier(#[from] ClassifierError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error("Analysis failed: {0}")]
    Analysis(#[from] EvaluationError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("Invalid request: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Http { status, .. } => *status,
            ApiError::Analysis(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeedSummary {
    pub document_type: String,
    pub has_inquiry_history: bool,
    pub uses_tashil_law: bool,
    pub inquiry_response_has_issue: bool,
    pub text_length: usize,
}

impl From<&DeedAttributes> for DeedSummary {
    fn from(deed: &DeedAttributes) -> Self {
        Self {
            document_type: deed.document_type.clone(),
            has_inquiry_history: deed.has_inquiry_history,
            uses_tashil_law: deed.uses_tashil_law,
            inquiry_response_has_issue: deed.inquiry_response_has_issue,
            text_length: deed.text_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisDetails {
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
    pub deed_summary: DeedSummary,
    pub steps: Vec<AuditStep>,
    pub decision_path: Vec<Branch>,
    pub factors: BTreeMap<String, Value>,
    pub result: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Operator-facing verdict message
    pub result: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub analysis_details: AnalysisDetails,
}

#[derive(Debug, Clone, Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Deed Analysis API is running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    timestamp: DateTime<Utc>,
    classifier: String,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "API is running normally",
        timestamp: Utc::now(),
        classifier: state.engine.classifier_name().to_string(),
    })
}

async fn analyze(
    State(state): State<ServiceState>,
    payload: Result<Json<DeedAttributes>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(deed) = payload?;
    Ok(Json(analyze_deed(&state, deed).await?))
}

async fn analyze_sample(
    State(state): State<ServiceState>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    Ok(Json(analyze_deed(&state, sample_deed()).await?))
}
