// HTTP route handlers for the Judgebox API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use judgebox_core::{ExecutionOutcome, Language};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

const DEFAULT_LANGUAGE: &str = "cpp";
const NO_INPUT: &str = "No input provided";

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub output: String,
    pub language: String,
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BadRequestResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub message: String,
    pub status: String,
    pub supported_languages: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub available_slots: usize,
}

/// POST /run - Compile and run a submission synchronously
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed run request");
            return bad_request(rejection.body_text());
        }
    };

    let language = payload
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let code = match payload.code {
        Some(code) if !code.trim().is_empty() => code,
        _ => return bad_request("Code is required".to_string()),
    };
    let input = payload.input.unwrap_or_default();

    // Unknown names share one label so metric cardinality stays bounded
    let language_label = Language::from_alias(&language)
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unsupported".to_string());

    let in_flight = metrics::InFlight::enter();
    let start = Instant::now();
    let outcome = state.executor.execute(&language, &code, &input).await;
    drop(in_flight);
    metrics::observe(&language_label, outcome.label(), start.elapsed());

    match outcome {
        ExecutionOutcome::Success { output } => {
            info!(language = %language, output_size = output.len(), "Run succeeded");
            (
                StatusCode::OK,
                Json(RunResponse {
                    success: true,
                    output,
                    language,
                    input: if input.is_empty() { NO_INPUT.to_string() } else { input },
                }),
            )
                .into_response()
        }
        ExecutionOutcome::Failure { kind, message } => {
            error!(language = %language, kind = %kind, "Run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RunErrorResponse {
                    success: false,
                    error: message,
                }),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(BadRequestResponse {
            message,
            status: "error".to_string(),
        }),
    )
        .into_response()
}

/// GET / - Service banner with accepted language names
pub async fn service_info() -> impl IntoResponse {
    Json(ServiceInfo {
        message: "Multi-language Code Execution Server".to_string(),
        status: "success".to_string(),
        supported_languages: Language::all_aliases(),
    })
}

/// GET /status - Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            available_slots: state.executor.available_slots(),
        }),
    )
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
