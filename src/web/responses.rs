use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{RunReport, RunStatus};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub message: String,
    pub status: RunStatus,
    pub report: Option<RunReport>,
}

impl ScrapeResponse {
    pub fn finished(report: RunReport) -> Self {
        let status = report.status();
        let message = match status {
            RunStatus::Completed => "Scrape cycle completed".to_string(),
            _ => format!("Scrape cycle completed with failures: {}", failure_summary(&report)),
        };
        Self {
            message,
            status,
            report: Some(report),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: RunStatus::Failed,
            report: None,
        }
    }
}

fn failure_summary(report: &RunReport) -> String {
    let counters = [
        (report.failed_pages(), "page(s) skipped"),
        (report.workers_without_browser, "worker(s) without a browser"),
        (report.persistence_failures, "product(s) not saved"),
        (report.emails_failed, "email(s) not delivered"),
    ];
    let mut parts: Vec<String> = counters
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, what)| format!("{} {}", count, what))
        .collect();
    if report.cancelled {
        parts.push("cancelled".to_string());
    }
    parts.join(", ")
}

/// HTTP rendering of a triggered cycle. A cycle that ran, or failed while
/// running, answers with a [`ScrapeResponse`]; a trigger refused before it
/// started answers with an [`ApiError`].
pub fn cycle_response(
    result: Result<RunReport>,
) -> std::result::Result<(StatusCode, Json<ScrapeResponse>), ApiError> {
    match result {
        Ok(report) => Ok((StatusCode::OK, Json(ScrapeResponse::finished(report)))),
        Err(AppError::CycleInProgress) => Err(ApiError::from(AppError::CycleInProgress)),
        Err(e) => {
            tracing::error!("scrape cycle failed: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScrapeResponse::failed(format!("Scrape cycle failed: {}", e))),
            ))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Errors returned by the JSON endpoints.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) | ApiError::Conflict(msg) | ApiError::Internal(msg) => msg,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::CycleInProgress => ApiError::Conflict(err.to_string()),
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.error_code().to_string(),
            message: self.message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub cycle_running: bool,
}

impl HealthResponse {
    pub fn healthy(cycle_running: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cycle_running,
        }
    }
}
