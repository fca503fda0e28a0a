//! HTTP request handlers with OpenAPI documentation.

use std::collections::BTreeMap;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::error;
use utoipa::{IntoParams, OpenApi};

use crate::api::extract::{AppJson, AppQuery};
use crate::app::{AppState, ExportBody, ExportOutput};
use crate::domain::{
    AppError, DatabaseError, ErrorResponse, ExportDomain, ExportFormat, ExportReceipt,
    ExportRequest, FilterConstraint, HealthResponse, HealthStatus, Principal,
};

pub const RECORD_COUNT_HEADER: &str = "x-export-record-count";
pub const SKIPPED_COUNT_HEADER: &str = "x-export-skipped-count";
pub const GENERATED_AT_HEADER: &str = "x-export-generated-at";

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trade Export Gateway API",
        version = "0.1.0",
        description = "Shared export pipeline for regulatory trade records: FX rates, customs declarations, quality certificates, and lot verifications as CSV, JSON, or PDF artifacts",
        license(
            name = "MIT"
        )
    ),
    paths(
        export_post_handler,
        export_get_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            ExportRequest,
            ExportReceipt,
            ExportDomain,
            ExportFormat,
            FilterConstraint,
            ErrorResponse,
            HealthResponse,
            HealthStatus,
        )
    ),
    tags(
        (name = "export", description = "Record export endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Query-string form of an export request; filters arrive as a JSON object
/// in a single parameter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ExportQuery {
    pub domain: ExportDomain,
    pub format: ExportFormat,
    /// URL-encoded JSON object of filter constraints
    pub filters: Option<String>,
    pub limit: Option<i64>,
}

impl ExportQuery {
    fn into_request(self) -> Result<ExportRequest, AppError> {
        let mut request = ExportRequest::new(self.domain, self.format);
        request.limit = self.limit;
        if let Some(raw) = self.filters {
            let filters: BTreeMap<String, FilterConstraint> = serde_json::from_str(&raw)
                .map_err(|e| {
                    AppError::invalid_field("filters", format!("Malformed filter JSON: {e}"))
                })?;
            request.filters = filters;
        }
        Ok(request)
    }
}

/// Export records as a downloadable artifact
///
/// Runs the full pipeline: authorization, validation, filter translation,
/// bounded retrieval, per-record mapping, and encoding. Records that fail
/// mapping are skipped and counted in `x-export-skipped-count`.
#[utoipa::path(
    post,
    path = "/export",
    tag = "export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Encoded artifact; metadata in x-export-* headers"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing identity headers", body = ErrorResponse),
        (status = 403, description = "Principal lacks the domain capability", body = ErrorResponse),
        (status = 413, description = "Result exceeds the export limit", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Record source unavailable", body = ErrorResponse)
    )
)]
pub async fn export_post_handler(
    State(state): State<AppState>,
    principal: Principal,
    AppJson(payload): AppJson<ExportRequest>,
) -> Result<Response, AppError> {
    let output = state.orchestrator.export(&payload, &principal).await?;
    export_response(output)
}

/// Export records via query parameters
///
/// Same pipeline as `POST /export`; filters are passed as a URL-encoded
/// JSON object in the `filters` parameter.
#[utoipa::path(
    get,
    path = "/export",
    tag = "export",
    params(ExportQuery),
    responses(
        (status = 200, description = "Encoded artifact; metadata in x-export-* headers"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing identity headers", body = ErrorResponse),
        (status = 403, description = "Principal lacks the domain capability", body = ErrorResponse),
        (status = 413, description = "Result exceeds the export limit", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
        (status = 503, description = "Record source unavailable", body = ErrorResponse)
    )
)]
pub async fn export_get_handler(
    State(state): State<AppState>,
    principal: Principal,
    AppQuery(query): AppQuery<ExportQuery>,
) -> Result<Response, AppError> {
    let request = query.into_request()?;
    let output = state.orchestrator.export(&request, &principal).await?;
    export_response(output)
}

fn export_response(output: ExportOutput) -> Result<Response, AppError> {
    let receipt = &output.receipt;
    let filename = format!(
        "{}-export-{}.{}",
        receipt.domain.as_str(),
        receipt.generated_at.format("%Y%m%dT%H%M%SZ"),
        receipt.format.file_extension()
    );

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, receipt.format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .header(RECORD_COUNT_HEADER, receipt.record_count.to_string())
        .header(SKIPPED_COUNT_HEADER, receipt.skipped_count.to_string())
        .header(
            GENERATED_AT_HEADER,
            receipt
                .generated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        );

    let body = match output.body {
        ExportBody::Buffered(bytes) => Body::from(bytes),
        ExportBody::Streamed(rx) => Body::from_stream(ReceiverStream::new(rx)),
    };

    builder
        .body(body)
        .map_err(|e| AppError::Internal(format!("failed to build export response: {e}")))
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let record_source = match state.record_source.health_check().await {
        Ok(()) => HealthStatus::Healthy,
        Err(_) => HealthStatus::Unhealthy,
    };
    Json(HealthResponse::new(record_source))
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    match state.record_source.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::ResultTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(DatabaseError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_)
            | AppError::Encoding(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Infrastructure failures keep their detail in the log only; the
        // caller-visible message must not carry query text or schema detail
        let message = if status.is_server_error() {
            error!(code = self.code(), detail = %self, "Server error");
            match &self {
                AppError::Unavailable(_) => "Record source is temporarily unavailable".to_string(),
                AppError::Database(_) => "A database error occurred".to_string(),
                AppError::Encoding(_) => "Export encoding failed".to_string(),
                AppError::Config(_) => "Service configuration error".to_string(),
                AppError::Internal(_) => "An internal error occurred".to_string(),
                other => other.to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            code: self.code().to_string(),
            message,
            field_path: self.field_path().map(String::from),
        });

        (status, body).into_response()
    }
}
