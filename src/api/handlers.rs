//! API request handlers
//!
//! Handlers for all REST API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::server::AppState;
use crate::cleaner::{CleanReport, SheetCleaner};
use crate::excel::ExcelImporter;
use crate::loader::LoadReport;
use crate::types::CellValue;

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Which step failed: `upload`, `clean` or `load`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
            phase: None,
        }
    }

    pub fn err(phase: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
            phase: Some(phase.to_string()),
        }
    }
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(path: &str, method: &str, description: &str) -> Self {
        Self {
            path: path.to_string(),
            method: method.to_string(),
            description: description.to_string(),
        }
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(RootResponse {
        name: "Sheet ETL API Server".to_string(),
        version: state.version.clone(),
        description: "Upload a master sheet, preview the cleaned tables, load them into PostgreSQL"
            .to_string(),
        endpoints: vec![
            EndpointInfo::new("/health", "GET", "Health check endpoint"),
            EndpointInfo::new("/version", "GET", "Get server version"),
            EndpointInfo::new(
                "/api/v1/clean",
                "POST",
                "Clean an uploaded workbook (multipart: file, rows) and preview it",
            ),
            EndpointInfo::new(
                "/api/v1/load",
                "POST",
                "Clean an uploaded workbook and load it (multipart: file, confirm)",
            ),
        ],
    }))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec!["clean".to_string(), "load".to_string()],
    }))
}

/// Fields of a multipart upload
#[derive(Debug, Default)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub rows: Option<usize>,
    pub confirm: bool,
}

impl Upload {
    /// Read the `file`, `rows` and `confirm` fields; unknown fields are ignored
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, String> {
        let mut upload = Upload::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    upload.file_name = field.file_name().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| e.to_string())?;
                    upload.bytes = Some(bytes.to_vec());
                }
                Some("rows") => {
                    let text = field.text().await.map_err(|e| e.to_string())?;
                    upload.rows = text.trim().parse().ok();
                }
                Some("confirm") => {
                    let text = field.text().await.map_err(|e| e.to_string())?;
                    upload.confirm = parse_flag(&text);
                }
                _ => {}
            }
        }

        Ok(upload)
    }
}

/// Checkbox-style truthiness: `true`, `1`, `on`, `yes`
pub fn parse_flag(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

/// Preview of one cleaned sheet
#[derive(Serialize, Default, Debug)]
pub struct SheetPreview {
    pub sheet: String,
    pub rows: usize,
    pub columns: Vec<String>,
    /// First rows, row-major
    pub preview: Vec<Vec<CellValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
    pub unparsed_dates: usize,
}

/// Clean response
#[derive(Serialize, Default, Debug)]
pub struct CleanResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub sheets: Vec<SheetPreview>,
    pub warnings: Vec<String>,
    pub message: String,
}

impl CleanResponse {
    pub fn from_report(report: &CleanReport, file_name: Option<String>, preview_rows: usize) -> Self {
        let sheets = report
            .summaries
            .iter()
            .filter_map(|summary| {
                let table = report.workbook.get(&summary.sheet)?;
                let head = table.head(preview_rows);
                Some(SheetPreview {
                    sheet: summary.sheet.clone(),
                    rows: summary.rows,
                    columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                    preview: (0..head.row_count())
                        .filter_map(|idx| head.row(idx))
                        .map(|row| row.into_iter().cloned().collect())
                        .collect(),
                    date_column: summary.date_column.clone(),
                    unparsed_dates: summary.unparsed_dates,
                })
            })
            .collect();

        Self {
            file_name,
            sheets,
            warnings: report.warnings.iter().map(|w| w.to_string()).collect(),
            message: "File uploaded successfully".to_string(),
        }
    }
}

/// Load response
#[derive(Serialize, Debug)]
pub struct LoadResponse {
    pub clean: CleanResponse,
    pub load: LoadReport,
    pub message: String,
}

/// Status and JSON envelope, used for both success and failure
pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

/// Read the upload and clean it; failures are reported as a single clean-phase error
fn clean_upload<T: Serialize>(
    cleaner: &SheetCleaner,
    bytes: Option<Vec<u8>>,
) -> Result<CleanReport, Reply<T>> {
    let bytes = bytes.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err("upload", "multipart field 'file' is required")),
        )
    })?;

    let raw = ExcelImporter::import_bytes(bytes).map_err(|e| {
        warn!("Rejected upload: {}", e);
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::err("clean", e.to_string())),
        )
    })?;

    Ok(cleaner.clean(&raw))
}

/// POST /api/v1/clean - Clean an upload and return previews
pub async fn clean(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Reply<CleanResponse> {
    let upload = match Upload::from_multipart(multipart).await {
        Ok(upload) => upload,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::err("upload", e))),
    };

    let report = match clean_upload(&state.cleaner, upload.bytes) {
        Ok(report) => report,
        Err(reply) => return reply,
    };

    let rows = upload.rows.unwrap_or(state.preview_rows);
    (
        StatusCode::OK,
        Json(ApiResponse::ok(CleanResponse::from_report(
            &report,
            upload.file_name,
            rows,
        ))),
    )
}

/// POST /api/v1/load - Clean an upload and load it when `confirm` is set
pub async fn load(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Reply<LoadResponse> {
    let upload = match Upload::from_multipart(multipart).await {
        Ok(upload) => upload,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::err("upload", e))),
    };

    let report = match clean_upload(&state.cleaner, upload.bytes) {
        Ok(report) => report,
        Err(reply) => return reply,
    };

    match state.loader.load(&report.workbook, upload.confirm).await {
        Ok(outcome) => {
            let message = match &outcome {
                LoadReport::Skipped => {
                    "PostgreSQL upload is disabled. You can review the data above.".to_string()
                }
                LoadReport::Committed { rows, .. } => {
                    info!("Loaded {} rows", rows);
                    "Data successfully uploaded to PostgreSQL!".to_string()
                }
            };
            (
                StatusCode::OK,
                Json(ApiResponse::ok(LoadResponse {
                    clean: CleanResponse::from_report(&report, upload.file_name, state.preview_rows),
                    load: outcome,
                    message,
                })),
            )
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::err("load", e.to_string())),
        ),
    }
}
