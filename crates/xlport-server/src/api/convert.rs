use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use xlport_core::SerializedModel;
use xlport_xlsx::{WorkerRequest, WorkerResponse, XLSX_MEDIA_TYPE};

use crate::error::AppError;
use crate::AppState;

/// Number of degradations met while exporting.
const WARNINGS_HEADER: HeaderName = HeaderName::from_static("x-xlport-warnings");

/// Raw worker protocol: one message in, one terminal message out.
async fn worker_message(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<WorkerResponse>, AppError> {
    let request = match serde_json::from_str::<WorkerRequest>(&body) {
        Ok(request) => request,
        Err(err) => {
            return Ok(Json(WorkerResponse::error(format_args!(
                "invalid request: {err}"
            ))))
        }
    };
    Ok(Json(state.worker.submit(request).await?))
}

/// Model JSON in, package bytes out
async fn export_workbook(
    State(state): State<AppState>,
    Json(model): Json<SerializedModel>,
) -> Result<Response, AppError> {
    match state.worker.submit(WorkerRequest::export(model)).await? {
        WorkerResponse::Complete {
            blob: Some(blob),
            warnings,
            ..
        } => {
            for warning in &warnings {
                tracing::debug!(%warning, "export degraded");
            }
            let headers = [
                (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_MEDIA_TYPE)),
                (
                    header::CONTENT_DISPOSITION,
                    HeaderValue::from_static("attachment; filename=\"workbook.xlsx\""),
                ),
                (WARNINGS_HEADER, HeaderValue::from(warnings.len())),
            ];
            Ok((headers, blob).into_response())
        }
        WorkerResponse::Error { data } => Err(AppError::Unprocessable(data)),
        other => Err(AppError::Internal(format!("unexpected export reply {other:?}"))),
    }
}

/// Package bytes in, model JSON out
async fn import_workbook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SerializedModel>, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty package".to_string()));
    }
    match state.worker.submit(WorkerRequest::import(body.to_vec())).await? {
        WorkerResponse::Complete {
            results: Some(model),
            ..
        } => Ok(Json(*model)),
        WorkerResponse::Error { data } => Err(AppError::Unprocessable(data)),
        other => Err(AppError::Internal(format!("unexpected import reply {other:?}"))),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/worker", post(worker_message))
        .route("/api/export", post(export_workbook))
        .route("/api/import", post(import_workbook))
}
