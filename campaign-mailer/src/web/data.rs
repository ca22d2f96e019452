//! Data management endpoints: statistics, export/import, backups and wipe.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::handlers::MessageResponse;
use super::AppState;
use crate::store::{ExportDocument, ImportDocument, StorageStats};

pub async fn storage_stats(State(state): State<AppState>) -> Result<Json<StorageStats>, ApiError> {
    Ok(Json(state.store.storage_stats(crate::util::now()).await?))
}

pub async fn export_data(State(state): State<AppState>) -> Result<Json<ExportDocument>, ApiError> {
    Ok(Json(state.store.export_data().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub contacts: Option<usize>,
    pub email_records: Option<usize>,
    pub settings: bool,
}

/// Replace the sections present in the payload.
pub async fn import_data(
    State(state): State<AppState>,
    payload: Result<Json<ImportDocument>, JsonRejection>,
) -> Result<Json<MessageResponse<ImportSummary>>, ApiError> {
    let Json(doc) = payload?;
    if doc.contacts.is_none() && doc.email_records.is_none() && doc.settings.is_none() {
        return Err(ApiError::BadRequest("Nothing to import".to_string()));
    }
    let summary = ImportSummary {
        contacts: doc.contacts.as_ref().map(Vec::len),
        email_records: doc.email_records.as_ref().map(Vec::len),
        settings: doc.settings.is_some(),
    };
    state.store.import_data(doc).await?;
    Ok(MessageResponse::ok("Data imported successfully", summary))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub file: String,
}

pub async fn create_backup(State(state): State<AppState>) -> Result<Json<MessageResponse<BackupFile>>, ApiError> {
    let file = state.store.create_backup().await?;
    Ok(MessageResponse::ok(
        format!("Backup created: {file}"),
        BackupFile { file },
    ))
}

pub async fn restore_backup(
    State(state): State<AppState>,
    payload: Result<Json<BackupFile>, JsonRejection>,
) -> Result<Json<MessageResponse<BackupFile>>, ApiError> {
    let Json(req) = payload?;
    state.store.restore_backup(&req.file).await?;
    Ok(MessageResponse::ok(
        format!("Restored from {}", req.file),
        req,
    ))
}

pub async fn clear_data(State(state): State<AppState>) -> Result<Json<MessageResponse<()>>, ApiError> {
    state.store.clear_all().await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "All data cleared".to_string(),
        data: None,
    }))
}
