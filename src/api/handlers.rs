use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::GlobalSettings;
use crate::redirect::DebugLog;
use crate::storage::{SettingsStore, StorageError};

pub struct AppState {
    pub settings: Arc<dyn SettingsStore>,
    pub debug_log: Option<Arc<DebugLog>>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct DebugLogResponse {
    pub enabled: bool,
    pub content: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn storage_error(action: &str, e: StorageError) -> ApiError {
    let status = match &e {
        StorageError::Invalid(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %e, "failed to {}", action);
    }
    (
        status,
        Json(ErrorResponse {
            error: format!("Failed to {}: {}", action, e),
        }),
    )
}

/// Current settings, also the export format
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GlobalSettings>, ApiError> {
    state
        .settings
        .read_settings()
        .await
        .map(|settings| Json(GlobalSettings::clone(&settings)))
        .map_err(|e| storage_error("read settings", e))
}

/// Replace the settings record; rejected records leave the stored one untouched
pub async fn put_settings(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<GlobalSettings>,
) -> Result<Json<GlobalSettings>, ApiError> {
    payload.normalize();
    state
        .settings
        .write_settings(&payload)
        .await
        .map_err(|e| storage_error("save settings", e))?;

    info!(
        rules = payload.rules.len(),
        redirect_enabled = payload.redirect_enabled,
        "settings updated"
    );
    Ok(Json(payload))
}

pub async fn reset_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .settings
        .reset_settings()
        .await
        .map_err(|e| storage_error("reset settings", e))?;

    info!("settings reset to defaults");
    Ok(Json(SuccessResponse {
        message: "Settings reset to defaults".to_string(),
    }))
}

/// Contents of the debug log. Empty while debug logging is off.
pub async fn read_debug_log(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DebugLogResponse>, ApiError> {
    let settings = state
        .settings
        .read_settings()
        .await
        .map_err(|e| storage_error("read settings", e))?;

    let enabled = settings.debug_logging_enabled;
    let content = match (&state.debug_log, enabled) {
        (Some(log), true) => log.read().map_err(|e| {
            warn!(path = %log.path().display(), error = %e, "failed to read debug log");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to read debug log: {}", e),
                }),
            )
        })?,
        _ => String::new(),
    };

    Ok(Json(DebugLogResponse { enabled, content }))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
