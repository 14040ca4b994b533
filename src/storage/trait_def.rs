use crate::models::{GlobalSettings, SettingsError};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Key of the single settings record
pub const SETTINGS_KEY: &str = "geoip_redirect_options";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid settings: {0}")]
    Invalid(#[from] SettingsError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value store holding the redirect settings as one JSON record
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Current settings; defaults when nothing has been written yet
    async fn read_settings(&self) -> StorageResult<Arc<GlobalSettings>>;

    /// Validate and replace the settings record
    async fn write_settings(&self, settings: &GlobalSettings) -> StorageResult<()>;

    /// Restore default settings
    async fn reset_settings(&self) -> StorageResult<()> {
        self.write_settings(&GlobalSettings::default()).await
    }
}

/// Decode a stored record
pub(crate) fn decode_settings(value: Option<String>) -> StorageResult<Arc<GlobalSettings>> {
    match value {
        Some(json) => Ok(Arc::new(GlobalSettings::from_json(&json)?)),
        None => Ok(Arc::new(GlobalSettings::default())),
    }
}

/// Validate and encode a record for storage
pub(crate) fn encode_settings(settings: &GlobalSettings) -> StorageResult<String> {
    let mut normalized = settings.clone();
    normalized.normalize();
    normalized.validate()?;
    serde_json::to_string(&normalized).map_err(|e| StorageError::Invalid(e.into()))
}
