use crate::models::GlobalSettings;
use crate::storage::trait_def::{decode_settings, encode_settings};
use crate::storage::{SettingsStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local settings record, serialized exactly like the database
/// backends so validation behaves the same
#[derive(Default)]
pub struct MemorySettingsStore {
    record: RwLock<Option<String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_settings(settings: &GlobalSettings) -> StorageResult<Self> {
        let store = Self::new();
        store.write_settings(settings).await?;
        Ok(store)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn read_settings(&self) -> StorageResult<Arc<GlobalSettings>> {
        let record = self.record.read().await.clone();
        decode_settings(record)
    }

    async fn write_settings(&self, settings: &GlobalSettings) -> StorageResult<()> {
        let value = encode_settings(settings)?;
        *self.record.write().await = Some(value);
        Ok(())
    }
}
