use crate::models::GlobalSettings;
use crate::storage::trait_def::SETTINGS_KEY;
use crate::storage::{SettingsStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of a settings store.
///
/// Every site request reads the settings once; the cache keeps that off
/// the database. Writes through this wrapper refresh the cache at once;
/// writes made elsewhere (another process, the admin CLI) show up after
/// the TTL.
pub struct CachedSettingsStore {
    /// Underlying storage implementation
    inner: Arc<dyn SettingsStore>,
    /// Snapshot cache (Moka cache)
    read_cache: Cache<String, Arc<GlobalSettings>>,
}

impl CachedSettingsStore {
    pub fn new(inner: Arc<dyn SettingsStore>, ttl: Duration) -> Self {
        let read_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(ttl)
            .build();

        Self { inner, read_cache }
    }

    /// Drop the cached snapshot
    pub async fn invalidate(&self) {
        self.read_cache.invalidate(SETTINGS_KEY).await;
    }
}

#[async_trait]
impl SettingsStore for CachedSettingsStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn read_settings(&self) -> StorageResult<Arc<GlobalSettings>> {
        // Try to get from cache first
        if let Some(cached) = self.read_cache.get(SETTINGS_KEY).await {
            return Ok(cached);
        }

        // Cache miss - fetch from underlying storage
        let settings = self.inner.read_settings().await?;
        self.read_cache
            .insert(SETTINGS_KEY.to_string(), Arc::clone(&settings))
            .await;

        Ok(settings)
    }

    async fn write_settings(&self, settings: &GlobalSettings) -> StorageResult<()> {
        self.inner.write_settings(settings).await?;
        self.invalidate().await;
        Ok(())
    }

    async fn reset_settings(&self) -> StorageResult<()> {
        self.inner.reset_settings().await?;
        self.invalidate().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySettingsStore;

    #[tokio::test]
    async fn test_cache_serves_snapshot_until_invalidated() {
        let inner = Arc::new(MemorySettingsStore::new());
        let cached = CachedSettingsStore::new(inner.clone(), Duration::from_secs(300));

        assert!(!cached.read_settings().await.unwrap().redirect_enabled);

        // Write behind the cache's back
        let enabled = GlobalSettings {
            redirect_enabled: true,
            ..GlobalSettings::default()
        };
        inner.write_settings(&enabled).await.unwrap();
        assert!(!cached.read_settings().await.unwrap().redirect_enabled);

        cached.invalidate().await;
        assert!(cached.read_settings().await.unwrap().redirect_enabled);
    }

    #[tokio::test]
    async fn test_write_through_refreshes() {
        let cached = CachedSettingsStore::new(
            Arc::new(MemorySettingsStore::new()),
            Duration::from_secs(300),
        );
        assert!(!cached.read_settings().await.unwrap().first_visit_only);

        let settings = GlobalSettings {
            first_visit_only: true,
            ..GlobalSettings::default()
        };
        cached.write_settings(&settings).await.unwrap();
        assert!(cached.read_settings().await.unwrap().first_visit_only);

        cached.reset_settings().await.unwrap();
        assert!(!cached.read_settings().await.unwrap().first_visit_only);
    }
}
