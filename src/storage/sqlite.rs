use crate::models::GlobalSettings;
use crate::storage::trait_def::{decode_settings, encode_settings, SETTINGS_KEY};
use crate::storage::{SettingsStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteSettingsStore {
    pool: Arc<SqlitePool>,
}

impl SqliteSettingsStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn read_settings(&self) -> StorageResult<Arc<GlobalSettings>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(self.pool.as_ref())
            .await?;

        decode_settings(value)
    }

    async fn write_settings(&self, settings: &GlobalSettings) -> StorageResult<()> {
        let value = encode_settings(settings)?;
        let updated_at = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(SETTINGS_KEY)
        .bind(value)
        .bind(updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
