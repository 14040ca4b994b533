pub mod cached;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use cached::CachedSettingsStore;
pub use memory::MemorySettingsStore;
pub use postgres::PostgresSettingsStore;
pub use sqlite::SqliteSettingsStore;
pub use trait_def::{SettingsStore, StorageError, StorageResult, SETTINGS_KEY};

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::config::{DatabaseBackend, DatabaseConfig};

/// Connect the configured backend and make sure its table exists
pub async fn open_store(database: &DatabaseConfig) -> anyhow::Result<Arc<dyn SettingsStore>> {
    let store: Arc<dyn SettingsStore> = match database.backend {
        DatabaseBackend::Sqlite => {
            info!(url = %database.url, "using SQLite settings store");
            Arc::new(
                SqliteSettingsStore::new(&database.url, database.max_connections)
                    .await
                    .context("failed to open SQLite database")?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("using PostgreSQL settings store");
            Arc::new(
                PostgresSettingsStore::new(&database.url, database.max_connections)
                    .await
                    .context("failed to connect to PostgreSQL")?,
            )
        }
    };

    store.init().await.context("failed to initialize settings table")?;
    Ok(store)
}
