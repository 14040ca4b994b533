//! Integration tests for the settings stores
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests (needs DATABASE_URL)
//! - By default, both backends are tested

use georedirect::models::{GlobalSettings, RedirectRule, RedirectStatus};
use georedirect::storage::{
    CachedSettingsStore, PostgresSettingsStore, SettingsStore, SqliteSettingsStore, StorageError,
};
use std::sync::Arc;
use std::time::Duration;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage; one connection so the in-memory
/// database is shared
async fn create_sqlite_store() -> Arc<dyn SettingsStore> {
    let store = SqliteSettingsStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_store() -> Option<Arc<dyn SettingsStore>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let store = PostgresSettingsStore::new(&db_url, 5).await.ok()?;
    store.init().await.ok()?;
    Some(Arc::new(store))
}

fn sample_settings() -> GlobalSettings {
    GlobalSettings {
        redirect_enabled: true,
        skip_for_bots: true,
        first_visit_only: true,
        redirect_status_code: RedirectStatus::MovedPermanently,
        rules: vec![
            RedirectRule::new("/", "https://us.example.com/", ["US", "CA"]),
            RedirectRule::new("/shop/(.*)", "https://eu.example.com/shop/(.*)", ["US", "CA"])
                .not_from()
                .pass_query_string(true),
        ],
        ..GlobalSettings::default()
    }
}

async fn exercise_settings_lifecycle(store: Arc<dyn SettingsStore>) {
    // Nothing stored yet
    assert_eq!(*store.read_settings().await.unwrap(), GlobalSettings::default());

    let settings = sample_settings();
    store.write_settings(&settings).await.unwrap();
    assert_eq!(*store.read_settings().await.unwrap(), settings);

    // Overwrite keeps a single record
    let mut updated = settings.clone();
    updated.rules.truncate(1);
    updated.development_mode = true;
    store.write_settings(&updated).await.unwrap();
    assert_eq!(*store.read_settings().await.unwrap(), updated);

    // Invalid records are rejected and leave the stored one alone
    let mut invalid = updated.clone();
    invalid.rules.push(RedirectRule::new("/", "/x", ["Germany"]));
    assert!(matches!(
        store.write_settings(&invalid).await,
        Err(StorageError::Invalid(_))
    ));
    assert_eq!(*store.read_settings().await.unwrap(), updated);

    store.reset_settings().await.unwrap();
    assert_eq!(*store.read_settings().await.unwrap(), GlobalSettings::default());
}

#[tokio::test]
async fn test_settings_lifecycle_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    exercise_settings_lifecycle(create_sqlite_store().await).await;
}

#[tokio::test]
async fn test_settings_lifecycle_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(store) = create_postgres_store().await else {
        return;
    };
    store.reset_settings().await.unwrap();
    exercise_settings_lifecycle(store).await;
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let store = SqliteSettingsStore::new("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    store.write_settings(&sample_settings()).await.unwrap();
    store.init().await.unwrap();
    assert_eq!(*store.read_settings().await.unwrap(), sample_settings());
}

#[tokio::test]
async fn test_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("settings.db").display()
    );

    {
        let store = SqliteSettingsStore::new(&url, 2).await.unwrap();
        store.init().await.unwrap();
        store.write_settings(&sample_settings()).await.unwrap();
    }

    let reopened = SqliteSettingsStore::new(&url, 2).await.unwrap();
    reopened.init().await.unwrap();
    assert_eq!(*reopened.read_settings().await.unwrap(), sample_settings());
}

#[tokio::test]
async fn test_cached_store_over_sqlite() {
    let cached = CachedSettingsStore::new(create_sqlite_store().await, Duration::from_secs(60));

    assert!(!cached.read_settings().await.unwrap().redirect_enabled);
    cached.write_settings(&sample_settings()).await.unwrap();
    assert_eq!(*cached.read_settings().await.unwrap(), sample_settings());

    // Concurrent readers all see the same snapshot
    let cached = Arc::new(cached);
    let mut handles = Vec::new();
    for _ in 0..20 {
        let cached = Arc::clone(&cached);
        handles.push(tokio::spawn(async move {
            cached.read_settings().await.unwrap().rules.len()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 2);
    }
}
