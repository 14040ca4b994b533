use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use georedirect::api;
use georedirect::auth::AuthService;
use georedirect::config::Config;
use georedirect::geo::{GeoIpService, GeoLookup};
use georedirect::redirect::{self, DebugLog, RedirectEngine, RedirectState, VisitSigner};
use georedirect::storage::{self, CachedSettingsStore, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let backend = storage::open_store(&config.database).await?;
    let settings: Arc<dyn SettingsStore> = Arc::new(CachedSettingsStore::new(
        backend,
        Duration::from_secs(config.redirect.settings_cache_ttl_secs),
    ));
    info!("Settings store initialized");

    // GeoIP database
    let geoip = GeoIpService::new(config.redirect.geoip_db_path.as_deref())
        .context("failed to open GeoIP database")?;
    if !geoip.is_loaded() {
        warn!("GEOIP_DB_PATH not set, every country lookup will fail and no visitor is redirected");
    }
    let geo: Arc<dyn GeoLookup> = Arc::new(geoip);

    let debug_log = Arc::new(DebugLog::new(&config.redirect.debug_log_path));
    let engine = RedirectEngine::new(geo, &config.site.url).with_debug_log(Arc::clone(&debug_log));

    let auth_service = Arc::new(AuthService::new(
        config.auth.enabled,
        config.auth.api_keys.clone(),
    ));
    if !config.auth.enabled {
        info!("Authentication is disabled, all admin API requests are allowed");
    }

    let redirect_state = Arc::new(RedirectState {
        settings: Arc::clone(&settings),
        engine,
        visits: VisitSigner::new(config.redirect.visit_cookie_secret.as_deref()),
        classifier: config.redirect.classifier()?,
        auth: Arc::clone(&auth_service),
        site_url: config.site.url.clone(),
    });

    // Create routers
    let api_router = api::create_api_router(Arc::clone(&settings), Some(debug_log), auth_service);
    let site_router = redirect::create_site_router(redirect_state, config.site.static_dir.clone());

    match &config.site.static_dir {
        Some(dir) => info!("Serving site from directory: {}", dir),
        None => info!("SITE_STATIC_DIR not set, serving placeholder origin page"),
    }

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("Admin API listening on http://{}/api", api_addr);

    // Start site server
    let site_addr = format!("{}:{}", config.site_server.host, config.site_server.port);
    let site_listener = tokio::net::TcpListener::bind(&site_addr).await?;
    info!("Site listening on http://{} (public URL {})", site_addr, config.site.url);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(
            site_listener,
            site_router.into_make_service_with_connect_info::<SocketAddr>()
        ),
    )?;

    Ok(())
}
