use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::redirect::RequestClassifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub site_server: ServerConfig,
    pub auth: AuthConfig,
    pub site: SiteConfig,
    pub redirect: RedirectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public base URL; the home URL for pattern normalization
    pub url: Url,
    /// Directory served behind the redirect. A placeholder page when unset.
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    pub geoip_db_path: Option<String>,
    pub debug_log_path: String,
    #[serde(skip_serializing)]
    pub visit_cookie_secret: Option<String>,
    pub settings_cache_ttl_secs: u64,
    /// `prefix=kind` pairs, see `RequestClassifier::parse`
    pub internal_path_prefixes: Option<String>,
}

impl RedirectConfig {
    const fn default_cache_ttl_secs() -> u64 {
        5
    }

    pub fn classifier(&self) -> anyhow::Result<RequestClassifier> {
        match &self.internal_path_prefixes {
            Some(spec) => RequestClassifier::parse(spec)
                .context("INTERNAL_PATH_PREFIXES must be a list of prefix=kind pairs"),
            None => Ok(RequestClassifier::default()),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./georedirect.db?mode=rwc".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let site_host = std::env::var("SITE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let site_port = std::env::var("SITE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let site_url = std::env::var("SITE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/", site_host, site_port));
        let site_url = Url::parse(&site_url).with_context(|| format!("invalid SITE_URL '{site_url}'"))?;

        let api_keys: Vec<String> = std::env::var("ADMIN_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let disable_auth = env_flag("DISABLE_AUTH");
        if !disable_auth && api_keys.is_empty() {
            tracing::warn!("ADMIN_API_KEYS is empty, the admin API accepts every request");
        }

        let settings_cache_ttl_secs = std::env::var("SETTINGS_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or_else(RedirectConfig::default_cache_ttl_secs);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            site_server: ServerConfig {
                host: site_host,
                port: site_port,
            },
            auth: AuthConfig {
                enabled: !disable_auth,
                api_keys,
            },
            site: SiteConfig {
                url: site_url,
                static_dir: env_non_empty("SITE_STATIC_DIR"),
            },
            redirect: RedirectConfig {
                geoip_db_path: env_non_empty("GEOIP_DB_PATH"),
                debug_log_path: std::env::var("DEBUG_LOG_PATH")
                    .unwrap_or_else(|_| "./georedirect-debug.log".to_string()),
                visit_cookie_secret: env_non_empty("VISIT_COOKIE_SECRET"),
                settings_cache_ttl_secs,
                internal_path_prefixes: env_non_empty("INTERNAL_PATH_PREFIXES"),
            },
        })
    }
}
