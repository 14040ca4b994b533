use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{auth_middleware, AuthService, API_KEY_HEADER};
use crate::redirect::DebugLog;
use crate::storage::SettingsStore;

use super::handlers::{
    get_settings, health_check, put_settings, read_debug_log, reset_settings, AppState,
};

pub fn create_api_router(
    settings: Arc<dyn SettingsStore>,
    debug_log: Option<Arc<DebugLog>>,
    auth_service: Arc<AuthService>,
) -> Router {
    let state = Arc::new(AppState {
        settings,
        debug_log,
    });

    let protected_routes = Router::new()
        .route("/settings", get(get_settings).put(put_settings))
        .route("/settings/reset", post(reset_settings))
        .route("/debug-log", get(read_debug_log))
        .route_layer(middleware::from_fn(move |headers, req, next| {
            let auth = Arc::clone(&auth_service);
            auth_middleware(auth, headers, req, next)
        }))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]);

    let api = Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .layer(cors);

    Router::new().nest("/api", api)
}
