use axum::{middleware, response::Html, Router};
use std::sync::Arc;
use tower_http::services::ServeDir;

use super::middleware::{geo_redirect, RedirectState};

/// Put the geo redirect in front of an existing site router
pub fn with_geo_redirect(router: Router, state: Arc<RedirectState>) -> Router {
    router.layer(middleware::from_fn_with_state(state, geo_redirect))
}

/// Site router: static files from `static_dir` when given, a placeholder
/// origin page otherwise
pub fn create_site_router(state: Arc<RedirectState>, static_dir: Option<String>) -> Router {
    let site = match static_dir {
        Some(dir) => Router::new().fallback_service(ServeDir::new(dir)),
        None => Router::new().fallback(origin_page),
    };

    with_geo_redirect(site, state)
}

async fn origin_page() -> Html<&'static str> {
    Html("<!doctype html><title>georedirect</title><p>Original page</p>")
}
