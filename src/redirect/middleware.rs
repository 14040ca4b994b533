use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{
        header::{CACHE_CONTROL, LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use super::engine::RedirectEngine;
use super::request::{RedirectRequest, RequestClassifier};
use super::visits::VisitSigner;
use crate::auth::AuthService;
use crate::models::RedirectDecision;
use crate::storage::SettingsStore;

pub struct RedirectState {
    pub settings: Arc<dyn SettingsStore>,
    pub engine: RedirectEngine,
    pub visits: VisitSigner,
    pub classifier: RequestClassifier,
    pub auth: Arc<AuthService>,
    pub site_url: Url,
}

/// Run the redirect engine in front of the wrapped routes.
///
/// A `Redirected` decision ends the request here; every other outcome,
/// including settings or lookup failures, falls through to the site.
pub async fn geo_redirect(
    State(state): State<Arc<RedirectState>>,
    request: Request,
    next: Next,
) -> Response {
    let settings = match state.settings.read_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "failed to load redirect settings, serving original page");
            return next.run(request).await;
        }
    };

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let redirect_request = RedirectRequest::from_http(
        request.uri(),
        request.headers(),
        remote_addr,
        &state.site_url,
        &state.classifier,
        state.auth.is_admin(request.headers()),
    );

    let mut visits = state.visits.tracker(request.headers());
    let assessment = state
        .engine
        .assess(&redirect_request, &settings, &mut visits);
    state.engine.record(&settings, &assessment).await;

    if let RedirectDecision::Redirected {
        status,
        destination,
    } = &assessment.decision
    {
        match redirect_response(status.as_u16(), destination, visits.set_cookie_headers()) {
            Ok(response) => {
                info!(
                    status = status.as_u16(),
                    destination = %destination,
                    path = %redirect_request.path,
                    "geo redirect issued"
                );
                return response;
            }
            Err(e) => {
                warn!(destination = %destination, error = %e, "unusable redirect destination, serving original page");
            }
        }
    }

    next.run(request).await
}

fn redirect_response(
    status: u16,
    destination: &str,
    set_cookies: &[String],
) -> anyhow::Result<Response> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::from_u16(status)?;

    let headers = response.headers_mut();
    headers.insert(LOCATION, HeaderValue::from_str(destination)?);
    // Destinations depend on the visitor, shared caches must not keep them
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    for cookie in set_cookies {
        headers.append(SET_COOKIE, HeaderValue::from_str(cookie)?);
    }

    Ok(response)
}
