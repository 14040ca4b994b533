//! First-visit suppression markers
//!
//! A marker records that a visitor was already redirected away from a
//! given URL. Markers live client-side in a cookie named after the SHA-1
//! of the visited URL and expire after 24 hours. There is no server-side
//! state, so a visitor who clears cookies or switches device is
//! redirected again.

use axum::http::HeaderMap;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Lifetime of a visit marker
pub const VISIT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Hex SHA-1 of a URL, used as the marker key
pub fn url_hash(url: &str) -> String {
    sha1_smol::Sha1::from(url).digest().to_string()
}

pub trait VisitTracker {
    fn has_visited(&self, url_hash: &str) -> bool;
    fn mark_visited(&mut self, url_hash: &str);
}

/// Signs and verifies marker cookie values
#[derive(Clone)]
pub struct VisitSigner {
    key: Arc<Vec<u8>>,
    ttl: Duration,
}

impl VisitSigner {
    /// With no secret a random key is generated, so markers do not
    /// survive a restart
    pub fn new(secret: Option<&str>) -> Self {
        let key = match secret {
            Some(s) if !s.is_empty() => s.as_bytes().to_vec(),
            _ => {
                warn!("No visit cookie secret configured, using a random per-process key");
                rand::random::<[u8; 32]>().to_vec()
            }
        };

        Self {
            key: Arc::new(key),
            ttl: VISIT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn mac(&self, name: &str, issued_at: i64) -> Option<Hmac<Sha256>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).ok()?;
        mac.update(name.as_bytes());
        mac.update(b".");
        mac.update(issued_at.to_string().as_bytes());
        Some(mac)
    }

    /// Cookie value for marker `name`: `<issued_at>.<signature>`
    pub fn sign(&self, name: &str, issued_at: i64) -> Option<String> {
        let signature = self.mac(name, issued_at)?.finalize().into_bytes();
        Some(format!(
            "{}.{}",
            issued_at,
            BASE64_URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// True when `value` carries a valid signature for `name` and has
    /// not expired at `now`
    pub fn verify(&self, name: &str, value: &str, now: i64) -> bool {
        let Some((issued_at, signature_b64)) = value.split_once('.') else {
            return false;
        };
        let Ok(issued_at) = issued_at.parse::<i64>() else {
            return false;
        };
        let Ok(provided) = BASE64_URL_SAFE_NO_PAD.decode(signature_b64) else {
            return false;
        };
        let Some(mac) = self.mac(name, issued_at) else {
            return false;
        };

        let expected = mac.finalize().into_bytes();
        if !bool::from(expected.as_slice().ct_eq(&provided)) {
            return false;
        }

        issued_at <= now && now - issued_at < self.ttl.as_secs() as i64
    }

    /// Tracker for one request, seeded from its `Cookie` headers
    pub fn tracker(&self, headers: &HeaderMap) -> CookieVisitTracker {
        CookieVisitTracker {
            signer: self.clone(),
            cookies: parse_cookies(headers),
            pending: Vec::new(),
            now: Utc::now(),
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Cookie-backed tracker for a single request.
///
/// Markers set during evaluation are queued as `Set-Cookie` values for
/// the response.
pub struct CookieVisitTracker {
    signer: VisitSigner,
    cookies: HashMap<String, String>,
    pending: Vec<String>,
    now: DateTime<Utc>,
}

impl CookieVisitTracker {
    /// Evaluate as if the request arrived at `now`
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn set_cookie_headers(&self) -> &[String] {
        &self.pending
    }
}

impl VisitTracker for CookieVisitTracker {
    fn has_visited(&self, url_hash: &str) -> bool {
        self.cookies
            .get(url_hash)
            .map(|value| self.signer.verify(url_hash, value, self.now.timestamp()))
            .unwrap_or(false)
    }

    fn mark_visited(&mut self, url_hash: &str) {
        let issued_at = self.now.timestamp();
        let Some(value) = self.signer.sign(url_hash, issued_at) else {
            warn!(marker = %url_hash, "failed to sign visit marker");
            return;
        };

        self.pending.push(format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            url_hash,
            value,
            self.signer.ttl.as_secs()
        ));
        self.cookies.insert(url_hash.to_string(), value);
    }
}
