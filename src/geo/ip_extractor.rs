//! Visitor IP extraction from HTTP headers
//!
//! Headers are consulted in a fixed order and the first non-empty value
//! wins, falling back to the socket peer address:
//! - `CF-Connecting-IP` (CDN)
//! - `X-Real-IP`, `X-Client-IP`
//! - `X-Forwarded-For`, `X-Forwarded`, `Forwarded-For`, `Forwarded`
//!
//! Values are not validated beyond being non-empty. A spoofed header
//! only changes which country the visitor appears to come from.

use axum::http::HeaderMap;
use std::net::IpAddr;

const IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",
    "x-real-ip",
    "x-client-ip",
    "x-forwarded-for",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Resolve the visitor IP for a request.
///
/// Returns `None` when neither a header nor a peer address is available.
pub fn extract_visitor_ip(headers: &HeaderMap, remote_addr: Option<IpAddr>) -> Option<String> {
    IP_HEADERS
        .iter()
        .find_map(|name| header_ip(headers, name))
        .or_else(|| remote_addr.map(|ip| ip.to_string()))
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }

    let candidate = if value.to_ascii_lowercase().contains("for=") {
        forwarded_for(value)?
    } else {
        // List-valued headers carry the originating client first
        value.split(',').next()?.trim().to_string()
    };

    if candidate.is_empty() {
        None
    } else {
        Some(candidate)
    }
}

/// Pull the first `for=` node out of an RFC 7239 style header:
/// `Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43`
fn forwarded_for(value: &str) -> Option<String> {
    for element in value.split(',') {
        for param in element.split(';') {
            let param = param.trim();
            let Some((key, node)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("for") {
                continue;
            }

            // Remove quotes, IPv6 brackets and port
            let node = node.trim().trim_matches('"');
            let host = if let Some(rest) = node.strip_prefix('[') {
                rest.split(']').next().unwrap_or(rest)
            } else if node.matches(':').count() == 1 {
                node.split(':').next().unwrap_or(node)
            } else {
                node
            };

            if !host.is_empty() {
                return Some(host.to_string());
            }
        }
    }

    None
}
