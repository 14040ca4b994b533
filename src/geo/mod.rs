//! Visitor geolocation
//!
//! The redirect engine only needs one answer from this module: the ISO
//! country code of a visitor IP. Lookups are synchronous, in-process reads
//! and must fail with a structured [`GeoLookupError`] rather than panic.

pub mod geoip;
pub mod ip_extractor;
pub mod static_lookup;

use ipnet::IpNet;
use std::net::IpAddr;
use std::sync::OnceLock;
use thiserror::Error;

pub use geoip::GeoIpService;
pub use ip_extractor::extract_visitor_ip;
pub use static_lookup::StaticGeoLookup;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoLookupError {
    #[error("'{0}' is not an IP address")]
    InvalidAddress(String),
    #[error("{0} is in a private or reserved range")]
    Reserved(IpAddr),
    #[error("no country recorded for {0}")]
    NotFound(IpAddr),
    #[error("no GeoIP database loaded")]
    DatabaseUnavailable,
    #[error("GeoIP database error: {0}")]
    Database(String),
}

/// Resolves an IP address to an upper-case ISO-3166-1 alpha-2 code
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: &str) -> Result<String, GeoLookupError>;
}

/// Networks that never carry a meaningful country
const RESERVED_NETWORKS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "ff00::/8",
    "2001:db8::/32",
];

fn reserved_networks() -> &'static [IpNet] {
    static NETWORKS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETWORKS.get_or_init(|| {
        RESERVED_NETWORKS
            .iter()
            .filter_map(|net| net.parse().ok())
            .collect()
    })
}

/// Parse a visitor IP and reject private/reserved ranges.
///
/// Accepts a bare address or `ip:port` / `[ipv6]:port` forms as they
/// appear in forwarding headers.
pub fn parse_public_ip(raw: &str) -> Result<IpAddr, GeoLookupError> {
    let trimmed = raw.trim().trim_matches('"');
    let ip = trimmed
        .parse::<IpAddr>()
        .or_else(|_| trimmed.parse::<std::net::SocketAddr>().map(|s| s.ip()))
        .map_err(|_| GeoLookupError::InvalidAddress(raw.to_string()))?;

    if reserved_networks().iter().any(|net| net.contains(&ip)) {
        return Err(GeoLookupError::Reserved(ip));
    }

    Ok(ip)
}
