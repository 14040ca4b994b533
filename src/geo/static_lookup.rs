//! Fixed IP/CIDR → country table.
//!
//! Used for dry runs from the admin CLI and as a test double for the
//! MaxMind service.

use ipnet::IpNet;
use std::str::FromStr;

use super::{parse_public_ip, GeoLookup, GeoLookupError};

#[derive(Debug, Clone, Default)]
pub struct StaticGeoLookup {
    entries: Vec<(IpNet, String)>,
    fallback: Option<String>,
}

impl StaticGeoLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every public address to `country`
    pub fn always(country: &str) -> Self {
        Self {
            entries: Vec::new(),
            fallback: Some(country.to_ascii_uppercase()),
        }
    }

    /// Add a network; single addresses are accepted as /32 or /128
    pub fn with_network(mut self, network: &str, country: &str) -> anyhow::Result<Self> {
        let net = IpNet::from_str(network)
            .or_else(|_| network.parse::<std::net::IpAddr>().map(IpNet::from))
            .map_err(|_| anyhow::anyhow!("invalid network '{}'", network))?;
        self.entries.push((net, country.to_ascii_uppercase()));
        Ok(self)
    }
}

impl GeoLookup for StaticGeoLookup {
    fn lookup(&self, ip: &str) -> Result<String, GeoLookupError> {
        let addr = parse_public_ip(ip)?;

        self.entries
            .iter()
            .filter(|(net, _)| net.contains(&addr))
            .max_by_key(|(net, _)| net.prefix_len())
            .map(|(_, country)| country.clone())
            .or_else(|| self.fallback.clone())
            .ok_or(GeoLookupError::NotFound(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_specific_network_wins() {
        let lookup = StaticGeoLookup::new()
            .with_network("81.0.0.0/8", "DE")
            .unwrap()
            .with_network("81.2.69.0/24", "GB")
            .unwrap();

        assert_eq!(lookup.lookup("81.2.69.142").unwrap(), "GB");
        assert_eq!(lookup.lookup("81.9.9.9").unwrap(), "DE");
        assert!(matches!(
            lookup.lookup("8.8.8.8"),
            Err(GeoLookupError::NotFound(_))
        ));
    }

    #[test]
    fn test_always_still_rejects_reserved() {
        let lookup = StaticGeoLookup::always("us");
        assert_eq!(lookup.lookup("8.8.8.8").unwrap(), "US");
        assert!(matches!(
            lookup.lookup("192.168.0.10"),
            Err(GeoLookupError::Reserved(_))
        ));
    }
}
