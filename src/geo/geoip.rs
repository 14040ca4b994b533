//! Country lookup backed by a MaxMind GeoLite2/GeoIP2 MMDB
//!
//! Either a Country or a City database works: City is a superset and the
//! country fields are decoded from whichever record is present.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::sync::Arc;
use tracing::debug;

use super::{parse_public_ip, GeoLookup, GeoLookupError};

/// Memory-mapped country lookup service
#[derive(Clone)]
pub struct GeoIpService {
    reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Open the database at `path`. With `None` every lookup fails with
    /// [`GeoLookupError::DatabaseUnavailable`], which the engine treats as
    /// "serve the original page".
    pub fn new(path: Option<&str>) -> Result<Self> {
        let reader = if let Some(path) = path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self { reader })
    }

    pub fn is_loaded(&self) -> bool {
        self.reader.is_some()
    }
}

impl GeoLookup for GeoIpService {
    fn lookup(&self, ip: &str) -> Result<String, GeoLookupError> {
        let reader = self
            .reader
            .as_ref()
            .ok_or(GeoLookupError::DatabaseUnavailable)?;
        let addr = parse_public_ip(ip)?;

        let result = reader
            .lookup(addr)
            .map_err(|e| GeoLookupError::Database(e.to_string()))?;

        let country = result
            .decode::<geoip2::Country>()
            .map_err(|e| GeoLookupError::Database(e.to_string()))?
            .and_then(|record| record.country.iso_code.map(|s| s.to_ascii_uppercase()));

        match country {
            Some(code) => Ok(code),
            None => {
                debug!(ip = %addr, "GeoIP database has no country for address");
                Err(GeoLookupError::NotFound(addr))
            }
        }
    }
}
