//! IP/CIDR access filter
//!
//! Pure whitelist evaluation against a caller address. Entries may be exact
//! IPs (v4/v6) or CIDR blocks. Matching is exact prefix containment; no
//! wildcards, no DNS resolution.

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WhitelistError {
    #[error("Invalid whitelist entry '{0}': not an IP address or CIDR block")]
    InvalidEntry(String),
}

/// A parsed whitelist entry: either an exact IP or a CIDR network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistEntry {
    Exact(IpAddr),
    Network(IpNet),
}

impl WhitelistEntry {
    /// Parse a single entry. CIDR notation is detected by the presence of '/'.
    pub fn parse(entry: &str) -> Result<Self, WhitelistError> {
        if entry.contains('/') {
            entry
                .parse::<IpNet>()
                .map(Self::Network)
                .map_err(|_| WhitelistError::InvalidEntry(entry.to_string()))
        } else {
            entry
                .parse::<IpAddr>()
                .map(Self::Exact)
                .map_err(|_| WhitelistError::InvalidEntry(entry.to_string()))
        }
    }

    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            Self::Exact(ip) => ip == addr,
            Self::Network(net) => net.contains(addr),
        }
    }
}

/// Validate a whitelist strictly. Malformed entries are a configuration error
/// surfaced at key create/update time.
pub fn validate_whitelist(entries: &[String]) -> Result<(), WhitelistError> {
    for entry in entries {
        WhitelistEntry::parse(entry)?;
    }
    Ok(())
}

/// Check whether a caller IP is allowed by a whitelist.
///
/// An empty whitelist allows any caller. Otherwise the caller must present a
/// parseable IP matching at least one well-formed entry; malformed entries
/// are skipped rather than failing the verification.
pub fn is_ip_allowed(whitelist: &[String], caller_ip: Option<&str>) -> bool {
    if whitelist.is_empty() {
        return true;
    }

    let addr: IpAddr = match caller_ip.and_then(|ip| ip.parse().ok()) {
        Some(addr) => addr,
        None => return false,
    };

    whitelist
        .iter()
        .filter_map(|entry| WhitelistEntry::parse(entry).ok())
        .any(|entry| entry.matches(&addr))
}
