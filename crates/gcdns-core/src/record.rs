//! Desired state of the managed address record

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// TTL applied when none is configured (seconds)
pub const DEFAULT_TTL: u32 = 3600;

/// The address record the caller wants the zone to contain
///
/// A new value is built for every reconciliation attempt; it is never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    address: Ipv4Addr,
    hostname: String,
    ttl: u32,
}

impl DesiredRecord {
    /// Create a desired record
    ///
    /// # Parameters
    ///
    /// - `address`: IPv4 address the record should point to
    /// - `hostname`: record label, either relative to the zone (`www`) or
    ///   fully qualified with a trailing dot (`www.example.com.`)
    /// - `ttl`: time-to-live in seconds, [`DEFAULT_TTL`] when `None`
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the hostname is empty or the ttl is zero.
    pub fn new(address: Ipv4Addr, hostname: impl Into<String>, ttl: Option<u32>) -> Result<Self> {
        let hostname = hostname.into();
        if hostname.is_empty() {
            return Err(Error::invalid_input("hostname cannot be empty"));
        }

        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        if ttl == 0 {
            return Err(Error::invalid_input("ttl must be a positive number of seconds"));
        }

        Ok(Self {
            address,
            hostname,
            ttl,
        })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl() {
        let record = DesiredRecord::new(Ipv4Addr::new(1, 1, 1, 1), "test", None).unwrap();
        assert_eq!(record.ttl(), DEFAULT_TTL);
        assert_eq!(record.hostname(), "test");
        assert_eq!(record.address(), Ipv4Addr::new(1, 1, 1, 1));
    }

    #[test]
    fn test_rejects_empty_hostname() {
        let result = DesiredRecord::new(Ipv4Addr::new(1, 1, 1, 1), "", Some(60));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let result = DesiredRecord::new(Ipv4Addr::new(1, 1, 1, 1), "test", Some(0));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
