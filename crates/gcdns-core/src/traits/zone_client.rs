// # Zone Client Trait
//
// Defines the interface the reconciler needs from a remote authoritative zone.
//
// ## Implementations
//
// - Google Cloud DNS: `gcdns-provider-clouddns` crate
// - In-memory: `gcdns_core::zone::MemoryZoneClient` (tests, local runs)
//
// ## Usage
//
// ```rust,ignore
// use gcdns_core::traits::{RecordData, RecordType, ZoneClient};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* ZoneClient implementation */;
//
//     let zones = client.list_zones().await?;
//     let zone = &zones[0];
//
//     client.create_record(
//         "www.example.com.",
//         zone,
//         RecordType::A,
//         RecordData::new(300, vec!["192.0.2.1".to_string()]),
//     ).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Reference to a managed zone
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Zone {
    /// Provider identifier of the zone (e.g. the Cloud DNS managed zone name)
    pub name: String,
    /// Fully-qualified domain of the zone, with trailing dot
    pub domain: String,
}

impl Zone {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }
}

/// DNS record type as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// Any other type; ignored by the reconciler
    Other(String),
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Other(kind) => f.write_str(kind),
        }
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("A") {
            Ok(RecordType::A)
        } else {
            Ok(RecordType::Other(s.to_ascii_uppercase()))
        }
    }
}

/// Payload of a record mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordData {
    pub ttl: u32,
    pub addresses: Vec<String>,
}

impl RecordData {
    pub fn new(ttl: u32, addresses: Vec<String>) -> Self {
        Self { ttl, addresses }
    }
}

/// Read-only projection of a record currently held by the provider
///
/// Instances are validated on construction: the address list is never
/// empty, so [`RemoteRecord::first_address`] always has a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    name: String,
    record_type: RecordType,
    ttl: u32,
    addresses: Vec<String>,
}

impl RemoteRecord {
    /// Build a record from provider data
    ///
    /// # Errors
    ///
    /// `InvalidRecord` if the name or the address list is empty.
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        ttl: u32,
        addresses: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_record("record name is empty"));
        }
        if addresses.is_empty() {
            return Err(Error::invalid_record(format!(
                "{} {} has no data",
                name, record_type
            )));
        }

        Ok(Self {
            name,
            record_type,
            ttl,
            addresses,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// The address that counts for `A` semantics
    pub fn first_address(&self) -> &str {
        &self.addresses[0]
    }

    pub fn is_address_record(&self) -> bool {
        self.record_type == RecordType::A
    }
}

/// Trait for remote zone implementations
///
/// Implementations are thin call-throughs to a DNS provider API. All
/// decisions (whether a record must be created, replaced or left alone)
/// belong to the `Reconciler`.
///
/// # Rules for implementations
///
/// - No retry logic or backoff; return the error, the poll loop retries on
///   its next cycle
/// - No caching of record lists; the zone is the source of truth and every
///   call must reflect its current content
/// - Every remote call must be bounded by an explicit timeout
/// - Network failures map to `Error::Transport`, provider refusals to
///   `Error::Provider`
#[async_trait]
pub trait ZoneClient: Send + Sync {
    /// List every zone visible to the credentials
    async fn list_zones(&self) -> Result<Vec<Zone>>;

    /// List every record of a zone, of any type
    async fn list_records(&self, zone: &Zone) -> Result<Vec<RemoteRecord>>;

    /// Create a record
    ///
    /// # Parameters
    ///
    /// - `fqdn`: fully-qualified record name
    /// - `zone`: zone the record belongs to
    /// - `record_type`: record type to create
    /// - `data`: ttl and record data
    ///
    /// # Returns
    ///
    /// The record as stored by the provider
    async fn create_record(
        &self,
        fqdn: &str,
        zone: &Zone,
        record_type: RecordType,
        data: RecordData,
    ) -> Result<RemoteRecord>;

    /// Delete a record previously returned by [`ZoneClient::list_records`]
    async fn delete_record(&self, zone: &Zone, record: &RemoteRecord) -> Result<()>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_parse() {
        assert_eq!("A".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("a".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!(
            "aaaa".parse::<RecordType>().unwrap(),
            RecordType::Other("AAAA".to_string())
        );
        assert_eq!(RecordType::Other("MX".to_string()).to_string(), "MX");
    }

    #[test]
    fn test_remote_record_requires_data() {
        let result = RemoteRecord::new("www.example.com.", RecordType::A, 300, Vec::new());
        assert!(matches!(result, Err(Error::InvalidRecord(_))));

        let record = RemoteRecord::new(
            "www.example.com.",
            RecordType::A,
            300,
            vec!["192.0.2.1".to_string(), "192.0.2.2".to_string()],
        )
        .unwrap();
        assert_eq!(record.first_address(), "192.0.2.1");
        assert!(record.is_address_record());
    }
}
