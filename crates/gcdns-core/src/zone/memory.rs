// # Memory Zone Client
//
// In-memory implementation of ZoneClient.
//
// ## Purpose
//
// Provides a zone that lives entirely in process memory. It behaves like a
// provider that enforces one record set per (name, type): creating a
// duplicate is refused as a conflict and deleting an unknown record is an
// error.
//
// ## When to Use
//
// - Tests of the reconciler and poll loop
// - Local runs where no provider account is available
//
// Cloning the client shares the underlying zones, so a test can keep a
// handle for inspection after giving a boxed clone to a `Reconciler`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::traits::zone_client::{RecordData, RecordType, RemoteRecord, Zone, ZoneClient};

/// In-memory zone client implementation
///
/// Records are kept per zone name, in insertion order.
///
/// # Example
///
/// ```rust,no_run
/// use gcdns_core::traits::{RecordData, RecordType, Zone, ZoneClient};
/// use gcdns_core::zone::MemoryZoneClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MemoryZoneClient::with_zone(Zone::new("example", "example.com."));
///     let zone = client.list_zones().await?.remove(0);
///
///     client
///         .create_record(
///             "www.example.com.",
///             &zone,
///             RecordType::A,
///             RecordData::new(300, vec!["192.0.2.1".to_string()]),
///         )
///         .await?;
///
///     assert_eq!(client.list_records(&zone).await?.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryZoneClient {
    zones: Arc<RwLock<Vec<Zone>>>,
    records: Arc<RwLock<HashMap<String, Vec<RemoteRecord>>>>,
}

impl MemoryZoneClient {
    /// Create a client that knows no zones
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client holding a single empty zone
    pub fn with_zone(zone: Zone) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::from([(zone.name.clone(), Vec::new())]))),
            zones: Arc::new(RwLock::new(vec![zone])),
        }
    }

    /// Add an empty zone
    pub async fn add_zone(&self, zone: Zone) {
        self.records
            .write()
            .await
            .entry(zone.name.clone())
            .or_default();
        self.zones.write().await.push(zone);
    }

    /// Put a record into a zone directly, bypassing conflict checks
    pub async fn seed(&self, zone: &Zone, record: RemoteRecord) {
        self.records
            .write()
            .await
            .entry(zone.name.clone())
            .or_default()
            .push(record);
    }

    /// Snapshot of a zone's records
    pub async fn snapshot(&self, zone: &Zone) -> Vec<RemoteRecord> {
        self.records
            .read()
            .await
            .get(&zone.name)
            .cloned()
            .unwrap_or_default()
    }

    /// Get the number of records in a zone
    pub async fn len(&self, zone: &Zone) -> usize {
        self.snapshot(zone).await.len()
    }

    /// Check if a zone has no records
    pub async fn is_empty(&self, zone: &Zone) -> bool {
        self.len(zone).await == 0
    }
}

#[async_trait]
impl ZoneClient for MemoryZoneClient {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        Ok(self.zones.read().await.clone())
    }

    async fn list_records(&self, zone: &Zone) -> Result<Vec<RemoteRecord>> {
        let guard = self.records.read().await;
        guard
            .get(&zone.name)
            .cloned()
            .ok_or_else(|| Error::provider("memory", format!("unknown zone {}", zone.name)))
    }

    async fn create_record(
        &self,
        fqdn: &str,
        zone: &Zone,
        record_type: RecordType,
        data: RecordData,
    ) -> Result<RemoteRecord> {
        let record = RemoteRecord::new(fqdn, record_type, data.ttl, data.addresses)?;

        let mut guard = self.records.write().await;
        let records = guard
            .get_mut(&zone.name)
            .ok_or_else(|| Error::provider("memory", format!("unknown zone {}", zone.name)))?;

        if records
            .iter()
            .any(|r| r.name() == record.name() && r.record_type() == record.record_type())
        {
            return Err(Error::provider(
                "memory",
                format!("conflict: {} {} already exists", record.name(), record.record_type()),
            ));
        }

        records.push(record.clone());
        Ok(record)
    }

    async fn delete_record(&self, zone: &Zone, record: &RemoteRecord) -> Result<()> {
        let mut guard = self.records.write().await;
        let records = guard
            .get_mut(&zone.name)
            .ok_or_else(|| Error::provider("memory", format!("unknown zone {}", zone.name)))?;

        let position = records.iter().position(|r| r == record).ok_or_else(|| {
            Error::provider(
                "memory",
                format!("{} {} does not match any record", record.name(), record.record_type()),
            )
        })?;

        records.remove(position);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
