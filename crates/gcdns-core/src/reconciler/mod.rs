//! Record reconciler
//!
//! The Reconciler owns one zone and decides, for a desired address record,
//! which mutation (if any) brings the zone in line with it.
//!
//! ## State machine
//!
//! ```text
//!                 ┌──────────┐
//!                 │  ABSENT  │
//!                 └──────────┘
//!          create  │      ▲  delete
//!                  ▼      │
//!   ┌───────────────────┐   ┌────────────────────┐
//!   │ PRESENT_MATCHING  │◄──│ PRESENT_DIFFERENT  │
//!   └───────────────────┘   └────────────────────┘
//!                     update (delete, then create)
//! ```
//!
//! | operation | ABSENT | PRESENT_MATCHING | PRESENT_DIFFERENT |
//! |-----------|--------|------------------|-------------------|
//! | create    | create | `RecordAlreadyExists` | `RecordAlreadyExists` |
//! | delete    | `RecordNotFound` | delete | delete |
//! | update    | `RecordNotFound` | `RecordUnchanged` | delete + create |
//! | ensure    | create | no-op | delete + create |
//!
//! ## Two-phase update
//!
//! An update is a delete followed by a create. The two calls are not
//! atomic: if the create fails the record is left absent and the error is
//! reported as [`Error::PartialUpdate`]. [`Reconciler::ensure_record`] is the
//! recovery entry point for that state.
//!
//! With a call timeout set, each zone call is bounded on its own. A create
//! that times out after its delete went through is still a `PartialUpdate`.
//!
//! The zone is re-read on every call. Nothing about remote records is kept
//! between calls.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result, with_timeout};
use crate::record::DesiredRecord;
use crate::traits::{RecordData, RecordType, RemoteRecord, Zone, ZoneClient};

/// Observed state of the desired record in the zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// No address record under the desired name
    Absent,
    /// A record exists with the desired ttl and address
    Matching(RemoteRecord),
    /// A record exists but its ttl or address differs
    Different(RemoteRecord),
}

/// Outcome of [`Reconciler::ensure_record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured {
    /// The record was missing and has been created
    Created(RemoteRecord),
    /// The record differed and has been replaced
    Updated(RemoteRecord),
    /// The record already matched
    Unchanged(RemoteRecord),
}

/// Reconciles a single address record against one remote zone
pub struct Reconciler {
    client: Box<dyn ZoneClient>,
    zone: Zone,
    call_timeout: Option<Duration>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("provider", &self.client.provider_name())
            .field("zone", &self.zone)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl Reconciler {
    /// Resolve the zone and build a reconciler
    ///
    /// # Parameters
    ///
    /// - `zone_fqdn`: domain of the zone, compared exactly against what the
    ///   provider reports (e.g. `"example.com."`)
    /// - `client`: zone client implementation
    ///
    /// # Errors
    ///
    /// - `ZoneNotFound`: no zone has that domain. Not retried.
    /// - Any error from `list_zones`.
    pub async fn connect(zone_fqdn: &str, client: Box<dyn ZoneClient>) -> Result<Self> {
        let zone = resolve_zone(zone_fqdn, client.as_ref()).await?;
        Ok(Self::with_zone(client, zone))
    }

    /// Like [`Reconciler::connect`], retrying transient failures
    ///
    /// Transport, timeout and provider errors are retried every
    /// `retry_every` until the zone resolves or `shutdown` completes.
    /// `shutdown` is only polled while waiting between attempts.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(reconciler))`: the zone was found
    /// - `Ok(None)`: shutdown was requested first
    /// - `Err(Error)`: a non-transient failure such as `ZoneNotFound`
    pub async fn connect_until<F>(
        zone_fqdn: &str,
        client: Box<dyn ZoneClient>,
        retry_every: Duration,
        shutdown: F,
    ) -> Result<Option<Self>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match resolve_zone(zone_fqdn, client.as_ref()).await {
                Ok(zone) => return Ok(Some(Self::with_zone(client, zone))),
                Err(e) if e.is_transient() => {
                    warn!(
                        "Zone lookup for {} failed, retrying in {:?}: {}",
                        zone_fqdn, retry_every, e
                    );
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested before zone {} was resolved", zone_fqdn);
                    return Ok(None);
                }

                _ = tokio::time::sleep(retry_every) => {}
            }
        }
    }

    fn with_zone(client: Box<dyn ZoneClient>, zone: Zone) -> Self {
        Self {
            client,
            zone,
            call_timeout: None,
        }
    }

    /// Bound every zone call by `after`
    pub fn with_call_timeout(mut self, after: Duration) -> Self {
        self.call_timeout = Some(after);
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// The zone this reconciler manages
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Qualify a hostname with the zone's domain
    ///
    /// Names that already end in a dot are returned unchanged. An empty
    /// hostname names the zone apex.
    pub fn format_name(&self, hostname: &str) -> String {
        if hostname.is_empty() {
            return self.zone.domain.clone();
        }
        if hostname.ends_with('.') {
            return hostname.to_string();
        }
        format!("{}.{}", hostname, self.zone.domain)
    }

    /// Look up the address record with exactly this name
    ///
    /// Lists the whole zone on every call.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: first `A` record whose name equals `fqdn`
    /// - `Ok(None)`: no such record
    /// - `Err(Error)`: the zone could not be listed
    pub async fn lookup(&self, fqdn: &str) -> Result<Option<RemoteRecord>> {
        debug!("Retrieving record {}", fqdn);

        let found = self
            .bounded("record listing", self.client.list_records(&self.zone))
            .await?
            .into_iter()
            .filter(RemoteRecord::is_address_record)
            .find(|record| record.name() == fqdn);

        match &found {
            Some(record) => debug!("Found record {:?}", record),
            None => debug!("Record {} not found", fqdn),
        }
        Ok(found)
    }

    /// Like [`Reconciler::lookup`], with absence reported as `RecordNotFound`
    pub async fn find_record(&self, fqdn: &str) -> Result<RemoteRecord> {
        self.lookup(fqdn)
            .await?
            .ok_or_else(|| Error::record_not_found(fqdn))
    }

    /// Classify the zone's current record against the desired one
    pub async fn state_of(&self, desired: &DesiredRecord) -> Result<RecordState> {
        let fqdn = self.format_name(desired.hostname());
        Ok(match self.lookup(&fqdn).await? {
            None => RecordState::Absent,
            Some(record) if is_eligible_for_update(&record, desired) => {
                RecordState::Different(record)
            }
            Some(record) => RecordState::Matching(record),
        })
    }

    /// Create the record
    ///
    /// # Errors
    ///
    /// `RecordAlreadyExists` if an address record with the name exists; the
    /// zone is left untouched.
    pub async fn create_record(&self, desired: &DesiredRecord) -> Result<RemoteRecord> {
        let fqdn = self.format_name(desired.hostname());
        info!("Creating record {}", fqdn);

        if self.lookup(&fqdn).await?.is_some() {
            return Err(Error::record_already_exists(fqdn));
        }

        self.put(&fqdn, desired).await
    }

    /// Delete the record
    ///
    /// # Returns
    ///
    /// The record as it was before deletion
    ///
    /// # Errors
    ///
    /// `RecordNotFound` if there is nothing to delete; the zone is left untouched.
    pub async fn delete_record(&self, desired: &DesiredRecord) -> Result<RemoteRecord> {
        let fqdn = self.format_name(desired.hostname());
        info!("Deleting record {}", fqdn);

        let record = self.find_record(&fqdn).await?;
        self.bounded("record delete", self.client.delete_record(&self.zone, &record))
            .await?;
        Ok(record)
    }

    /// Replace an existing record whose ttl or address differs
    ///
    /// Never creates a record that does not exist yet.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound`: no record to update
    /// - `RecordUnchanged`: ttl and address already match
    /// - `PartialUpdate`: the old record was deleted but the new one could
    ///   not be created
    pub async fn update_record(&self, desired: &DesiredRecord) -> Result<RemoteRecord> {
        let fqdn = self.format_name(desired.hostname());
        info!("Updating record {}", fqdn);

        match self.state_of(desired).await? {
            RecordState::Absent => Err(Error::record_not_found(fqdn)),
            RecordState::Matching(_) => {
                info!("Not eligible for update: {} already matches", fqdn);
                Err(Error::record_unchanged(fqdn))
            }
            RecordState::Different(existing) => self.replace(&fqdn, &existing, desired).await,
        }
    }

    /// Bring the zone to the desired state whatever it currently holds
    ///
    /// This is the repair path for a record left absent by an interrupted
    /// update.
    pub async fn ensure_record(&self, desired: &DesiredRecord) -> Result<Ensured> {
        let fqdn = self.format_name(desired.hostname());

        match self.state_of(desired).await? {
            RecordState::Absent => {
                warn!("Record {} is missing, creating it", fqdn);
                self.put(&fqdn, desired).await.map(Ensured::Created)
            }
            RecordState::Matching(record) => Ok(Ensured::Unchanged(record)),
            RecordState::Different(existing) => self
                .replace(&fqdn, &existing, desired)
                .await
                .map(Ensured::Updated),
        }
    }

    async fn replace(
        &self,
        fqdn: &str,
        existing: &RemoteRecord,
        desired: &DesiredRecord,
    ) -> Result<RemoteRecord> {
        info!(
            "Performing update of {}: {} (ttl {}) -> {} (ttl {})",
            fqdn,
            existing.first_address(),
            existing.ttl(),
            desired.address(),
            desired.ttl()
        );

        self.bounded("record delete", self.client.delete_record(&self.zone, existing))
            .await?;

        self.put(fqdn, desired)
            .await
            .map_err(|source| Error::PartialUpdate {
                fqdn: fqdn.to_string(),
                source: Box::new(source),
            })
    }

    async fn put(&self, fqdn: &str, desired: &DesiredRecord) -> Result<RemoteRecord> {
        let data = RecordData::new(desired.ttl(), vec![desired.address().to_string()]);
        let record = self
            .bounded(
                "record create",
                self.client.create_record(fqdn, &self.zone, RecordType::A, data),
            )
            .await?;

        info!(
            "Record {} now points to {} (ttl {})",
            record.name(),
            record.first_address(),
            record.ttl()
        );
        Ok(record)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.call_timeout {
            Some(after) => with_timeout(after, operation, fut).await,
            None => fut.await,
        }
    }
}

async fn resolve_zone(zone_fqdn: &str, client: &dyn ZoneClient) -> Result<Zone> {
    info!(
        "Retrieving zone {} from {}",
        zone_fqdn,
        client.provider_name()
    );

    let zone = client
        .list_zones()
        .await?
        .into_iter()
        .find(|zone| zone.domain == zone_fqdn)
        .ok_or_else(|| Error::zone_not_found(zone_fqdn))?;

    info!("Found zone {} ({})", zone.domain, zone.name);
    Ok(zone)
}

/// Whether a stored record differs from the desired one in ttl or address
pub fn is_eligible_for_update(record: &RemoteRecord, desired: &DesiredRecord) -> bool {
    record.ttl() != desired.ttl() || record.first_address() != desired.address().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::MemoryZoneClient;
    use std::net::Ipv4Addr;

    async fn reconciler() -> Reconciler {
        let client = MemoryZoneClient::with_zone(Zone::new("example", "example.com."));
        Reconciler::connect("example.com.", Box::new(client))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_format_name() {
        let reconciler = reconciler().await;

        let permutations = [
            ("a", "a.example.com."),
            ("a.", "a."),
            ("a.b.c", "a.b.c.example.com."),
            ("a.b.c.", "a.b.c."),
            ("www", "www.example.com."),
            ("", "example.com."),
        ];

        for (hostname, expected) in permutations {
            assert_eq!(reconciler.format_name(hostname), expected, "{hostname}");
        }
    }

    #[tokio::test]
    async fn test_connect_unknown_zone() {
        let client = MemoryZoneClient::with_zone(Zone::new("example", "example.com."));
        let result = Reconciler::connect("example.com", Box::new(client)).await;
        assert!(matches!(result, Err(Error::ZoneNotFound(_))));
    }

    #[test]
    fn test_eligibility_compares_ttl_and_address() {
        let desired = DesiredRecord::new(Ipv4Addr::new(1, 1, 1, 1), "test", Some(600)).unwrap();
        let same = RemoteRecord::new("test.example.com.", RecordType::A, 600, vec!["1.1.1.1".into()])
            .unwrap();
        let other_ttl =
            RemoteRecord::new("test.example.com.", RecordType::A, 60, vec!["1.1.1.1".into()])
                .unwrap();
        let other_ip =
            RemoteRecord::new("test.example.com.", RecordType::A, 600, vec!["1.1.1.2".into()])
                .unwrap();

        assert!(!is_eligible_for_update(&same, &desired));
        assert!(is_eligible_for_update(&other_ttl, &desired));
        assert!(is_eligible_for_update(&other_ip, &desired));
    }
}
