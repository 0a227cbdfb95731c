//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record how the core
//! drives its collaborators.

#![allow(dead_code)]

use gcdns_core::config::{PollConfig, RecordConfig};
use gcdns_core::error::{Error, Result};
use gcdns_core::traits::{IpSource, RecordData, RecordType, RemoteRecord, Zone, ZoneClient};
use gcdns_core::{MemoryZoneClient, Reconciler};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const ZONE_FQDN: &str = "example.com.";

/// One answer of a [`ScriptedIpSource`]
#[derive(Debug, Clone)]
pub enum Answer {
    /// Return this text
    Ip(&'static str),
    /// Fail with a transport error
    Unreachable,
    /// Never answer
    Hang,
}

/// An IpSource that plays back a fixed sequence of answers
///
/// Once the script is exhausted every call fails with a transport error.
#[derive(Clone)]
pub struct ScriptedIpSource {
    script: Arc<Mutex<VecDeque<Answer>>>,
    fetch_call_count: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(script: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            fetch_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Convenience constructor for a list of answers that are all addresses
    pub fn ips(ips: &[&'static str]) -> Self {
        Self::new(ips.iter().copied().map(Answer::Ip))
    }

    /// Get the number of times fetch_public_ip() was called
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedIpSource {
    async fn fetch_public_ip(&self) -> Result<String> {
        self.fetch_call_count.fetch_add(1, Ordering::SeqCst);
        let answer = self.script.lock().unwrap().pop_front();

        match answer {
            Some(Answer::Ip(ip)) => Ok(ip.to_string()),
            Some(Answer::Unreachable) => Err(Error::transport("connection refused")),
            Some(Answer::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(Error::transport("script exhausted")),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A ZoneClient over [`MemoryZoneClient`] that counts calls and can be told to fail
#[derive(Clone)]
pub struct CountingZoneClient {
    inner: MemoryZoneClient,
    list_zones_call_count: Arc<AtomicUsize>,
    zone_listing_failures: Arc<AtomicUsize>,
    list_records_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    delete_call_count: Arc<AtomicUsize>,
    fail_creates: Arc<AtomicBool>,
    hang_creates: Arc<AtomicBool>,
    fail_listing: Arc<AtomicBool>,
}

impl CountingZoneClient {
    pub fn new(inner: MemoryZoneClient) -> Self {
        Self {
            inner,
            list_zones_call_count: Arc::new(AtomicUsize::new(0)),
            zone_listing_failures: Arc::new(AtomicUsize::new(0)),
            list_records_call_count: Arc::new(AtomicUsize::new(0)),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            delete_call_count: Arc::new(AtomicUsize::new(0)),
            fail_creates: Arc::new(AtomicBool::new(false)),
            hang_creates: Arc::new(AtomicBool::new(false)),
            fail_listing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the number of times list_zones() was called
    pub fn list_zones_call_count(&self) -> usize {
        self.list_zones_call_count.load(Ordering::SeqCst)
    }

    /// Make the next `count` list_zones() calls fail with a transport error
    pub fn fail_zone_listings(&self, count: usize) {
        self.zone_listing_failures.store(count, Ordering::SeqCst);
    }

    /// Get the number of times list_records() was called
    pub fn list_records_call_count(&self) -> usize {
        self.list_records_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times create_record() was called
    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times delete_record() was called
    pub fn delete_call_count(&self) -> usize {
        self.delete_call_count.load(Ordering::SeqCst)
    }

    /// Number of mutating calls
    pub fn mutation_count(&self) -> usize {
        self.create_call_count() + self.delete_call_count()
    }

    /// Make create_record() fail with a transport error
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make create_record() never answer
    pub fn hang_creates(&self, hang: bool) {
        self.hang_creates.store(hang, Ordering::SeqCst);
    }

    /// Make list_records() fail with a transport error
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ZoneClient for CountingZoneClient {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.list_zones_call_count.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .zone_listing_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::transport("network unreachable"));
        }
        self.inner.list_zones().await
    }

    async fn list_records(&self, zone: &Zone) -> Result<Vec<RemoteRecord>> {
        self.list_records_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::transport("zone listing unavailable"));
        }
        self.inner.list_records(zone).await
    }

    async fn create_record(
        &self,
        fqdn: &str,
        zone: &Zone,
        record_type: RecordType,
        data: RecordData,
    ) -> Result<RemoteRecord> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Error::transport("create request reset"));
        }
        if self.hang_creates.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.create_record(fqdn, zone, record_type, data).await
    }

    async fn delete_record(&self, zone: &Zone, record: &RemoteRecord) -> Result<()> {
        self.delete_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_record(zone, record).await
    }

    fn provider_name(&self) -> &'static str {
        "counting"
    }
}

/// The zone every test works in
pub fn zone() -> Zone {
    Zone::new("example-com", ZONE_FQDN)
}

/// An `A` record as the memory zone would store it
pub fn a_record(name: &str, ip: &str, ttl: u32) -> RemoteRecord {
    RemoteRecord::new(name, RecordType::A, ttl, vec![ip.to_string()]).unwrap()
}

/// A memory zone holding [`zone()`] plus a counting wrapper sharing its records
pub fn counting_zone() -> (MemoryZoneClient, CountingZoneClient) {
    let memory = MemoryZoneClient::with_zone(zone());
    let counting = CountingZoneClient::new(memory.clone());
    (memory, counting)
}

/// Build a reconciler over [`zone()`]
pub async fn reconciler(client: impl ZoneClient + 'static) -> Reconciler {
    Reconciler::connect(ZONE_FQDN, Box::new(client))
        .await
        .expect("zone resolves")
}

/// Record configuration for `home.example.com.`
pub fn record_config(ttl: u32) -> RecordConfig {
    RecordConfig::new("home").with_ttl(ttl)
}

/// Poll configuration with a one-second call timeout
pub fn poll_config() -> PollConfig {
    PollConfig {
        interval_secs: 300,
        call_timeout_secs: 1,
        create_missing: false,
        event_channel_capacity: 100,
    }
}

pub const CALL_TIMEOUT: Duration = Duration::from_secs(1);
