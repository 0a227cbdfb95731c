//! Poll loop
//!
//! The PollLoop is responsible for:
//! - Discovering the public IP via IpSource on a fixed interval
//! - Rejecting anything that is not an IPv4 dotted quad
//! - Skipping cycles whose IP equals the last accepted one
//! - Asking the Reconciler to update the record otherwise
//! - Remembering the IP only once the update went through
//!
//! ## Cycle
//!
//! ```text
//! ┌─────────────┐  raw text   ┌──────────┐  Ipv4Addr  ┌──────────────┐
//! │  IpSource   │────────────▶│ validate │───────────▶│ == last IP ? │── yes ──▶ skip
//! └─────────────┘             └──────────┘            └──────────────┘
//!                                  │ invalid                 │ no
//!                                  ▼                         ▼
//!                                 skip              ┌──────────────────┐
//!                                                   │ Reconciler       │
//!                                                   │ .update_record() │
//!                                                   └──────────────────┘
//!                                                            │
//!                                     ok: last IP = found    │   err: last IP kept
//! ```
//!
//! One cycle runs to completion before the next starts. The wait between
//! cycles is the only point where a shutdown request is observed; a cycle
//! already in flight is never interrupted by it.

use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::{PollConfig, RecordConfig};
use crate::error::{Error, Result, with_timeout};
use crate::reconciler::{Ensured, Reconciler};
use crate::record::DesiredRecord;
use crate::traits::{IpSource, RemoteRecord};

/// Events emitted by the PollLoop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Loop started
    Started { fqdn: String },

    /// A well-formed IP was discovered
    IpObserved { ip: Ipv4Addr },

    /// The IP source answered with something that is not an IPv4 address
    IpRejected { raw: String },

    /// The discovered IP equals the last accepted one; nothing to do
    IpUnchanged { ip: Ipv4Addr },

    /// IP discovery failed
    FetchFailed { error: String },

    /// Record update started
    UpdateStarted { fqdn: String, ip: Ipv4Addr },

    /// Record update succeeded
    UpdateSucceeded {
        fqdn: String,
        ip: Ipv4Addr,
        previous_ip: Option<Ipv4Addr>,
        at: DateTime<Utc>,
    },

    /// The reconciler refused the update (record missing or already matching)
    UpdateDeclined {
        fqdn: String,
        ip: Ipv4Addr,
        reason: String,
    },

    /// A missing record was recreated
    RecordRecovered { fqdn: String, ip: Ipv4Addr },

    /// Record update failed
    UpdateFailed {
        fqdn: String,
        ip: Ipv4Addr,
        error: String,
    },

    /// Loop stopped
    Stopped { reason: String },
}

/// Result of a single poll cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// The IP source failed or timed out
    FetchFailed(Error),
    /// The discovered IP was malformed
    InvalidIp(Error),
    /// The discovered IP equals the last accepted one
    Skipped(Ipv4Addr),
    /// The record was replaced
    Updated(RemoteRecord),
    /// The record was missing and has been recreated
    Recovered(RemoteRecord),
    /// The reconciler answered with `RecordUnchanged` or `RecordNotFound`
    Declined(Error),
    /// Any other failure during reconciliation
    Failed(Error),
}

impl CycleOutcome {
    /// Whether the operator should look at this cycle
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::FetchFailed(_) | CycleOutcome::Failed(_))
    }
}

/// Drives the reconciler on a timer
///
/// ## Lifecycle
///
/// 1. Create with [`PollLoop::new()`]
/// 2. Run with [`PollLoop::run()`], [`PollLoop::run_until()`] or a single
///    cycle with [`PollLoop::run_once()`]
///
/// ## State
///
/// The last accepted IP is an instance field, so several loops (one per
/// hostname, for example) can run side by side in one process. It starts
/// as unknown and is not persisted.
pub struct PollLoop {
    /// Public IP discovery
    ip_source: Box<dyn IpSource>,

    /// Record reconciliation against the zone
    reconciler: Reconciler,

    /// Managed record label
    hostname: String,

    /// Managed record ttl
    ttl: u32,

    /// Wait between cycles
    interval: Duration,

    /// Upper bound for IP discovery; the reconciler applies it per zone call
    call_timeout: Duration,

    /// Recreate the record when an update finds it missing
    create_missing: bool,

    /// Last IP successfully reconciled
    last_accepted: Option<Ipv4Addr>,

    /// When `last_accepted` was set
    last_accepted_at: Option<DateTime<Utc>>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<PollEvent>,
}

impl PollLoop {
    /// Create a new poll loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields poll events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        reconciler: Reconciler,
        record: &RecordConfig,
        poll: &PollConfig,
    ) -> Result<(Self, mpsc::Receiver<PollEvent>)> {
        record.validate()?;
        poll.validate()?;

        let (tx, rx) = mpsc::channel(poll.event_channel_capacity);

        let poll_loop = Self {
            ip_source,
            reconciler: reconciler.with_call_timeout(poll.call_timeout()),
            hostname: record.hostname.clone(),
            ttl: record.ttl,
            interval: poll.interval(),
            call_timeout: poll.call_timeout(),
            create_missing: poll.create_missing,
            last_accepted: None,
            last_accepted_at: None,
            event_tx: tx,
        };

        Ok((poll_loop, rx))
    }

    /// Last IP successfully reconciled, if any
    pub fn last_accepted(&self) -> Option<Ipv4Addr> {
        self.last_accepted
    }

    /// When the last accepted IP was reconciled
    pub fn last_accepted_at(&self) -> Option<DateTime<Utc>> {
        self.last_accepted_at
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Run until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await
    }

    /// Run until the receiver fires (or its sender is dropped)
    pub async fn run_with_shutdown(&mut self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// `shutdown` is only polled while waiting between cycles.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let fqdn = self.reconciler.format_name(&self.hostname);
        info!(
            "Polling public IP for {} every {:?} (timeout {:?})",
            fqdn, self.interval, self.call_timeout
        );
        self.emit_event(PollEvent::Started { fqdn });

        tokio::pin!(shutdown);

        loop {
            self.poll_once().await;

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(PollEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        Ok(())
    }

    /// Run exactly one cycle
    pub async fn run_once(&mut self) -> CycleOutcome {
        let outcome = self.poll_once().await;
        self.emit_event(PollEvent::Stopped {
            reason: "Single cycle completed".to_string(),
        });
        outcome
    }

    /// Run one poll cycle
    pub async fn poll_once(&mut self) -> CycleOutcome {
        let raw = match with_timeout(
            self.call_timeout,
            "public IP discovery",
            self.ip_source.fetch_public_ip(),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    "Failed to fetch public IP from {}: {}",
                    self.ip_source.source_name(),
                    e
                );
                self.emit_event(PollEvent::FetchFailed {
                    error: e.to_string(),
                });
                return CycleOutcome::FetchFailed(e);
            }
        };

        let found_ip = match parse_ipv4(&raw) {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Skipping cycle: {}", e);
                self.emit_event(PollEvent::IpRejected { raw });
                return CycleOutcome::InvalidIp(e);
            }
        };

        info!("Found IP: {}", found_ip);
        self.emit_event(PollEvent::IpObserved { ip: found_ip });

        if self.last_accepted == Some(found_ip) {
            debug!("IP {} unchanged since last update, skipping", found_ip);
            self.emit_event(PollEvent::IpUnchanged { ip: found_ip });
            return CycleOutcome::Skipped(found_ip);
        }

        let desired = match DesiredRecord::new(found_ip, self.hostname.as_str(), Some(self.ttl)) {
            Ok(desired) => desired,
            Err(e) => {
                error!("Cannot build desired record: {}", e);
                return CycleOutcome::Failed(e);
            }
        };
        let fqdn = self.reconciler.format_name(desired.hostname());

        self.emit_event(PollEvent::UpdateStarted {
            fqdn: fqdn.clone(),
            ip: found_ip,
        });

        let result = self.reconciler.update_record(&desired).await;

        match result {
            Ok(record) => {
                let previous_ip = self.accept(found_ip);
                info!(
                    "Updated {} -> {} (previous: {:?})",
                    fqdn, found_ip, previous_ip
                );
                self.emit_event(PollEvent::UpdateSucceeded {
                    fqdn,
                    ip: found_ip,
                    previous_ip,
                    at: Utc::now(),
                });
                CycleOutcome::Updated(record)
            }
            Err(Error::RecordNotFound(_)) if self.create_missing => {
                self.recover(&desired, fqdn).await
            }
            Err(e) if e.is_domain_signal() => {
                warn!("Not updated: {}", e);
                self.emit_event(PollEvent::UpdateDeclined {
                    fqdn,
                    ip: found_ip,
                    reason: e.to_string(),
                });
                CycleOutcome::Declined(e)
            }
            Err(e) => {
                error!("Failed to update {}: {}", fqdn, e);
                self.emit_event(PollEvent::UpdateFailed {
                    fqdn,
                    ip: found_ip,
                    error: e.to_string(),
                });
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Recreate a record that an update found missing
    async fn recover(&mut self, desired: &DesiredRecord, fqdn: String) -> CycleOutcome {
        let ip = desired.address();
        warn!("Record {} is missing, recreating it", fqdn);

        let result = self.reconciler.ensure_record(desired).await;

        match result {
            Ok(Ensured::Created(record)) | Ok(Ensured::Updated(record)) => {
                self.accept(ip);
                self.emit_event(PollEvent::RecordRecovered { fqdn, ip });
                CycleOutcome::Recovered(record)
            }
            Ok(Ensured::Unchanged(record)) => {
                // Another writer restored it between our two lookups.
                self.accept(ip);
                CycleOutcome::Updated(record)
            }
            Err(e) => {
                error!("Failed to recreate {}: {}", fqdn, e);
                self.emit_event(PollEvent::UpdateFailed {
                    fqdn,
                    ip,
                    error: e.to_string(),
                });
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Record `ip` as reconciled, returning the previous value
    fn accept(&mut self, ip: Ipv4Addr) -> Option<Ipv4Addr> {
        self.last_accepted_at = Some(Utc::now());
        self.last_accepted.replace(ip)
    }

    /// Emit a poll event
    fn emit_event(&self, event: PollEvent) {
        // Never awaits: a full channel drops the event
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(event)) => {
                debug!("No event receiver, dropping {:?}", event);
            }
        }
    }
}

/// Parse a strict IPv4 dotted quad
///
/// Surrounding whitespace, octets above 255, leading zeros and IPv6
/// addresses are all rejected.
pub fn parse_ipv4(raw: &str) -> Result<Ipv4Addr> {
    raw.parse::<Ipv4Addr>().map_err(|_| Error::invalid_ip(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(parse_ipv4("1.1.1.1").unwrap(), Ipv4Addr::new(1, 1, 1, 1));
        assert_eq!(
            parse_ipv4("203.0.113.254").unwrap(),
            Ipv4Addr::new(203, 0, 113, 254)
        );

        for raw in [
            "",
            "999.999.999.999",
            "1.1.1",
            "1.1.1.1.1",
            " 1.1.1.1",
            "::1",
            "01.1.1.1",
            "<html>",
        ] {
            assert!(
                matches!(parse_ipv4(raw), Err(Error::InvalidIpFormat(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_cycle_outcome_failure() {
        assert!(CycleOutcome::Failed(Error::transport("reset")).is_failure());
        assert!(CycleOutcome::FetchFailed(Error::transport("reset")).is_failure());
        assert!(!CycleOutcome::Skipped(Ipv4Addr::LOCALHOST).is_failure());
        assert!(!CycleOutcome::Declined(Error::record_unchanged("a.")).is_failure());
    }

    struct FixedIp;

    #[async_trait::async_trait]
    impl IpSource for FixedIp {
        async fn fetch_public_ip(&self) -> Result<String> {
            Ok("192.0.2.1".to_string())
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    async fn small_loop(capacity: usize) -> (PollLoop, mpsc::Receiver<PollEvent>) {
        let zone = crate::traits::Zone::new("example", "example.com.");
        let client = crate::zone::MemoryZoneClient::with_zone(zone);
        let reconciler = Reconciler::connect("example.com.", Box::new(client))
            .await
            .unwrap();
        let poll = PollConfig {
            event_channel_capacity: capacity,
            ..PollConfig::default()
        };

        PollLoop::new(Box::new(FixedIp), reconciler, &RecordConfig::new("home"), &poll).unwrap()
    }

    #[derive(Clone)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reconciler_inherits_call_timeout() {
        let (poll_loop, _rx) = small_loop(4).await;
        assert_eq!(
            poll_loop.reconciler().call_timeout(),
            Some(PollConfig::default().call_timeout())
        );
    }

    #[tokio::test]
    async fn test_closed_event_channel_is_not_reported_as_full() {
        let log = CapturedLog(Default::default());
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer({
                let log = log.clone();
                move || log.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (poll_loop, rx) = small_loop(1).await;
        let started = || PollEvent::Started {
            fqdn: "home.example.com.".to_string(),
        };

        poll_loop.emit_event(started());
        poll_loop.emit_event(started());
        drop(rx);
        poll_loop.emit_event(started());
        poll_loop.emit_event(started());

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("Event channel full").count(), 1, "{}", output);
        assert_eq!(output.matches("No event receiver").count(), 2, "{}", output);
    }
}
