//! Configuration types for the updater
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::record::DEFAULT_TTL;

/// Main updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Zone and provider access
    pub zone: ZoneConfig,

    /// The managed record
    pub record: RecordConfig,

    /// Poll loop settings
    #[serde(default)]
    pub poll: PollConfig,

    /// Public IP discovery
    #[serde(default)]
    pub ip_source: IpSourceConfig,
}

impl UpdaterConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.zone.validate()?;
        self.record.validate()?;
        self.poll.validate()?;
        self.ip_source.validate()?;
        Ok(())
    }
}

/// Zone configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Domain of the managed zone, with trailing dot (e.g. "example.com.")
    pub fqdn: String,

    /// Path to the service-account JSON key
    pub credentials_path: String,

    /// Project owning the zone (defaults to the key's project)
    #[serde(default)]
    pub project_id: Option<String>,

    /// Read the zone but only log mutations
    #[serde(default)]
    pub dry_run: bool,
}

impl ZoneConfig {
    /// Validate the zone configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.fqdn.is_empty() {
            return Err(crate::Error::config("Zone FQDN cannot be empty"));
        }
        if !self.fqdn.ends_with('.') {
            return Err(crate::Error::config(format!(
                "Zone FQDN must end with '.', got {:?} (did you mean {:?}?)",
                self.fqdn,
                format!("{}.", self.fqdn)
            )));
        }
        if self.credentials_path.is_empty() {
            return Err(crate::Error::config("Credentials path cannot be empty"));
        }
        if self.project_id.as_ref().is_some_and(|p| p.is_empty()) {
            return Err(crate::Error::config("Project ID cannot be empty when set"));
        }
        Ok(())
    }
}

/// Managed record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Record label, relative to the zone or fully qualified with trailing dot
    pub hostname: String,

    /// Time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl RecordConfig {
    /// Create a record configuration with the default ttl
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ttl: default_ttl(),
        }
    }

    /// Set the ttl
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.hostname.is_empty() {
            return Err(crate::Error::config("Record hostname cannot be empty"));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        Ok(())
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between the end of one cycle and the start of the next (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Upper bound for each remote phase of a cycle (in seconds)
    ///
    /// IP discovery and the reconciliation are bounded separately.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Recreate the record when an update finds it missing
    ///
    /// Off by default: a missing record is reported and retried on the
    /// next cycle without being created.
    #[serde(default)]
    pub create_missing: bool,

    /// Capacity of the poll event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollConfig {
    /// Validate the poll configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Call timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            create_missing: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Public IP discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceConfig {
    /// URL answering with the caller's IP as plain text
    #[serde(default = "default_ip_source_url")]
    pub url: String,

    /// Request timeout (in seconds)
    #[serde(default = "default_ip_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("IP source URL cannot be empty"));
        }
        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "IP source URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("IP source timeout must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        Self {
            url: default_ip_source_url(),
            timeout_secs: default_ip_source_timeout_secs(),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_interval_secs() -> u64 {
    300
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_ip_source_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_ip_source_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UpdaterConfig {
        UpdaterConfig {
            zone: ZoneConfig {
                fqdn: "example.com.".to_string(),
                credentials_path: "config/google.json".to_string(),
                project_id: None,
                dry_run: false,
            },
            record: RecordConfig::new("home"),
            poll: PollConfig::default(),
            ip_source: IpSourceConfig::default(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.record.ttl, 3600);
        assert_eq!(config.poll.interval(), Duration::from_secs(300));
        assert!(!config.poll.create_missing);
        assert_eq!(config.ip_source.url, "https://api.ipify.org");
    }

    #[test]
    fn test_zone_fqdn_needs_trailing_dot() {
        let mut config = sample();
        config.zone.fqdn = "example.com".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("example.com."));
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = sample();
        config.record.ttl = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.ip_source.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = serde_json::json!({
            "zone": { "fqdn": "example.com.", "credentials_path": "/etc/gcdns/key.json" },
            "record": { "hostname": "home", "ttl": 600 }
        });

        let config: UpdaterConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.record.ttl, 600);
        assert_eq!(config.poll.call_timeout_secs, 30);
        assert!(!config.zone.dry_run);
        assert!(config.validate().is_ok());
    }
}
