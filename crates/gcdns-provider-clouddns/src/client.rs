//! Cloud DNS v1 REST client
//!
//! Implements [`ZoneClient`] with one HTTP request per operation (plus one
//! per extra result page, plus a token refresh when the cached token is
//! stale). Retries, change detection and scheduling belong to the core.

use std::time::Duration;

use async_trait::async_trait;
use gcdns_core::config::ZoneConfig;
use gcdns_core::traits::{RecordData, RecordType, RemoteRecord, Zone, ZoneClient};
use gcdns_core::{Error, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credentials::{ServiceAccountKey, TokenProvider};

/// Cloud DNS API base URL
pub const CLOUD_DNS_API_BASE: &str = "https://dns.googleapis.com/dns/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "clouddns";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZonesPage {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZone {
    name: String,
    dns_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RrsetsPage {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
    next_page_token: Option<String>,
}

/// Wire form of a record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ResourceRecordSet {
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    #[serde(default)]
    ttl: u32,
    #[serde(default)]
    rrdatas: Vec<String>,
    #[serde(
        default,
        rename = "routingPolicy",
        skip_serializing_if = "Option::is_none"
    )]
    routing_policy: Option<serde_json::Value>,
}

impl ResourceRecordSet {
    fn from_remote(record: &RemoteRecord) -> Self {
        Self {
            name: record.name().to_string(),
            record_type: record.record_type().to_string(),
            ttl: record.ttl(),
            rrdatas: record.addresses().to_vec(),
            routing_policy: None,
        }
    }

    /// Geo, weighted and failover sets keep their targets in the policy
    fn is_policy_routed(&self) -> bool {
        self.rrdatas.is_empty() && self.routing_policy.is_some()
    }

    fn into_remote(self) -> Result<RemoteRecord> {
        let record_type = self
            .record_type
            .parse::<RecordType>()
            .unwrap_or_else(|never| match never {});
        RemoteRecord::new(self.name, record_type, self.ttl, self.rrdatas)
    }
}

/// Body of `POST managedZones/{zone}/changes`
#[derive(Debug, Default, Serialize)]
struct Change {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additions: Vec<ResourceRecordSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deletions: Vec<ResourceRecordSet>,
}

#[derive(Debug, Deserialize)]
struct ChangeResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Google Cloud DNS zone client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (zone listing, record listing)
/// - Log the intended change payload
/// - **NOT** actually modify DNS records
///
/// Creates answer with the record that would have been created.
///
/// # Security
///
/// The Debug implementation does NOT expose the private key or tokens.
#[derive(Debug)]
pub struct CloudDnsClient {
    /// Project owning the managed zones
    project_id: String,

    /// API root, without trailing slash
    api_base: String,

    /// Bearer tokens for the service account
    tokens: TokenProvider,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip changes
    dry_run: bool,
}

impl CloudDnsClient {
    /// Create a new Cloud DNS client
    ///
    /// # Parameters
    ///
    /// - `key`: service-account key with the Cloud DNS read/write scope
    /// - `project_id`: project owning the zone; defaults to the key's project
    /// - `dry_run`: If true, perform GET requests but skip changes
    pub fn new(key: ServiceAccountKey, project_id: Option<String>, dry_run: bool) -> Result<Self> {
        let project_id = project_id
            .or_else(|| key.project_id().map(str::to_string))
            .ok_or_else(|| {
                Error::config("No project ID configured and the service-account key names none")
            })?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloud DNS client running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            project_id,
            api_base: CLOUD_DNS_API_BASE.to_string(),
            tokens: TokenProvider::new(key, client.clone()),
            client,
            dry_run,
        })
    }

    /// Create from zone configuration, loading the key from `credentials_path`
    pub fn from_config(config: &ZoneConfig) -> Result<Self> {
        let key = ServiceAccountKey::from_file(&config.credentials_path)?;
        Self::new(key, config.project_id.clone(), config.dry_run)
    }

    /// Point the client at another API root (an emulator, for example)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn project_url(&self) -> String {
        format!("{}/projects/{}", self.api_base, self.project_id)
    }

    fn zone_url(&self, zone: &Zone) -> String {
        format!("{}/managedZones/{}", self.project_url(), zone.name)
    }

    /// GET a JSON document
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        page_token: Option<&str>,
        context: &str,
    ) -> Result<T> {
        let token = self.tokens.access_token().await?;

        let mut request = self.client.get(url).bearer_auth(token);
        if let Some(page_token) = page_token {
            request = request.query(&[("pageToken", page_token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let response = self.check_status(response, context).await?;

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }

    /// Submit a change set
    async fn submit(&self, zone: &Zone, change: &Change, context: &str) -> Result<()> {
        let url = format!("{}/changes", self.zone_url(zone));

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                serde_json::to_string(change)?
            );
            return Ok(());
        }

        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(change)
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let response = self.check_status(response, context).await?;

        let accepted: ChangeResponse = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        tracing::debug!(
            "Change {} accepted (status: {})",
            accepted.id.as_deref().unwrap_or("?"),
            accepted.status.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// Pass successful responses through and map the rest to errors
    async fn check_status(&self, response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        if status == StatusCode::UNAUTHORIZED {
            // The token may have been revoked; fetch a new one next time
            self.tokens.invalidate().await;
        }

        Err(map_status(status, &error_text, context))
    }
}

/// Map a non-success HTTP status to an error
fn map_status(status: StatusCode, error_text: &str, context: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid credentials or insufficient permissions. Status: {}",
            status
        ),
        404 => format!("{}: not found. Status: {}", context, status),
        409 => format!(
            "Conflict: {} clashes with the current zone contents. Status: {} - {}",
            context, status, error_text
        ),
        412 => format!(
            "Precondition failed: {} no longer matches the zone. Status: {}",
            context, status
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!(
            "Cloud DNS server error (transient): {} - {}",
            status, error_text
        ),
        _ => format!("{} failed: {} - {}", context, status, error_text),
    };

    Error::provider(PROVIDER, message)
}

#[async_trait]
impl ZoneClient for CloudDnsClient {
    /// List every managed zone of the project
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /projects/:project/managedZones[?pageToken=...]
    /// Authorization: Bearer <token>
    /// ```
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        let url = format!("{}/managedZones", self.project_url());
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ManagedZonesPage = self
                .get_json(&url, page_token.as_deref(), "Zone listing")
                .await?;

            zones.extend(
                page.managed_zones
                    .into_iter()
                    .map(|z| Zone::new(z.name, z.dns_name)),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        tracing::debug!("Project {} has {} managed zones", self.project_id, zones.len());
        Ok(zones)
    }

    /// List every record set of a zone
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /projects/:project/managedZones/:zone/rrsets[?pageToken=...]
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(&self, zone: &Zone) -> Result<Vec<RemoteRecord>> {
        let url = format!("{}/rrsets", self.zone_url(zone));
        let context = format!("Record listing of {}", zone.name);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: RrsetsPage = self.get_json(&url, page_token.as_deref(), &context).await?;

            for rrset in page.rrsets {
                if rrset.is_policy_routed() {
                    tracing::debug!(
                        "Skipping policy-routed {} {}",
                        rrset.name,
                        rrset.record_type
                    );
                    continue;
                }
                records.push(rrset.into_remote()?);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(records)
    }

    /// Add a record set
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /projects/:project/managedZones/:zone/changes
    /// { "additions": [ { "name", "type", "ttl", "rrdatas" } ] }
    /// ```
    async fn create_record(
        &self,
        fqdn: &str,
        zone: &Zone,
        record_type: RecordType,
        data: RecordData,
    ) -> Result<RemoteRecord> {
        let record = RemoteRecord::new(fqdn, record_type, data.ttl, data.addresses)?;

        tracing::info!(
            "{} {} {} (ttl {}) -> {:?}",
            if self.dry_run { "Would create" } else { "Creating" },
            record.record_type(),
            record.name(),
            record.ttl(),
            record.addresses()
        );

        let change = Change {
            additions: vec![ResourceRecordSet::from_remote(&record)],
            ..Change::default()
        };
        self.submit(zone, &change, &format!("Creation of {}", fqdn))
            .await?;

        Ok(record)
    }

    /// Remove a record set
    ///
    /// The deletion must repeat the record set exactly as listed; Cloud DNS
    /// refuses it otherwise.
    async fn delete_record(&self, zone: &Zone, record: &RemoteRecord) -> Result<()> {
        tracing::info!(
            "{} {} {} (ttl {}) -> {:?}",
            if self.dry_run { "Would delete" } else { "Deleting" },
            record.record_type(),
            record.name(),
            record.ttl(),
            record.addresses()
        );

        let change = Change {
            deletions: vec![ResourceRecordSet::from_remote(record)],
            ..Change::default()
        };
        self.submit(zone, &change, &format!("Deletion of {}", record.name()))
            .await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
