// # gcdnsd - Cloud DNS updater daemon
//
// This is a thin integration layer: all reconciliation and polling logic
// lives in gcdns-core. The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Loading credentials and resolving the zone (network failures are
//    retried every poll interval; a missing zone exits with code 1)
// 4. Running the poll loop until SIGTERM/SIGINT (or for one cycle)
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Zone
// - `GCDNS_ZONE_FQDN`: Domain of the managed zone, with trailing dot (required)
// - `GCDNS_CREDENTIALS_PATH`: Service-account JSON key (default: config/google.json)
// - `GCDNS_PROJECT_ID`: Project owning the zone (default: the key's project)
//
// ### Record
// - `GCDNS_HOSTNAME`: Record label or FQDN with trailing dot (required)
// - `GCDNS_TTL`: Record TTL in seconds (default: 3600)
//
// ### Polling
// - `GCDNS_POLL_INTERVAL_SECS`: Seconds between cycles (default: 300)
// - `GCDNS_CALL_TIMEOUT_SECS`: Bound for IP discovery and each zone call (default: 30)
// - `GCDNS_IP_SOURCE_URL`: Plain-text IP service (default: https://api.ipify.org)
// - `GCDNS_CREATE_MISSING`: Recreate the record if it disappears (default: false)
//
// ### Daemon
// - `GCDNS_MODE`: live, dry-run or once (default: live)
// - `GCDNS_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export GCDNS_ZONE_FQDN=example.com.
// export GCDNS_HOSTNAME=home
// export GCDNS_CREDENTIALS_PATH=/etc/gcdns/google.json
//
// gcdnsd
// ```

use anyhow::{Context, Result};
use gcdns_core::{
    IpSourceConfig, PollConfig, PollEvent, PollLoop, Reconciler, RecordConfig, UpdaterConfig,
    ZoneClient, ZoneConfig,
};
use gcdns_ip_http::HttpIpSource;
use gcdns_provider_clouddns::CloudDnsClient;
use std::env;
use std::future::Future;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GcdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<GcdnsExitCode> for ExitCode {
    fn from(code: GcdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// How the daemon drives the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Poll until a shutdown signal
    Live,
    /// Poll until a shutdown signal, only logging zone changes
    DryRun,
    /// Run a single cycle and exit
    Once,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "dry-run" => Ok(Mode::DryRun),
            "once" => Ok(Mode::Once),
            _ => anyhow::bail!(
                "GCDNS_MODE '{}' is not valid. Valid modes: live, dry-run, once",
                s
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    zone_fqdn: String,
    credentials_path: String,
    project_id: Option<String>,
    hostname: String,
    ttl: Option<u32>,
    poll_interval_secs: Option<u64>,
    call_timeout_secs: Option<u64>,
    ip_source_url: Option<String>,
    create_missing: bool,
    mode: Mode,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} is required. Set it via: export {}=...", name, name))
        };

        Ok(Self {
            zone_fqdn: required("GCDNS_ZONE_FQDN")?,
            credentials_path: lookup("GCDNS_CREDENTIALS_PATH")
                .unwrap_or_else(|| "config/google.json".to_string()),
            project_id: lookup("GCDNS_PROJECT_ID").filter(|v| !v.is_empty()),
            hostname: required("GCDNS_HOSTNAME")?,
            ttl: parse_var(&lookup, "GCDNS_TTL")?,
            poll_interval_secs: parse_var(&lookup, "GCDNS_POLL_INTERVAL_SECS")?,
            call_timeout_secs: parse_var(&lookup, "GCDNS_CALL_TIMEOUT_SECS")?,
            ip_source_url: lookup("GCDNS_IP_SOURCE_URL").filter(|v| !v.is_empty()),
            create_missing: parse_var(&lookup, "GCDNS_CREATE_MISSING")?.unwrap_or(false),
            mode: lookup("GCDNS_MODE")
                .map(|m| m.parse::<Mode>())
                .transpose()?
                .unwrap_or(Mode::Live),
            log_level: lookup("GCDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build the core configuration, applying defaults for unset values
    fn updater_config(&self) -> UpdaterConfig {
        let mut record = RecordConfig::new(self.hostname.clone());
        if let Some(ttl) = self.ttl {
            record = record.with_ttl(ttl);
        }

        let mut poll = PollConfig::default();
        if let Some(interval) = self.poll_interval_secs {
            poll.interval_secs = interval;
        }
        if let Some(timeout) = self.call_timeout_secs {
            poll.call_timeout_secs = timeout;
        }
        poll.create_missing = self.create_missing;

        let mut ip_source = IpSourceConfig::default();
        if let Some(ref url) = self.ip_source_url {
            ip_source.url = url.clone();
        }

        UpdaterConfig {
            zone: ZoneConfig {
                fqdn: self.zone_fqdn.clone(),
                credentials_path: self.credentials_path.clone(),
                project_id: self.project_id.clone(),
                dry_run: self.mode == Mode::DryRun,
            },
            record,
            poll,
            ip_source,
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.updater_config().validate()?;

        if !std::path::Path::new(&self.credentials_path).is_file() {
            anyhow::bail!(
                "GCDNS_CREDENTIALS_PATH does not point to a file: {}",
                self.credentials_path
            );
        }

        if let Some(ref url) = self.ip_source_url
            && url.starts_with("http://")
        {
            eprintln!(
                "WARNING: GCDNS_IP_SOURCE_URL uses HTTP (not HTTPS). \
                      The answer could be tampered with in transit."
            );
        }

        // Validate log level
        parse_log_level(&self.log_level)?;

        Ok(())
    }
}

/// Parse an optional variable, failing on malformed values
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "GCDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return GcdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return GcdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GcdnsExitCode::ConfigError.into();
    }

    info!("Starting gcdnsd daemon ({:?} mode)", config.mode);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GcdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                GcdnsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<GcdnsExitCode> {
    let updater = config.updater_config();

    let client = match CloudDnsClient::from_config(&updater.zone) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to set up Cloud DNS client: {}", e);
            return Ok(GcdnsExitCode::ConfigError);
        }
    };
    info!(
        "Using project {} with key {}",
        client.project_id(),
        updater.zone.credentials_path
    );

    let shutdown = shutdown_signal()?;
    tokio::pin!(shutdown);

    // A one-shot run reports a network failure instead of waiting it out
    let zone_client: Box<dyn ZoneClient> = Box::new(client);
    let connected = if config.mode == Mode::Once {
        Reconciler::connect(&updater.zone.fqdn, zone_client)
            .await
            .map(Some)
    } else {
        Reconciler::connect_until(
            &updater.zone.fqdn,
            zone_client,
            updater.poll.interval(),
            async {
                let signal = shutdown.as_mut().await;
                info!("Received shutdown signal: {}", signal);
            },
        )
        .await
    };

    let reconciler = match connected {
        Ok(Some(reconciler)) => reconciler,
        Ok(None) => {
            info!("Shutting down daemon");
            return Ok(GcdnsExitCode::CleanShutdown);
        }
        Err(e) if e.is_fatal_at_startup() => {
            error!("Cannot manage zone {}: {}", updater.zone.fqdn, e);
            return Ok(GcdnsExitCode::ConfigError);
        }
        Err(e) => return Err(e).context("Zone lookup failed"),
    };

    let ip_source = HttpIpSource::from_config(&updater.ip_source)?;
    info!("Public IP source: {}", ip_source.url());

    let (mut poll_loop, events) = PollLoop::new(
        Box::new(ip_source),
        reconciler,
        &updater.record,
        &updater.poll,
    )?;
    tokio::spawn(log_events(events));

    if config.mode == Mode::Once {
        let outcome = poll_loop.run_once().await;
        return Ok(if outcome.is_failure() {
            GcdnsExitCode::RuntimeError
        } else {
            GcdnsExitCode::CleanShutdown
        });
    }

    poll_loop
        .run_until(async {
            let signal = shutdown.await;
            info!("Received shutdown signal: {}", signal);
        })
        .await?;

    info!("Shutting down daemon");
    Ok(GcdnsExitCode::CleanShutdown)
}

/// Keep the event channel drained
async fn log_events(mut events: mpsc::Receiver<PollEvent>) {
    while let Some(event) = events.recv().await {
        debug!("Poll event: {:?}", event);
    }
}

/// Install handlers for shutdown signals (SIGTERM, SIGINT)
///
/// The returned future resolves with the name of the first signal received.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install a handler for Ctrl-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
