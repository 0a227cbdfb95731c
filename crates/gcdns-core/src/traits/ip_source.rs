// # IP Source Trait
//
// Defines the interface for discovering the caller's current public IP.
//
// ## Implementations
//
// - HTTP "what is my IP" service: `gcdns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use gcdns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let raw = source.fetch_public_ip().await?;
//     println!("public IP reported as {raw}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for public IP discovery
///
/// # Observers, not decision-makers
///
/// An IP source only reports what it sees. It must not:
/// - validate or normalize the address beyond trimming transport noise
///   (validation is owned by `PollLoop`)
/// - cache a previous answer (change detection is owned by `PollLoop`)
/// - retry, sleep or spawn tasks
///
/// Every call must be bounded by an explicit timeout.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IPv4 address as text
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the address exactly as reported, surrounding whitespace removed
    /// - `Err(Error::Transport)`: the service could not be reached or answered with an error
    async fn fetch_public_ip(&self) -> Result<String, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
