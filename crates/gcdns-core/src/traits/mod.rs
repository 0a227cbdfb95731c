//! Collaborator traits
//!
//! This module defines the two external capabilities the core depends on.
//!
//! - [`ZoneClient`]: Read and mutate records of a remote DNS zone
//! - [`IpSource`]: Discover the caller's current public IP

pub mod ip_source;
pub mod zone_client;

pub use ip_source::IpSource;
pub use zone_client::{RecordData, RecordType, RemoteRecord, Zone, ZoneClient};
