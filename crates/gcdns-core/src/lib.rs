// # gcdns-core
//
// Core library keeping one DNS `A` record in sync with the caller's public IP.
//
// ## Architecture Overview
//
// - **ZoneClient**: Trait over a remote DNS zone (list zones, list/create/delete records)
// - **IpSource**: Trait for discovering the current public IP
// - **Reconciler**: Decides and performs create/update/delete for one desired record
// - **PollLoop**: Timer, IP validation and change detection in front of the Reconciler
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic lives here, providers are thin call-throughs
// 2. **Zone is the source of truth**: Remote records are re-read on every reconciliation
// 3. **Explicit state**: The last accepted IP belongs to a PollLoop instance
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod error;
pub mod poll;
pub mod reconciler;
pub mod record;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use config::{IpSourceConfig, PollConfig, RecordConfig, UpdaterConfig, ZoneConfig};
pub use error::{Error, Result};
pub use poll::{CycleOutcome, PollEvent, PollLoop};
pub use reconciler::{Ensured, RecordState, Reconciler};
pub use record::DesiredRecord;
pub use traits::{IpSource, ZoneClient};
pub use zone::MemoryZoneClient;
