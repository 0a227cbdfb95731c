// # Zone Client Implementations
//
// Provider-independent implementations of the ZoneClient trait. Real
// providers live in their own crates.

pub mod memory;

pub use memory::MemoryZoneClient;
