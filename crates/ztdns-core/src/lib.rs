// # ztdns-core
//
// Core library for reconciling a zero-trust device inventory into DNS.
//
// ## Architecture Overview
//
// This library provides the reconciliation logic:
// - **DeviceDirectory**: Trait for listing the device inventory
// - **AddressLookup**: Trait for resolving a device's current address
// - **DnsRecordStore**: Trait for reading and writing A records
// - **deduplicate**: One canonical, freshest device per name
// - **RecordIndex**: Name-keyed snapshot of the zone's A records
// - **ReconciliationEngine**: Orchestrates one cycle and the periodic loop
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from API clients
// 2. **Stateless Cycles**: Every cycle reads fresh state; nothing persists
// 3. **Idempotency**: Records already holding the desired content are never written
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod model;
pub mod validate;
pub mod dedup;
pub mod index;
pub mod resolver;
pub mod report;
pub mod engine;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{AddressLookup, DeviceDirectory, DnsRecordStore};
pub use model::{CanonicalDevice, DeviceObservation, DnsRecord, RecordSpec, RecordType};
pub use dedup::deduplicate;
pub use index::RecordIndex;
pub use resolver::AddressResolver;
pub use report::{CycleReport, DeviceOutcome, Outcome, SkipReason, Summary};
pub use engine::{EngineEvent, ReconciliationEngine};
pub use config::{EngineConfig, SyncConfig};
pub use error::{Error, Result};
