// # DNS Record Store Trait
//
// Defines the interface for reading zone state and writing A records.
//
// ## Implementations
//
// - Cloudflare DNS: `ztdns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ztdns_core::DnsRecordStore;
// use ztdns_core::model::{RecordSpec, RecordType};
//
// let zone = store.zone_name("zone-id").await?;
// store.create_record("zone-id", &RecordSpec {
//     name: format!("laptop-01.{}", zone),
//     record_type: RecordType::A,
//     content: "100.96.0.12".to_string(),
//     ttl: 300,
// }).await?;
// ```

use crate::model::{DnsRecord, RecordSpec, RecordType};
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazy, possibly paginated sequence of DNS records
pub type RecordStream<'a> =
    Pin<Box<dyn Stream<Item = Result<DnsRecord, crate::Error>> + Send + 'a>>;

/// Trait for DNS record store implementations
///
/// # Trust Level: Untrusted
///
/// Record stores execute one API call per mutation and report the result.
/// They must not decide whether a write is needed (owned by
/// `ReconciliationEngine`) and must not retry. A failed mutation is surfaced
/// to the engine, which records it against that device only.
#[async_trait]
pub trait DnsRecordStore: Send + Sync {
    /// Resolve the zone's domain name (the hostname suffix)
    ///
    /// Failure aborts the cycle.
    async fn zone_name(&self, zone_id: &str) -> Result<String, crate::Error>;

    /// List all records of the given type in the zone, in provider order
    fn list_records<'a>(&'a self, zone_id: &'a str, record_type: RecordType) -> RecordStream<'a>;

    /// Create a record, returning the new record's identifier
    async fn create_record(&self, zone_id: &str, spec: &RecordSpec) -> Result<String, crate::Error>;

    /// Overwrite an existing record (name, type, content and TTL reasserted)
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        spec: &RecordSpec,
    ) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}
