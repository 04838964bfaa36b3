//! Data model shared by the engine and its collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record type managed by the engine
///
/// Only A records are reconciled. The type is still carried explicitly so
/// that record-store implementations never have to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported sighting of a managed device
///
/// The timestamp is kept as the raw string reported by the directory. It is
/// parsed during deduplication so that one malformed entry is dropped on its
/// own instead of failing the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceObservation {
    /// Directory-assigned device identifier
    pub id: String,
    /// Device name as reported (any casing)
    pub name: String,
    /// RFC 3339 timestamp of the last update
    pub last_updated: String,
}

impl DeviceObservation {
    /// Create a new observation
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        last_updated: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_updated: last_updated.into(),
        }
    }

    /// Parse the reported timestamp
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.last_updated).map(|ts| ts.with_timezone(&Utc))
    }
}

/// The freshest observation for a device name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalDevice {
    /// Identifier of the surviving observation
    pub id: String,
    /// Device name as reported by the surviving observation
    pub name: String,
    /// Parsed last-update timestamp
    pub last_updated: DateTime<Utc>,
    /// Resolved IPv4 address, `None` until (or unless) resolution succeeds
    pub address: Option<String>,
}

/// An existing DNS record as listed by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-assigned record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record content (an IPv4 literal for A records)
    pub content: String,
}

impl DnsRecord {
    /// Create a new record
    pub fn new(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Desired write for one record
///
/// Passed to [`DnsRecordStore`](crate::traits::DnsRecordStore) mutations so
/// that name, type and TTL are always reasserted alongside the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSpec {
    /// Fully-qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
}
