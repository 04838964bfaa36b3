//! Test doubles and common utilities for engine contract tests
//!
//! The doubles keep their state behind `Arc`s so a test can hand one copy
//! to the engine and keep another for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ztdns_core::config::EngineConfig;
use ztdns_core::error::{Error, Result};
use ztdns_core::model::{DeviceObservation, DnsRecord, RecordSpec, RecordType};
use ztdns_core::traits::{
    AddressLookup, DeviceDirectory, DeviceStream, DnsRecordStore, RecordStream,
};

pub const ACCOUNT: &str = "acct-1";
pub const ZONE: &str = "zone-1";

/// Directory returning a fixed listing, or failing part way through
#[derive(Clone, Default)]
pub struct StaticDirectory {
    observations: Vec<DeviceObservation>,
    fail_after: Option<usize>,
    list_call_count: Arc<AtomicUsize>,
}

impl StaticDirectory {
    pub fn new(observations: Vec<DeviceObservation>) -> Self {
        Self {
            observations,
            ..Self::default()
        }
    }

    /// Yield `n` observations, then an error
    pub fn failing_after(n: usize, observations: Vec<DeviceObservation>) -> Self {
        Self {
            observations,
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }
}

impl DeviceDirectory for StaticDirectory {
    fn list_devices<'a>(&'a self, _account_id: &'a str) -> DeviceStream<'a> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);

        let mut items: Vec<Result<DeviceObservation>> = Vec::new();
        for (i, obs) in self.observations.iter().enumerate() {
            if self.fail_after == Some(i) {
                items.push(Err(Error::provider("test", "page 2 returned 503")));
                break;
            }
            items.push(Ok(obs.clone()));
        }
        if self.fail_after.is_some_and(|n| n >= self.observations.len()) {
            items.push(Err(Error::provider("test", "page 2 returned 503")));
        }

        Box::pin(tokio_stream::iter(items))
    }
}

/// Address lookup backed by a table keyed by device id
#[derive(Clone, Default)]
pub struct TableLookup {
    addresses: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    lookup_call_count: Arc<AtomicUsize>,
}

impl TableLookup {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let lookup = Self::default();
        for (id, addr) in entries {
            lookup.set(id, addr);
        }
        lookup
    }

    pub fn set(&self, device_id: &str, address: &str) {
        self.addresses
            .lock()
            .unwrap()
            .insert(device_id.to_string(), address.to_string());
    }

    pub fn fail(&self, device_id: &str) {
        self.failing.lock().unwrap().insert(device_id.to_string());
    }

    pub fn lookup_call_count(&self) -> usize {
        self.lookup_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressLookup for TableLookup {
    async fn lookup_address(&self, _account_id: &str, device_id: &str) -> Result<Option<String>> {
        self.lookup_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(device_id) {
            return Err(Error::lookup("HTTP request failed: connection reset"));
        }
        Ok(self.addresses.lock().unwrap().get(device_id).cloned())
    }
}

/// A mutation observed by the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { name: String, content: String, ttl: u32 },
    Update { id: String, name: String, content: String, ttl: u32 },
}

/// In-memory record store that applies writes and tracks calls
#[derive(Clone)]
pub struct MemoryRecordStore {
    zone_name: Option<String>,
    records: Arc<Mutex<Vec<DnsRecord>>>,
    mutations: Arc<Mutex<Vec<Mutation>>>,
    fail_names: Arc<Mutex<HashSet<String>>>,
    fail_listing: bool,
    next_id: Arc<AtomicUsize>,
}

impl MemoryRecordStore {
    pub fn new(zone_name: &str, records: Vec<DnsRecord>) -> Self {
        Self {
            zone_name: Some(zone_name.to_string()),
            records: Arc::new(Mutex::new(records)),
            mutations: Arc::new(Mutex::new(Vec::new())),
            fail_names: Arc::new(Mutex::new(HashSet::new())),
            fail_listing: false,
            next_id: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// A store whose zone lookup fails
    pub fn without_zone() -> Self {
        Self {
            zone_name: None,
            ..Self::new("unused", Vec::new())
        }
    }

    /// A store whose record listing fails
    pub fn with_failing_listing(zone_name: &str) -> Self {
        Self {
            fail_listing: true,
            ..Self::new(zone_name, Vec::new())
        }
    }

    /// Make writes to this name fail
    pub fn fail_writes_to(&self, name: &str) {
        self.fail_names.lock().unwrap().insert(name.to_string());
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn clear_mutations(&self) {
        self.mutations.lock().unwrap().clear();
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn content_of(&self, name: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.content.clone())
            .collect()
    }
}

#[async_trait]
impl DnsRecordStore for MemoryRecordStore {
    async fn zone_name(&self, zone_id: &str) -> Result<String> {
        self.zone_name
            .clone()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone_id)))
    }

    fn list_records<'a>(&'a self, _zone_id: &'a str, record_type: RecordType) -> RecordStream<'a> {
        assert_eq!(record_type, RecordType::A);
        if self.fail_listing {
            return Box::pin(tokio_stream::iter(vec![Err(Error::provider(
                "test",
                "listing failed",
            ))]));
        }
        let snapshot: Vec<Result<DnsRecord>> =
            self.records.lock().unwrap().iter().cloned().map(Ok).collect();
        Box::pin(tokio_stream::iter(snapshot))
    }

    async fn create_record(&self, _zone_id: &str, spec: &RecordSpec) -> Result<String> {
        self.mutations.lock().unwrap().push(Mutation::Create {
            name: spec.name.clone(),
            content: spec.content.clone(),
            ttl: spec.ttl,
        });
        if self.fail_names.lock().unwrap().contains(&spec.name) {
            return Err(Error::provider("test", "Conflict: 409"));
        }

        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records
            .lock()
            .unwrap()
            .push(DnsRecord::new(id.clone(), spec.name.clone(), spec.content.clone()));
        Ok(id)
    }

    async fn update_record(&self, _zone_id: &str, record_id: &str, spec: &RecordSpec) -> Result<()> {
        self.mutations.lock().unwrap().push(Mutation::Update {
            id: record_id.to_string(),
            name: spec.name.clone(),
            content: spec.content.clone(),
            ttl: spec.ttl,
        });
        if self.fail_names.lock().unwrap().contains(&spec.name) {
            return Err(Error::provider("test", "Cloudflare server error (transient): 502"));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(record_id.to_string()))?;
        record.name = spec.name.clone();
        record.content = spec.content.clone();
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Engine settings for tests: fast schedule, defaults otherwise
pub fn test_config() -> EngineConfig {
    EngineConfig {
        cycle_interval_secs: 3600,
        cycle_timeout_secs: 5,
        event_channel_capacity: 100,
        ..EngineConfig::default()
    }
}

/// Observation with a fixed timestamp
pub fn device(id: &str, name: &str) -> DeviceObservation {
    DeviceObservation::new(id, name, "2024-06-01T12:00:00Z")
}
