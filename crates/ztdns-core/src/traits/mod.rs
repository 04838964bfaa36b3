//! Collaborator traits for the ztdns system
//!
//! The engine owns every decision. Collaborators only fetch and write:
//!
//! - [`DeviceDirectory`]: List the zero-trust device inventory
//! - [`AddressLookup`]: Point lookup of a device's current address
//! - [`DnsRecordStore`]: Zone metadata and A record reads/writes

pub mod device_directory;
pub mod address_lookup;
pub mod record_store;

pub use device_directory::{DeviceDirectory, DeviceStream};
pub use address_lookup::AddressLookup;
pub use record_store::{DnsRecordStore, RecordStream};
