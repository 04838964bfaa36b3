//! Device deduplication
//!
//! The directory may report the same device name several times (re-enrolled
//! machines, stale registrations). A single pass folds the observations into
//! one entry per name, keeping the most recently updated one.
//!
//! Names are keyed after trimming and lowercasing, since `Laptop` and
//! `laptop` would otherwise compete for the same hostname.

use crate::model::{CanonicalDevice, DeviceObservation};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Collapse observations into one canonical device per name
///
/// Returns a mapping from the normalized name to its canonical device. On
/// equal timestamps the observation seen first wins. Observations with a
/// malformed timestamp are skipped individually.
///
/// The same identifier may survive under two names (a device renamed between
/// directory pages); each name keeps its own entry.
pub fn deduplicate<I>(observations: I) -> BTreeMap<String, CanonicalDevice>
where
    I: IntoIterator<Item = DeviceObservation>,
{
    let mut by_name: BTreeMap<String, CanonicalDevice> = BTreeMap::new();

    for observation in observations {
        let last_updated = match observation.parsed_timestamp() {
            Ok(ts) => ts,
            Err(e) => {
                warn!(
                    "Skipping device {} ({}): malformed timestamp '{}': {}",
                    observation.id, observation.name, observation.last_updated, e
                );
                continue;
            }
        };

        let key = observation.name.trim().to_ascii_lowercase();
        match by_name.get_mut(&key) {
            Some(current) if last_updated > current.last_updated => {
                debug!(
                    "Device {} supersedes {} for name {}",
                    observation.id, current.id, key
                );
                current.id = observation.id;
                current.name = observation.name;
                current.last_updated = last_updated;
            }
            Some(current) => {
                debug!(
                    "Device {} is stale, keeping {} for name {}",
                    observation.id, current.id, key
                );
            }
            None => {
                by_name.insert(
                    key,
                    CanonicalDevice {
                        id: observation.id,
                        name: observation.name,
                        last_updated,
                        address: None,
                    },
                );
            }
        }
    }

    by_name
}
