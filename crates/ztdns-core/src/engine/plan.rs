//! Pure diff of desired device addresses against the record snapshot
//!
//! Planning performs no I/O. Every resolved device ends up either as a
//! final [`DeviceOutcome`] (skipped, untouched) or as a [`PlannedWrite`]
//! that the engine still has to issue. The set of planned writes depends
//! only on the inputs, never on the order lookups completed in.

use crate::index::RecordIndex;
use crate::model::{DeviceObservation, RecordSpec, RecordType};
use crate::report::{DeviceOutcome, Outcome, SkipReason};
use crate::resolver::Resolved;
use crate::validate::qualified_name;

/// Mutation kind decided for one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    /// No record with this name exists
    Create,
    /// A record exists with different content
    Update {
        /// Record to overwrite
        record_id: String,
        /// Its current content
        previous: String,
    },
}

/// A create or update the engine must issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWrite {
    pub device_id: String,
    pub device_name: String,
    pub action: WriteAction,
    /// Full record to write; `spec.name` is the target hostname
    pub spec: RecordSpec,
    /// Same-name records left alone this cycle
    pub shadowed: Vec<String>,
}

impl PlannedWrite {
    /// Build the outcome for this write once its result is known
    pub fn into_outcome(self, outcome: Outcome) -> DeviceOutcome {
        DeviceOutcome {
            device_id: self.device_id,
            device_name: self.device_name,
            fqdn: Some(self.spec.name),
            outcome,
            shadowed_records: self.shadowed,
        }
    }
}

/// Result of planning a cycle
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Mutations to issue
    pub writes: Vec<PlannedWrite>,
    /// Devices already settled (skipped or untouched)
    pub settled: Vec<DeviceOutcome>,
}

/// Split observations into publishable ones and per-observation skips
///
/// A name that cannot become a hostname in the zone is rejected before
/// deduplication, so unnamed devices never collapse into one entry and never
/// cost an address lookup. Every rejected observation gets its own outcome.
pub fn screen_names(
    zone_name: &str,
    observations: Vec<DeviceObservation>,
) -> (Vec<DeviceObservation>, Vec<DeviceOutcome>) {
    let mut accepted = Vec::with_capacity(observations.len());
    let mut rejected = Vec::new();

    for observation in observations {
        match qualified_name(&observation.name, zone_name) {
            Ok(_) => accepted.push(observation),
            Err(e) => rejected.push(invalid_name(observation.id, observation.name, e.to_string())),
        }
    }

    (accepted, rejected)
}

fn invalid_name(device_id: String, device_name: String, reason: String) -> DeviceOutcome {
    DeviceOutcome {
        device_id,
        device_name,
        fqdn: None,
        outcome: Outcome::Skipped {
            reason: SkipReason::InvalidName(reason),
        },
        shadowed_records: Vec::new(),
    }
}

/// Diff resolved devices against the record index
pub fn plan(zone_name: &str, resolved: Vec<Resolved>, index: &RecordIndex, ttl: u32) -> Plan {
    let mut plan = Plan::default();

    for Resolved { device, skip } in resolved {
        let fqdn = match qualified_name(&device.name, zone_name) {
            Ok(fqdn) => fqdn,
            Err(e) => {
                plan.settled.push(invalid_name(device.id, device.name, e.to_string()));
                continue;
            }
        };

        let content = match (skip, device.address) {
            (None, Some(address)) => address,
            (reason, _) => {
                plan.settled.push(DeviceOutcome {
                    device_id: device.id,
                    device_name: device.name,
                    fqdn: Some(fqdn),
                    outcome: Outcome::Skipped {
                        reason: reason.unwrap_or(SkipReason::NoAddress),
                    },
                    shadowed_records: Vec::new(),
                });
                continue;
            }
        };

        let (action, shadowed) = match index.find_by_name(&fqdn) {
            None => (WriteAction::Create, Vec::new()),
            Some(found) => {
                let shadowed: Vec<String> = found.shadowed.iter().map(|id| id.to_string()).collect();
                if found.entry.content == content {
                    plan.settled.push(DeviceOutcome {
                        device_id: device.id,
                        device_name: device.name,
                        fqdn: Some(fqdn),
                        outcome: Outcome::Untouched {
                            record_id: found.id.to_string(),
                        },
                        shadowed_records: shadowed,
                    });
                    continue;
                }
                (
                    WriteAction::Update {
                        record_id: found.id.to_string(),
                        previous: found.entry.content.clone(),
                    },
                    shadowed,
                )
            }
        };

        plan.writes.push(PlannedWrite {
            device_id: device.id,
            device_name: device.name,
            action,
            spec: RecordSpec {
                name: fqdn,
                record_type: RecordType::A,
                content,
                ttl,
            },
            shadowed,
        });
    }

    plan.writes.sort_by(|a, b| a.spec.name.cmp(&b.spec.name));
    plan
}
