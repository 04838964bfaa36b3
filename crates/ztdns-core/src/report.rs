//! Per-device outcomes of a reconciliation cycle

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Why a device produced no mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The lookup service had no address for the device
    NoAddress,
    /// The reported address is not a strict IPv4 literal
    InvalidAddress(String),
    /// The lookup call itself failed
    ResolverFailed(String),
    /// The device name cannot form a DNS label
    InvalidName(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoAddress => write!(f, "no resolvable address"),
            SkipReason::InvalidAddress(addr) => write!(f, "invalid IPv4 address '{}'", addr),
            SkipReason::ResolverFailed(e) => write!(f, "address lookup failed: {}", e),
            SkipReason::InvalidName(e) => write!(f, "invalid device name: {}", e),
        }
    }
}

/// What the engine did for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// A new record was created
    Created {
        /// Identifier returned by the record store
        record_id: String,
        /// Written content
        content: String,
    },
    /// An existing record's content was replaced
    Updated {
        /// Identifier of the rewritten record
        record_id: String,
        /// Content before the write
        previous: String,
        /// Written content
        content: String,
    },
    /// The record already held the desired content
    Untouched {
        /// Identifier of the matching record
        record_id: String,
    },
    /// No mutation was attempted
    Skipped {
        /// Reason
        reason: SkipReason,
    },
    /// The create or update call failed
    Failed {
        /// Error message from the record store
        error: String,
    },
}

/// Outcome for one canonical device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOutcome {
    /// Identifier of the canonical observation
    pub device_id: String,
    /// Device name as reported
    pub device_name: String,
    /// Target hostname, absent when the name was rejected
    pub fqdn: Option<String>,
    /// What happened
    pub outcome: Outcome,
    /// Records sharing the target name that were left alone this cycle
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shadowed_records: Vec<String>,
}

impl DeviceOutcome {
    /// Whether the device needs no attention
    pub fn is_untouched(&self) -> bool {
        matches!(self.outcome, Outcome::Untouched { .. })
    }
}

impl fmt::Display for DeviceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.fqdn.as_deref().unwrap_or(&self.device_name);
        match &self.outcome {
            Outcome::Created { content, .. } => write!(f, "{}: created -> {}", target, content),
            Outcome::Updated {
                previous, content, ..
            } => write!(f, "{}: updated {} -> {}", target, previous, content),
            Outcome::Untouched { .. } => write!(f, "{}: untouched", target),
            Outcome::Skipped { reason } => write!(f, "{}: skipped ({})", target, reason),
            Outcome::Failed { error } => write!(f, "{}: failed ({})", target, error),
        }?;
        if !self.shadowed_records.is_empty() {
            write!(f, " [ignored duplicates: {}]", self.shadowed_records.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome counts of a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub untouched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    /// Number of mutations issued successfully
    pub fn mutations(&self) -> usize {
        self.created + self.updated
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} updated={} untouched={} skipped={} failed={}",
            self.created, self.updated, self.untouched, self.skipped, self.failed
        )
    }
}

/// Report of one reconciliation cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Zone suffix the cycle published under
    pub zone_name: String,
    /// One entry per canonical device, sorted by target name
    pub outcomes: Vec<DeviceOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    pub(crate) fn new(
        zone_name: String,
        mut outcomes: Vec<DeviceOutcome>,
        started_at: DateTime<Utc>,
    ) -> Self {
        outcomes.sort_by(|a, b| {
            let ka = a.fqdn.as_deref().unwrap_or(&a.device_name);
            let kb = b.fqdn.as_deref().unwrap_or(&b.device_name);
            ka.cmp(kb).then_with(|| a.device_id.cmp(&b.device_id))
        });

        Self {
            zone_name,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Count outcomes by kind
    pub fn summary(&self) -> Summary {
        self.outcomes
            .iter()
            .fold(Summary::default(), |mut summary, item| {
                match item.outcome {
                    Outcome::Created { .. } => summary.created += 1,
                    Outcome::Updated { .. } => summary.updated += 1,
                    Outcome::Untouched { .. } => summary.untouched += 1,
                    Outcome::Skipped { .. } => summary.skipped += 1,
                    Outcome::Failed { .. } => summary.failed += 1,
                }
                summary
            })
    }

    /// Outcomes worth reporting individually (everything not untouched)
    pub fn attention(&self) -> impl Iterator<Item = &DeviceOutcome> {
        self.outcomes.iter().filter(|o| !o.is_untouched())
    }

    /// Find the outcome for a target hostname
    pub fn for_fqdn(&self, fqdn: &str) -> Option<&DeviceOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.fqdn.as_deref() == Some(fqdn))
    }
}
