//! Reconciliation engine
//!
//! The ReconciliationEngine is responsible for:
//! - Fetching the zone suffix, the record snapshot and the device inventory
//! - Deduplicating devices and resolving their addresses
//! - Diffing desired addresses against existing A records
//! - Issuing the minimal set of creates and updates
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   observations   ┌──────────────┐
//! │ DeviceDirectory │ ───────────────▶ │ deduplicate  │
//! └─────────────────┘                  └──────────────┘
//!                                              │ canonical devices
//!                                              ▼
//! ┌─────────────────┐   addresses      ┌──────────────┐
//! │  AddressLookup  │ ◀──────────────▶ │ AddressResolver (bounded)
//! └─────────────────┘                  └──────────────┘
//!                                              │
//! ┌─────────────────┐   snapshot       ┌──────────────┐
//! │ DnsRecordStore  │ ───────────────▶ │ plan (pure)  │
//! │                 │ ◀─────────────── │  writes      │
//! └─────────────────┘  create/update   └──────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve the zone name (fatal on failure)
//! 2. Load the A record snapshot (fatal on failure)
//! 3. List devices (fatal on failure), reject unusable names, deduplicate
//! 4. Resolve addresses concurrently (per-device failures are skips)
//! 5. Plan writes against the snapshot
//! 6. Issue writes (per-record failures are reported, not retried)

pub mod plan;

use crate::config::EngineConfig;
use crate::dedup::deduplicate;
use crate::error::{Error, Result};
use crate::index::RecordIndex;
use crate::model::{DeviceObservation, DnsRecord, RecordType};
use crate::report::{CycleReport, DeviceOutcome, Outcome, Summary};
use crate::resolver::AddressResolver;
use crate::traits::{AddressLookup, DeviceDirectory, DnsRecordStore};
use futures::{StreamExt, TryStreamExt};
use plan::{PlannedWrite, WriteAction};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the ReconciliationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A cycle started
    CycleStarted {
        zone_id: String,
    },

    /// A device produced no mutation
    DeviceSkipped {
        device_name: String,
        reason: String,
    },

    /// A record was created
    RecordCreated {
        fqdn: String,
        content: String,
    },

    /// A record's content was replaced
    RecordUpdated {
        fqdn: String,
        previous: String,
        content: String,
    },

    /// A record already held the desired content
    RecordUntouched {
        fqdn: String,
    },

    /// A create or update call failed
    MutationFailed {
        fqdn: String,
        error: String,
    },

    /// Several records share a device hostname; only the first was used
    DuplicateRecords {
        fqdn: String,
        kept: String,
        ignored: Vec<String>,
    },

    /// A cycle finished
    CycleCompleted {
        summary: Summary,
    },

    /// A cycle was abandoned (fatal error or timeout)
    CycleAborted {
        reason: String,
    },

    /// The scheduling loop stopped
    Stopped {
        reason: String,
    },
}

/// Core reconciliation engine
///
/// Holds no state between cycles. Every cycle starts from a fresh inventory
/// and a fresh record snapshot, so running it again after a partial or
/// aborted cycle is always safe.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconciliationEngine::new()`]
/// 2. Either call [`ReconciliationEngine::run_cycle()`] once, or
/// 3. Start the periodic loop with [`ReconciliationEngine::run()`]
pub struct ReconciliationEngine {
    /// Device inventory
    directory: Box<dyn DeviceDirectory>,

    /// Per-device address lookups
    lookup: Box<dyn AddressLookup>,

    /// Zone metadata and record writes
    store: Box<dyn DnsRecordStore>,

    /// Engine settings
    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconciliationEngine {
    /// Create a new reconciliation engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        directory: Box<dyn DeviceDirectory>,
        lookup: Box<dyn AddressLookup>,
        store: Box<dyn DnsRecordStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            directory,
            lookup,
            store,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: Every device's outcome, including per-device
    ///   skips and per-record failures
    /// - `Err(Error)`: A fatal error; nothing after the failing step ran
    pub async fn run_cycle(&self, account_id: &str, zone_id: &str) -> Result<CycleReport> {
        let started_at = chrono::Utc::now();
        self.emit_event(EngineEvent::CycleStarted {
            zone_id: zone_id.to_string(),
        });

        let result = self.reconcile(account_id, zone_id, started_at).await;
        match &result {
            Ok(report) => {
                let summary = report.summary();
                info!("Cycle complete for zone {}: {}", report.zone_name, summary);
                for item in report.attention() {
                    info!("  {}", item);
                }
                self.emit_event(EngineEvent::CycleCompleted { summary });
            }
            Err(e) => {
                error!("Cycle aborted: {}", e);
                self.emit_event(EngineEvent::CycleAborted {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    /// Run one cycle bounded by the configured cycle timeout
    ///
    /// Mutations already issued when the timeout fires are not rolled back.
    pub async fn run_cycle_with_timeout(
        &self,
        account_id: &str,
        zone_id: &str,
    ) -> Result<CycleReport> {
        let limit = Duration::from_secs(self.config.cycle_timeout_secs);
        match tokio::time::timeout(limit, self.run_cycle(account_id, zone_id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Cycle exceeded {}s and was abandoned; issued mutations stand",
                    self.config.cycle_timeout_secs
                );
                self.emit_event(EngineEvent::CycleAborted {
                    reason: "Timeout".to_string(),
                });
                Err(Error::Timeout(self.config.cycle_timeout_secs))
            }
        }
    }

    async fn reconcile(
        &self,
        account_id: &str,
        zone_id: &str,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<CycleReport> {
        let zone_name = self
            .store
            .zone_name(zone_id)
            .await
            .map_err(|e| Error::zone(format!("Failed to resolve zone {}: {}", zone_id, e)))?;
        debug!("Zone {} resolves to {}", zone_id, zone_name);

        let records: Vec<DnsRecord> = self
            .store
            .list_records(zone_id, RecordType::A)
            .try_collect()
            .await
            .map_err(|e| Error::zone(format!("Failed to list A records: {}", e)))?;
        let index = RecordIndex::from_records(records);
        debug!("Loaded {} A record(s) from {}", index.len(), self.store.store_name());

        let observations: Vec<DeviceObservation> = self
            .directory
            .list_devices(account_id)
            .try_collect()
            .await
            .map_err(|e| Error::directory(format!("Failed to list devices: {}", e)))?;
        let observed = observations.len();
        let (publishable, rejected) = plan::screen_names(&zone_name, observations);
        let devices = deduplicate(publishable);
        info!(
            "Inventory: {} observation(s), {} distinct device(s), {} invalid name(s)",
            observed,
            devices.len(),
            rejected.len()
        );
        for outcome in &rejected {
            self.observe_settled(outcome);
        }

        let resolver = AddressResolver::new(self.lookup.as_ref(), self.config.resolve_concurrency);
        let resolved = resolver.resolve_all(account_id, devices.into_values()).await;

        let plan = plan::plan(&zone_name, resolved, &index, self.config.record_ttl);
        for settled in &plan.settled {
            self.observe_settled(settled);
        }

        let applied: Vec<DeviceOutcome> = futures::stream::iter(plan.writes)
            .map(|write| self.apply(zone_id, write))
            .buffer_unordered(self.config.mutation_concurrency)
            .collect()
            .await;

        let mut outcomes = rejected;
        outcomes.extend(plan.settled);
        outcomes.extend(applied);
        Ok(CycleReport::new(zone_name, outcomes, started_at))
    }

    /// Log and emit events for an outcome decided without a write
    fn observe_settled(&self, outcome: &DeviceOutcome) {
        self.observe_duplicates(outcome);

        match &outcome.outcome {
            Outcome::Skipped { reason } => {
                warn!("Skipping device {} ({}): {}", outcome.device_name, outcome.device_id, reason);
                self.emit_event(EngineEvent::DeviceSkipped {
                    device_name: outcome.device_name.clone(),
                    reason: reason.to_string(),
                });
            }
            Outcome::Untouched { .. } => {
                let fqdn = outcome.fqdn.clone().unwrap_or_default();
                debug!("Record {} already up to date", fqdn);
                self.emit_event(EngineEvent::RecordUntouched { fqdn });
            }
            _ => {}
        }
    }

    fn observe_duplicates(&self, outcome: &DeviceOutcome) {
        if outcome.shadowed_records.is_empty() {
            return;
        }
        let kept = match &outcome.outcome {
            Outcome::Updated { record_id, .. } | Outcome::Untouched { record_id } => {
                record_id.clone()
            }
            _ => return,
        };
        let fqdn = outcome.fqdn.clone().unwrap_or_default();
        warn!(
            "Multiple A records named {}; reconciling {} and ignoring {}",
            fqdn,
            kept,
            outcome.shadowed_records.join(", ")
        );
        self.emit_event(EngineEvent::DuplicateRecords {
            fqdn,
            kept,
            ignored: outcome.shadowed_records.clone(),
        });
    }

    /// Issue one planned write
    async fn apply(&self, zone_id: &str, write: PlannedWrite) -> DeviceOutcome {
        let fqdn = write.spec.name.clone();
        let content = write.spec.content.clone();

        let outcome = match &write.action {
            WriteAction::Create => match self.store.create_record(zone_id, &write.spec).await {
                Ok(record_id) => {
                    info!("Created {} -> {}", fqdn, content);
                    self.emit_event(EngineEvent::RecordCreated {
                        fqdn: fqdn.clone(),
                        content: content.clone(),
                    });
                    Outcome::Created { record_id, content }
                }
                Err(e) => self.failed(&fqdn, e),
            },
            WriteAction::Update {
                record_id,
                previous,
            } => match self
                .store
                .update_record(zone_id, record_id, &write.spec)
                .await
            {
                Ok(()) => {
                    info!("Updated {} -> {} (previous: {})", fqdn, content, previous);
                    self.emit_event(EngineEvent::RecordUpdated {
                        fqdn: fqdn.clone(),
                        previous: previous.clone(),
                        content: content.clone(),
                    });
                    Outcome::Updated {
                        record_id: record_id.clone(),
                        previous: previous.clone(),
                        content,
                    }
                }
                Err(e) => self.failed(&fqdn, e),
            },
        };

        let outcome = write.into_outcome(outcome);
        self.observe_duplicates(&outcome);
        outcome
    }

    fn failed(&self, fqdn: &str, e: Error) -> Outcome {
        error!("Failed to write record {}: {}", fqdn, e);
        self.emit_event(EngineEvent::MutationFailed {
            fqdn: fqdn.to_string(),
            error: e.to_string(),
        });
        Outcome::Failed {
            error: e.to_string(),
        }
    }

    /// Run the engine on a fixed interval
    ///
    /// Runs one cycle immediately, then every `cycle_interval_secs` until
    /// Ctrl-C. Fatal cycle errors are logged and the next tick proceeds.
    pub async fn run(&self, account_id: &str, zone_id: &str) -> Result<()> {
        self.run_internal(account_id, zone_id, None).await
    }

    /// Run the scheduling loop with a controlled shutdown signal
    ///
    /// With `None` this behaves like [`ReconciliationEngine::run()`]. The
    /// daemon passes a receiver fed by its own signal handling (SIGTERM).
    pub async fn run_with_shutdown(
        &self,
        account_id: &str,
        zone_id: &str,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(account_id, zone_id, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        account_id: &str,
        zone_id: &str,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.cycle_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                // Caller-controlled shutdown
                Some(rx) => {
                    let _ = rx.await;
                }
                // Default: wait for SIGINT
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Fatal errors are already logged and emitted by run_cycle
                    if let Err(e) = self.run_cycle_with_timeout(account_id, zone_id).await {
                        debug!("Continuing after failed cycle: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block a cycle on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, discarding event");
            }
        }
    }
}
