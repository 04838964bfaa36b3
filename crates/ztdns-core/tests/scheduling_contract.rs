//! Contract Test: Scheduling Loop
//!
//! Constraints verified:
//! - The loop runs a cycle immediately on start
//! - A fatal cycle error does not stop the loop
//! - Shutdown stops the loop and emits `Stopped`
//! - A cycle exceeding its timeout is abandoned

mod common;

use async_trait::async_trait;
use common::*;
use std::time::Duration;
use ztdns_core::traits::AddressLookup;
use ztdns_core::{EngineEvent, Error, ReconciliationEngine};

#[tokio::test]
async fn loop_runs_first_cycle_and_stops_on_shutdown() {
    let store = MemoryRecordStore::new("example.com", Vec::new());
    let (engine, mut event_rx) = ReconciliationEngine::new(
        Box::new(StaticDirectory::new(vec![device("d1", "a")])),
        Box::new(TableLookup::new(&[("d1", "10.0.0.1")])),
        Box::new(store.clone()),
        test_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move {
        engine
            .run_with_shutdown(ACCOUNT, ZONE, Some(shutdown_rx))
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    assert_eq!(store.mutations().len(), 1);

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first(), Some(EngineEvent::CycleStarted { .. })));
    assert!(events.iter().any(|e| matches!(e, EngineEvent::RecordCreated { .. })));
    assert!(matches!(events.last(), Some(EngineEvent::Stopped { .. })));
}

#[tokio::test]
async fn fatal_cycle_error_keeps_loop_alive() {
    let mut config = test_config();
    config.cycle_interval_secs = 1;

    let directory = StaticDirectory::failing_after(0, Vec::new());
    let (engine, _event_rx) = ReconciliationEngine::new(
        Box::new(directory.clone()),
        Box::new(TableLookup::default()),
        Box::new(MemoryRecordStore::new("example.com", Vec::new())),
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move {
        engine
            .run_with_shutdown(ACCOUNT, ZONE, Some(shutdown_rx))
            .await
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    assert!(
        directory.list_call_count() >= 2,
        "Expected a second cycle after a failed one, got {}",
        directory.list_call_count()
    );
}

/// Lookup that never answers in time
struct SlowLookup;

#[async_trait]
impl AddressLookup for SlowLookup {
    async fn lookup_address(
        &self,
        _account_id: &str,
        _device_id: &str,
    ) -> ztdns_core::Result<Option<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }
}

#[tokio::test]
async fn overrunning_cycle_times_out() {
    let mut config = test_config();
    config.cycle_timeout_secs = 1;

    let (engine, _event_rx) = ReconciliationEngine::new(
        Box::new(StaticDirectory::new(vec![device("d1", "a")])),
        Box::new(SlowLookup),
        Box::new(MemoryRecordStore::new("example.com", Vec::new())),
        config,
    )
    .expect("engine construction succeeds");

    let result = engine.run_cycle_with_timeout(ACCOUNT, ZONE).await;
    assert!(matches!(result, Err(Error::Timeout(1))));
}
