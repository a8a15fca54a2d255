//! End-to-end scenarios against the assembled engine.

use lotkeeper_store::{Collection, StoreConfig, StoreContext, StoredRecord};
use lotkeeper_sync_engine::{
    DispatchOutcome, EngineConfig, EngineEvent, MockTransport, OfflineEngine,
};
use lotkeeper_sync_protocol::{ConflictPolicy, ManualChoice, Operation, QueueItemStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> EngineConfig {
    EngineConfig::new("https://api.example.com").with_retry_backoff(Duration::from_millis(5))
}

async fn engine_with(
    config: EngineConfig,
    store_config: StoreConfig,
) -> (OfflineEngine, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let engine = OfflineEngine::with_transport(
        config,
        StoreContext::new(store_config),
        transport.clone(),
    )
    .await
    .unwrap();
    (engine, transport)
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn offline_mutations_drain_when_connectivity_returns() {
    let (engine, transport) = engine_with(config(), StoreConfig::Memory).await;
    engine.notify_offline();

    engine
        .enqueue(Operation::Create, "vehicles", json!({"id": "v1", "plate": "AB-123"}))
        .unwrap();
    engine
        .enqueue(Operation::Update, "vehicles", json!({"id": "v1", "plate": "CD-456"}))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.pending_count().unwrap(), 2);
    assert_eq!(transport.call_count(), 0);

    engine.notify_online();
    wait_until(|| engine.pending_count().unwrap() == 0).await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, Operation::Create);
    assert_eq!(calls[1].1, Operation::Update);

    let cached = engine.store().get(Collection::Vehicles, "v1").unwrap().unwrap();
    assert_eq!(cached.data["plate"], "CD-456");
    assert!(!cached.is_unsynchronized());
}

#[tokio::test]
async fn server_wins_conflict_overwrites_local_state() {
    let (engine, transport) = engine_with(config(), StoreConfig::Memory).await;
    engine.notify_offline();

    let item = engine
        .enqueue(Operation::Update, "parking_sessions", json!({"id": "s1", "state": "ended"}))
        .unwrap();
    transport.script(
        item.id,
        DispatchOutcome::Conflict {
            server: json!({"id": "s1", "state": "active", "zone": "B"}),
        },
    );

    engine.sync_now().await.unwrap();

    assert_eq!(engine.pending_count().unwrap(), 0);
    assert!(engine.failed_items().unwrap().is_empty());
    assert_eq!(transport.call_count(), 1);

    let cached = engine
        .store()
        .get(Collection::ParkingSessions, "s1")
        .unwrap()
        .unwrap();
    assert_eq!(cached.data["state"], "active");
    assert!(!cached.is_unsynchronized());
}

#[tokio::test]
async fn transient_failures_exhaust_after_fixed_retries() {
    let (engine, transport) = engine_with(config(), StoreConfig::Memory).await;
    transport.set_default_outcome(DispatchOutcome::transient("connection reset"));
    let mut events = engine.subscribe_events();

    let item = engine
        .enqueue(Operation::Delete, "parking_sessions", json!({"id": "s2"}))
        .unwrap();

    let exhausted = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(EngineEvent::SyncExhausted { id, retries, .. }) = events.recv().await {
                break (id, retries);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(exhausted, (item.id, 3));
    assert_eq!(transport.call_count(), 3);

    // The exhaustion event fires exactly once.
    tokio::time::sleep(Duration::from_millis(30)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, EngineEvent::SyncExhausted { .. }));
    }

    let failed = engine.failed_items().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, QueueItemStatus::Failed);

    // A manual retry against a now-healthy server clears the item.
    transport.set_default_outcome(DispatchOutcome::Completed);
    engine.retry(item.id).unwrap();
    wait_until(|| engine.failed_items().unwrap().is_empty()).await;
    wait_until(|| engine.pending_count().unwrap() == 0).await;
}

#[tokio::test]
async fn manual_conflicts_wait_for_a_decision() {
    let (engine, transport) = engine_with(
        config().with_conflict_resolution(ConflictPolicy::Manual),
        StoreConfig::Memory,
    )
    .await;
    engine.notify_offline();

    let item = engine
        .enqueue(Operation::Update, "vehicles", json!({"id": "v1", "zone": "A"}))
        .unwrap();
    transport.script(
        item.id,
        DispatchOutcome::Conflict {
            server: json!({"id": "v1", "zone": "B"}),
        },
    );

    engine.sync_now().await.unwrap();
    assert_eq!(engine.open_conflicts().len(), 1);
    assert_eq!(engine.sync_now().await.unwrap(), 0);

    engine.resolve_conflict(item.id, ManualChoice::Client).unwrap();
    assert!(engine.open_conflicts().is_empty());
    engine.sync_now().await.unwrap();

    assert_eq!(engine.pending_count().unwrap(), 0);
    let cached = engine.store().get(Collection::Vehicles, "v1").unwrap().unwrap();
    assert_eq!(cached.data["zone"], "A");
}

#[tokio::test]
async fn queue_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store_config = StoreConfig::Embedded {
        dir: dir.path().to_path_buf(),
    };

    {
        let (engine, _) = engine_with(config(), store_config.clone()).await;
        engine.notify_offline();
        engine
            .enqueue(Operation::Create, "vehicles", json!({"id": "v1", "plate": "AB-123"}))
            .unwrap();
        assert_eq!(engine.pending_count().unwrap(), 1);
    }

    // Let the dropped engine's background tasks release the store lock.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (engine, transport) = engine_with(config(), store_config).await;
    assert_eq!(engine.pending_count().unwrap(), 1);

    engine.sync_now().await.unwrap();
    assert_eq!(engine.pending_count().unwrap(), 0);
    assert_eq!(transport.call_count(), 1);

    let cached = engine.store().get(Collection::Vehicles, "v1").unwrap().unwrap();
    assert_eq!(cached.data["plate"], "AB-123");
}

#[tokio::test]
async fn reload_merge_keeps_unsynchronized_local_changes() {
    let (engine, _) = engine_with(config(), StoreConfig::Memory).await;
    engine.notify_offline();

    // A local edit awaiting dispatch plus its cached entity.
    engine
        .store()
        .put(
            Collection::ParkingSessions,
            &StoredRecord::new("s1", json!({"id": "s1", "state": "ended"})),
        )
        .unwrap();
    engine
        .enqueue(Operation::Update, "parking_sessions", json!({"id": "s1", "state": "ended"}))
        .unwrap();

    // Fresh server snapshot from the reload.
    let merged = engine
        .merge(
            Collection::ParkingSessions,
            vec![
                StoredRecord::new("s1", json!({"id": "s1", "state": "active"}))
                    .with_last_synced_at(100),
                StoredRecord::new("s2", json!({"id": "s2", "state": "active"}))
                    .with_last_synced_at(100),
            ],
        )
        .unwrap();

    assert_eq!(merged.len(), 2);
    let local = merged.iter().find(|r| r.id == "s1").unwrap();
    assert_eq!(local.data["state"], "ended");
    let adopted = merged.iter().find(|r| r.id == "s2").unwrap();
    assert_eq!(adopted.data["state"], "active");
}
