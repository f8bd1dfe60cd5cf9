//! Facade-level scenario tests (S5, S6): the ones that exercise write
//! dispatch policy, which only the facade decides. The engine/outbox
//! mechanics behind these scenarios (S1-S4) are covered in
//! `inkwell-sync`'s own integration tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use inkwell_core::{Category, EntitySyncStatus, Memo, PurchaseType, ShelfEntry};
use inkwell_db::pool::{Database, DbConfig};
use inkwell_facade::JournalFacade;
use inkwell_sync::{
    EventBus, MemoSummary, NetworkProbe, OutboxQueue, ProbeState, RemoteClient, RequestGate, ShelfEntrySummary,
    SyncEngine, SyncError, SyncResult, SyncStateCoordinator,
};
use uuid::Uuid;

struct FakeRemote {
    next_id: AtomicI64,
    shelf_update_calls: AtomicUsize,
}

impl FakeRemote {
    fn new() -> Self {
        FakeRemote {
            next_id: AtomicI64::new(1),
            shelf_update_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn create_memo(&self, _memo: &Memo, _idempotency_key: Uuid) -> SyncResult<i64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn update_memo(&self, _server_id: i64, _memo: &Memo) -> SyncResult<()> {
        Ok(())
    }

    async fn delete_memo(&self, _server_id: i64) -> SyncResult<()> {
        Ok(())
    }

    async fn create_shelf_entry(&self, _entry: &ShelfEntry, _idempotency_key: Uuid) -> SyncResult<i64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn update_shelf_entry(&self, _server_id: i64, _entry: &ShelfEntry) -> SyncResult<()> {
        self.shelf_update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_shelf_entry(&self, _server_id: i64) -> SyncResult<()> {
        Ok(())
    }

    async fn start_reading(
        &self,
        _server_id: i64,
        _reading_start_date: chrono::DateTime<chrono::Utc>,
        _reading_progress: Option<i32>,
        _purchase_type: Option<PurchaseType>,
    ) -> SyncResult<()> {
        Ok(())
    }

    async fn today_flow(&self) -> SyncResult<Vec<MemoSummary>> {
        Ok(Vec::new())
    }

    async fn memos_by_book(&self, _user_book_server_id: i64) -> SyncResult<Vec<MemoSummary>> {
        Ok(Vec::new())
    }

    async fn memo_dates(&self) -> SyncResult<Vec<NaiveDate>> {
        Ok(Vec::new())
    }

    async fn list_shelf_entries(&self) -> SyncResult<Vec<ShelfEntrySummary>> {
        Ok(Vec::new())
    }

    async fn get_shelf_entry(&self, _server_id: i64) -> SyncResult<ShelfEntrySummary> {
        Err(SyncError::Remote {
            kind: inkwell_sync::RemoteErrorKind::NotFound,
            message: "not implemented in fake".to_string(),
        })
    }
}

struct Harness {
    db: Database,
    facade: JournalFacade,
    probe: Arc<NetworkProbe>,
    coordinator: Arc<SyncStateCoordinator>,
    remote: Arc<FakeRemote>,
}

async fn harness() -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let queue = OutboxQueue::new(db.outbox(), Duration::from_millis(5), 3);
    let remote = Arc::new(FakeRemote::new());
    let coordinator = Arc::new(SyncStateCoordinator::new());
    let events = EventBus::new();
    let probe = Arc::new(NetworkProbe::new(reqwest::Client::new(), "http://127.0.0.1:1", events.clone()));
    let gate = RequestGate::spawn();

    let engine = SyncEngine::new(
        db.memos(),
        db.shelf(),
        queue.clone(),
        remote.clone() as Arc<dyn RemoteClient>,
        coordinator.clone(),
        events.clone(),
        25,
        7,
        30,
    );

    let facade = JournalFacade::new(
        db.memos(),
        db.shelf(),
        queue,
        remote.clone() as Arc<dyn RemoteClient>,
        probe.clone(),
        coordinator.clone(),
        gate,
        engine,
        events,
    );

    Harness { db, facade, probe, coordinator, remote }
}

async fn set_online(probe: &NetworkProbe) {
    probe
        .transition(ProbeState {
            is_online: true,
            is_local_reachable: true,
            is_external_reachable: true,
        })
        .await;
}

// ---------------------------------------------------------------------
// S5: online write issued while a sync cycle is already running is
// deferred through the gate, and still reaches the server.
// ---------------------------------------------------------------------

#[tokio::test]
async fn s5_write_during_in_flight_cycle_runs_through_gate() {
    let h = harness().await;
    set_online(&h.probe).await;

    let guard = h.coordinator.begin_cycle();
    assert!(h.coordinator.is_syncing());

    let memo = h
        .facade
        .create_memo(
            inkwell_core::EntityRef::Server(7),
            "gated write".to_string(),
            None,
            vec!["note".to_string()],
            chrono::Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(memo.sync_status, EntitySyncStatus::Pending, "write returns optimistically, not blocked on the cycle");

    drop(guard);

    // The gate runs the deferred replay on its own task; give it a turn.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stored = h.db.memos().get_by_local_id(memo.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, EntitySyncStatus::Synced);
    assert!(stored.server_id.is_some());
}

// ---------------------------------------------------------------------
// S6: shelf entry created offline, then updated immediately after
// coming online; the CREATE's cascaded server id lets the UPDATE settle
// once promoted.
// ---------------------------------------------------------------------

#[tokio::test]
async fn s6_update_immediately_after_create_cascades_through_promotion() {
    let h = harness().await;

    // Still offline: the create is stored and enqueued but never attempted.
    let entry = h
        .facade
        .create_shelf_entry(
            "Dune".to_string(),
            "Frank Herbert".to_string(),
            Category::ToRead,
            PurchaseType::Owned,
            None,
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(entry.sync_status, EntitySyncStatus::Pending);

    set_online(&h.probe).await;

    let updated = h.facade.update_shelf_category(entry.id, Category::Reading).await.unwrap();
    assert_eq!(updated.category, Category::Reading);

    // online-idle write policy attempts the UPDATE immediately; since the
    // CREATE is still unsettled, the UPDATE is WAITING behind it and this
    // immediate attempt finds nothing claimable yet. Run the background
    // engine pass (as the real process's timer would) to settle the
    // CREATE and promote the UPDATE, then give the facade's own
    // immediate-attempt path a moment in case it raced ahead.
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Run a fixed number of passes rather than stopping at the first sign
    // of `Synced`: the CREATE settling flips the shelf entry to `Synced`
    // one tick before the promoted UPDATE actually gets to replay, so
    // breaking out early would observe the CREATE's state and never give
    // the UPDATE's PUT a chance to fire.
    for _ in 0..3 {
        h.facade_engine_tick().await;
    }

    let stored = h.db.shelf().get_by_local_id(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_status, EntitySyncStatus::Synced);
    assert_eq!(stored.category, Category::Reading);
    assert!(h.remote.shelf_update_calls.load(Ordering::SeqCst) >= 1);
}

impl Harness {
    async fn facade_engine_tick(&self) {
        // Drives the same replay loop the background sync engine runs on a
        // timer, standing in for that timer firing in a real process.
        let _ = self.run_once_via_status_probe().await;
    }

    async fn run_once_via_status_probe(&self) {
        // The facade doesn't expose the engine directly; status() reflects
        // whatever the last pass recorded, so just poke the coordinator's
        // pending count path indirectly isn't useful here. Instead reuse
        // the db handles to run a one-off engine pass mirroring the
        // facade's own wiring.
        let queue = OutboxQueue::new(self.db.outbox(), Duration::from_millis(5), 3);
        let events = EventBus::new();
        let engine = SyncEngine::new(
            self.db.memos(),
            self.db.shelf(),
            queue,
            self.remote.clone() as Arc<dyn RemoteClient>,
            self.coordinator.clone(),
            events,
            25,
            7,
            30,
        );
        let _ = engine.run_once().await;
    }
}
