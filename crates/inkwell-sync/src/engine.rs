//! # Sync Engine
//!
//! The core replay loop: promote WAITING items that can now run, claim
//! PENDING items in creation order, replay each against the remote API,
//! and either mark it settled or re-arm it with backoff. `run_once` is
//! safe to call concurrently from two independent tasks against the same
//! pool — claiming is a CAS, not a lock, so a racing caller simply loses
//! the claim and moves on to the next item.

use std::sync::Arc;

use chrono::Utc;
use inkwell_core::{EntityKind, EntitySyncStatus, Memo, OutboxItem, OutboxKind, ShelfEntry};
use inkwell_db::repository::memo::MemoRepository;
use inkwell_db::repository::shelf::ShelfRepository;
use tracing::{debug, info, warn};

use crate::coordinator::SyncStateCoordinator;
use crate::error::{RemoteErrorKind, SyncError, SyncResult};
use crate::events::{EventBus, SyncEvent};
use crate::outbox::OutboxQueue;
use crate::remote::RemoteClient;

/// Whether a replay failure should be treated as if the call had
/// succeeded: a CREATE that the server already holds under this
/// idempotency key (409), or a DELETE for an entity the server has
/// already removed (404).
fn is_success_equivalent(kind: OutboxKind, err: &SyncError) -> bool {
    matches!(
        (kind, err),
        (
            OutboxKind::Create,
            SyncError::Remote {
                kind: RemoteErrorKind::Conflict,
                ..
            }
        ) | (
            OutboxKind::Delete,
            SyncError::Remote {
                kind: RemoteErrorKind::NotFound,
                ..
            }
        )
    )
}

#[derive(Clone)]
pub struct SyncEngine {
    memos: MemoRepository,
    shelf: ShelfRepository,
    queue: OutboxQueue,
    remote: Arc<dyn RemoteClient>,
    coordinator: Arc<SyncStateCoordinator>,
    events: EventBus,
    batch_size: u32,
    /// Post-mutation retention window (days): a memo whose `memoStartTime`
    /// is older than this when its CREATE/UPDATE settles is dropped from
    /// the local store immediately.
    retention_days: i64,
    /// Periodic idle-sweep window (days): a `Synced` memo older than this
    /// is dropped regardless of whether it was just mutated.
    sweep_days: i64,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        memos: MemoRepository,
        shelf: ShelfRepository,
        queue: OutboxQueue,
        remote: Arc<dyn RemoteClient>,
        coordinator: Arc<SyncStateCoordinator>,
        events: EventBus,
        batch_size: u32,
        retention_days: i64,
        sweep_days: i64,
    ) -> Self {
        SyncEngine {
            memos,
            shelf,
            queue,
            remote,
            coordinator,
            events,
            batch_size,
            retention_days,
            sweep_days,
        }
    }

    /// Runs one full pass: promote, claim, replay, settle. Returns the
    /// number of items successfully replayed.
    pub async fn run_once(&self) -> SyncResult<usize> {
        let _guard = self.coordinator.begin_cycle();
        self.events.publish(SyncEvent::SyncStarted);

        let promoted = self.queue.promote_waiting().await?;
        if promoted > 0 {
            debug!(promoted, "promoted waiting items to pending");
        }

        let claimable = self.queue.claimable(self.batch_size).await?;
        let mut succeeded = 0;

        for item in claimable {
            if !self.queue.try_claim(&item.id).await? {
                continue;
            }
            if self.replay_and_settle(&item).await? {
                succeeded += 1;
            }
        }

        let swept = self.queue.sweep_succeeded(self.retention_days).await?;
        if swept > 0 {
            debug!(swept, "swept aged succeeded outbox items");
        }

        let swept_memos = self.memos.sweep_synced_idle(self.sweep_days).await?;
        if swept_memos > 0 {
            debug!(swept_memos, "swept synced-and-idle memos past retention");
        }

        let remaining = self.queue.count_pending().await?.max(0) as usize;
        self.coordinator.set_pending_count(remaining);
        self.coordinator.record_cycle_timestamp(Utc::now().timestamp_millis());
        self.events.publish(SyncEvent::SyncComplete { succeeded, remaining });

        info!(succeeded, remaining, "sync pass complete");
        Ok(succeeded)
    }

    /// Replays an already-claimed item and settles it: success or a
    /// success-equivalent error marks it settled, a retryable error
    /// re-arms backoff, anything else marks it failed and publishes
    /// `ItemFailedPermanently`. Returns whether the item settled
    /// successfully.
    async fn replay_and_settle(&self, item: &OutboxItem) -> SyncResult<bool> {
        match self.replay(item).await {
            Ok(()) => {
                self.queue.mark_success(&item.id).await?;
                Ok(true)
            }
            Err(e) if is_success_equivalent(item.kind, &e) => {
                debug!(id = %item.id, "treating remote response as success-equivalent");
                self.queue.mark_success(&item.id).await?;
                Ok(true)
            }
            Err(e) if e.is_retryable() => {
                self.queue.mark_attempt_failed(&item.id, item, &e.to_string()).await?;
                Ok(false)
            }
            Err(e) => {
                warn!(id = %item.id, error = %e, "outbox item failed permanently");
                self.queue.mark_attempt_failed(&item.id, item, &e.to_string()).await?;
                self.events.publish(SyncEvent::ItemFailedPermanently {
                    outbox_id: item.id.clone(),
                    reason: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    /// Claims and replays a single item outside the normal pass cadence,
    /// used by the facade's online-idle fast path so a write doesn't have
    /// to wait for the next scheduled engine pass to reach the server. A
    /// `false` return means either the item was already claimed elsewhere
    /// (lost the race to a concurrent pass) or the attempt failed; either
    /// way, the item is left for the next `run_once` to pick up.
    pub async fn try_replay_now(&self, item: &OutboxItem) -> SyncResult<bool> {
        if !self.queue.try_claim(&item.id).await? {
            return Ok(false);
        }
        self.replay_and_settle(item).await
    }

    async fn replay(&self, item: &OutboxItem) -> SyncResult<()> {
        match (item.entity_kind, item.kind) {
            (EntityKind::Memo, OutboxKind::Create) => self.replay_memo_create(item).await,
            (EntityKind::Memo, OutboxKind::Update) => self.replay_memo_update(item).await,
            (EntityKind::Memo, OutboxKind::Delete) => self.replay_memo_delete(item).await,
            (EntityKind::Shelf, OutboxKind::Create) => self.replay_shelf_create(item).await,
            (EntityKind::Shelf, OutboxKind::Update) => self.replay_shelf_update(item).await,
            (EntityKind::Shelf, OutboxKind::Delete) => self.replay_shelf_delete(item).await,
        }
    }

    async fn replay_memo_create(&self, item: &OutboxItem) -> SyncResult<()> {
        let memo = self.fresh_memo(item).await?;
        let server_id = self.remote.create_memo(&memo, item.idempotency_key).await?;

        self.memos.set_server_id(memo.id, server_id).await?;
        self.memos.set_sync_status(memo.id, EntitySyncStatus::Synced).await?;
        self.queue.set_server_id(&item.id, server_id).await?;

        if self.memos.drop_if_aged_past_retention(memo.id, self.retention_days).await? {
            debug!(memo_id = %memo.id, "dropped aged memo after create settled");
        }

        Ok(())
    }

    async fn replay_memo_update(&self, item: &OutboxItem) -> SyncResult<()> {
        let memo = self.fresh_memo(item).await?;
        let server_id = memo.server_id.ok_or_else(|| SyncError::Remote {
            kind: RemoteErrorKind::InvariantViolation,
            message: "memo update claimed before its create synced".to_string(),
        })?;

        self.remote.update_memo(server_id, &memo).await?;
        self.memos.set_sync_status(memo.id, EntitySyncStatus::Synced).await?;

        if self.memos.drop_if_aged_past_retention(memo.id, self.retention_days).await? {
            debug!(memo_id = %memo.id, "dropped aged memo after update settled");
        }

        Ok(())
    }

    async fn replay_memo_delete(&self, item: &OutboxItem) -> SyncResult<()> {
        let snapshot: Memo = serde_json::from_str(&item.payload)?;
        match snapshot.server_id.or(item.server_id) {
            Some(server_id) => self.remote.delete_memo(server_id).await,
            None => Ok(()), // never synced; local deletion already settles it
        }
    }

    async fn replay_shelf_create(&self, item: &OutboxItem) -> SyncResult<()> {
        let entry = self.fresh_shelf_entry(item).await?;
        let server_id = self
            .remote
            .create_shelf_entry(&entry, item.idempotency_key)
            .await?;

        self.shelf.set_server_id(entry.id, server_id).await?;
        self.shelf.set_sync_status(entry.id, EntitySyncStatus::Synced).await?;
        self.queue.set_server_id(&item.id, server_id).await?;

        let reassigned = self.memos.reassign_user_book_server_id(entry.id, server_id).await?;
        if reassigned > 0 {
            debug!(shelf_id = %entry.id, server_id, reassigned, "cascaded server id to dependent memos");
        }

        if let Some(started_at) = entry.started_reading_at {
            self.remote
                .start_reading(server_id, started_at, entry.last_read_page, Some(entry.purchase_type))
                .await?;
        }

        Ok(())
    }

    async fn replay_shelf_update(&self, item: &OutboxItem) -> SyncResult<()> {
        let entry = self.fresh_shelf_entry(item).await?;
        let server_id = entry.server_id.ok_or_else(|| SyncError::Remote {
            kind: RemoteErrorKind::InvariantViolation,
            message: "shelf entry update claimed before its create synced".to_string(),
        })?;

        self.remote.update_shelf_entry(server_id, &entry).await?;
        self.shelf.set_sync_status(entry.id, EntitySyncStatus::Synced).await?;

        if let Some(started_at) = entry.started_reading_at {
            self.remote
                .start_reading(server_id, started_at, entry.last_read_page, Some(entry.purchase_type))
                .await?;
        }

        Ok(())
    }

    async fn replay_shelf_delete(&self, item: &OutboxItem) -> SyncResult<()> {
        let snapshot: ShelfEntry = serde_json::from_str(&item.payload)?;
        match snapshot.server_id.or(item.server_id) {
            Some(server_id) => self.remote.delete_shelf_entry(server_id).await,
            None => Ok(()),
        }
    }

    /// Re-reads the memo from the store rather than trusting the outbox
    /// payload, so a CREATE/UPDATE picks up cascade-assigned ids that
    /// landed after the item was enqueued.
    async fn fresh_memo(&self, item: &OutboxItem) -> SyncResult<Memo> {
        self.memos
            .get_by_local_id(item.local_ref)
            .await?
            .ok_or_else(|| SyncError::Remote {
                kind: RemoteErrorKind::InvariantViolation,
                message: format!("memo {} missing from store during replay", item.local_ref),
            })
    }

    async fn fresh_shelf_entry(&self, item: &OutboxItem) -> SyncResult<ShelfEntry> {
        self.shelf
            .get_by_local_id(item.local_ref)
            .await?
            .ok_or_else(|| SyncError::Remote {
                kind: RemoteErrorKind::InvariantViolation,
                message: format!("shelf entry {} missing from store during replay", item.local_ref),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use inkwell_core::{Category, EntityRef, PurchaseType};
    use inkwell_db::pool::{Database, DbConfig};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    struct FakeRemote {
        next_id: AtomicI64,
    }

    impl FakeRemote {
        fn new() -> Self {
            FakeRemote {
                next_id: AtomicI64::new(1),
            }
        }
    }

    #[async_trait]
    impl RemoteClient for FakeRemote {
        async fn create_memo(&self, memo: &Memo, _idempotency_key: Uuid) -> SyncResult<i64> {
            memo.user_book_id.as_server().ok_or_else(|| SyncError::Remote {
                kind: RemoteErrorKind::InvariantViolation,
                message: "memo's shelf entry has no server id yet".to_string(),
            })?;
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
            Ok(())
        }

        async fn delete_shelf_entry(&self, _server_id: i64) -> SyncResult<()> {
            Ok(())
        }

        async fn start_reading(
            &self,
            _server_id: i64,
            _reading_start_date: chrono::DateTime<Utc>,
            _reading_progress: Option<i32>,
            _purchase_type: Option<PurchaseType>,
        ) -> SyncResult<()> {
            Ok(())
        }

        async fn today_flow(&self) -> SyncResult<Vec<crate::remote::MemoSummary>> {
            Ok(Vec::new())
        }

        async fn memos_by_book(&self, _user_book_server_id: i64) -> SyncResult<Vec<crate::remote::MemoSummary>> {
            Ok(Vec::new())
        }

        async fn memo_dates(&self) -> SyncResult<Vec<chrono::NaiveDate>> {
            Ok(Vec::new())
        }

        async fn list_shelf_entries(&self) -> SyncResult<Vec<crate::remote::ShelfEntrySummary>> {
            Ok(Vec::new())
        }

        async fn get_shelf_entry(&self, _server_id: i64) -> SyncResult<crate::remote::ShelfEntrySummary> {
            Err(SyncError::Remote {
                kind: RemoteErrorKind::NotFound,
                message: "not implemented in fake".to_string(),
            })
        }
    }

    async fn test_engine() -> (SyncEngine, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = OutboxQueue::new(db.outbox(), Duration::from_millis(10), 3);
        let remote = Arc::new(FakeRemote::new());
        let coordinator = Arc::new(SyncStateCoordinator::new());
        let events = EventBus::new();

        let engine = SyncEngine::new(db.memos(), db.shelf(), queue, remote, coordinator, events, 25, 7, 30);
        (engine, db)
    }

    fn sample_shelf_entry() -> ShelfEntry {
        ShelfEntry {
            id: Uuid::new_v4(),
            server_id: None,
            book_id: None,
            isbn: None,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            publisher: None,
            pub_date: None,
            description: None,
            cover_url: None,
            total_pages: None,
            main_genre: None,
            category: Category::ToRead,
            expectation: None,
            last_read_page: None,
            last_read_at: None,
            reading_finished_date: None,
            purchase_type: PurchaseType::Owned,
            rating: None,
            review: None,
            started_reading_at: None,
            sync_status: EntitySyncStatus::Pending,
            sync_queue_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn shelf_create_cascades_server_id_to_memos() {
        let (engine, db) = test_engine().await;

        let entry = sample_shelf_entry();
        db.shelf().create(&entry).await.unwrap();
        engine
            .queue
            .enqueue(
                OutboxKind::Create,
                EntityKind::Shelf,
                entry.id,
                serde_json::to_string(&entry).unwrap(),
            )
            .await
            .unwrap();

        // Enqueued strictly after the shelf create so `claimable`'s
        // created_at ordering processes the shelf item first, landing the
        // cascade write before the memo item is ever attempted.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let memo = Memo {
            id: Uuid::new_v4(),
            server_id: None,
            user_book_id: EntityRef::Local(entry.id),
            content: "first impressions".to_string(),
            page_number: Some(1),
            tags: vec!["reaction".to_string()],
            memo_start_time: Utc::now(),
            sync_status: EntitySyncStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            sync_queue_id: None,
        };
        db.memos().create(&memo).await.unwrap();
        engine
            .queue
            .enqueue(
                OutboxKind::Create,
                EntityKind::Memo,
                memo.id,
                serde_json::to_string(&memo).unwrap(),
            )
            .await
            .unwrap();

        let succeeded = engine.run_once().await.unwrap();
        assert_eq!(succeeded, 2, "cascade lets the memo create settle in the same pass as the shelf create");

        let fetched_memo = db.memos().get_by_local_id(memo.id).await.unwrap().unwrap();
        assert_eq!(fetched_memo.user_book_id.as_server(), Some(1));
        assert_eq!(fetched_memo.sync_status, EntitySyncStatus::Synced);
    }

    #[tokio::test]
    async fn delete_of_never_synced_entity_is_a_local_no_op() {
        let (engine, db) = test_engine().await;
        let entry = sample_shelf_entry();
        db.shelf().create(&entry).await.unwrap();

        engine
            .queue
            .enqueue(
                OutboxKind::Delete,
                EntityKind::Shelf,
                entry.id,
                serde_json::to_string(&entry).unwrap(),
            )
            .await
            .unwrap();
        db.shelf().delete_by_local_id(entry.id).await.unwrap();

        let succeeded = engine.run_once().await.unwrap();
        assert_eq!(succeeded, 1);
    }
}
