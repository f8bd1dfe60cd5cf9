//! # Journal Facade
//!
//! The single entry point a caller (a CLI, a web handler, a test harness)
//! uses to read and write memos and shelf entries. Wires the durable
//! store, the outbox, the network probe, and the sync engine together
//! behind the read/write policy decisions in [`crate::policy`], so callers
//! never branch on online/syncing state themselves.
//!
//! Grounded on the teacher's `state::sync::SyncState`: a thin struct
//! holding handles into the lower crates, exposing one method per command
//! the UI layer used to invoke directly. This version drops the Tauri
//! command plumbing and exposes plain async methods instead.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use inkwell_core::{
    Category, EntityKind, EntityRef, EntitySyncStatus, Memo, OutboxItem, OutboxKind, PurchaseType, ShelfEntry,
};
use inkwell_db::repository::memo::MemoRepository;
use inkwell_db::repository::shelf::ShelfRepository;
use inkwell_sync::{EventBus, NetworkProbe, OutboxQueue, RemoteClient, RequestGate, SyncEngine, SyncStateCoordinator};
use tracing::warn;
use uuid::Uuid;

use crate::error::{FacadeError, FacadeResult};
use crate::policy::{decide_read_detail_policy, decide_read_list_policy, decide_write_policy, ReadDetailPolicy, ReadListPolicy, WritePolicy};

/// Public service facade over the reading journal's local store and sync
/// engine. Cheap to clone: every field is a handle (a pool-backed
/// repository, an `Arc`, or a channel sender).
#[derive(Clone)]
pub struct JournalFacade {
    memos: MemoRepository,
    shelf: ShelfRepository,
    queue: OutboxQueue,
    remote: Arc<dyn RemoteClient>,
    probe: Arc<NetworkProbe>,
    coordinator: Arc<SyncStateCoordinator>,
    gate: RequestGate,
    engine: SyncEngine,
    events: EventBus,
}

impl JournalFacade {
    pub fn new(
        memos: MemoRepository,
        shelf: ShelfRepository,
        queue: OutboxQueue,
        remote: Arc<dyn RemoteClient>,
        probe: Arc<NetworkProbe>,
        coordinator: Arc<SyncStateCoordinator>,
        gate: RequestGate,
        engine: SyncEngine,
        events: EventBus,
    ) -> Self {
        JournalFacade {
            memos,
            shelf,
            queue,
            remote,
            probe,
            coordinator,
            gate,
            engine,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn status(&self) -> inkwell_sync::coordinator::SyncStatus {
        self.coordinator.status()
    }

    async fn is_online(&self) -> bool {
        self.probe.state().await.is_online
    }

    async fn write_policy(&self) -> WritePolicy {
        decide_write_policy(self.is_online().await, self.coordinator.is_syncing())
    }

    /// Dispatches the just-enqueued item per the write policy: left alone
    /// offline, attempted immediately online-idle (falling back silently
    /// to the store-first outcome on failure), or deferred behind the
    /// in-flight cycle via the gate when a sync pass is already running.
    /// Either way the caller already has its optimistic local result; this
    /// only controls how soon the remote side catches up.
    async fn dispatch(&self, item: OutboxItem) {
        match self.write_policy().await {
            WritePolicy::StoreFirst => {}
            WritePolicy::ServerFirstWithFallback => {
                if let Err(e) = self.engine.try_replay_now(&item).await {
                    warn!(id = %item.id, error = %e, "immediate replay attempt failed, leaving for next sync pass");
                }
            }
            WritePolicy::GateThenServer => {
                let engine = self.engine.clone();
                let id = item.id.clone();
                let _ = self.gate.submit(move || async move {
                    if let Err(e) = engine.try_replay_now(&item).await {
                        warn!(id = %id, error = %e, "gated replay attempt failed, leaving for next sync pass");
                    }
                });
            }
        }
    }

    // -------------------------------------------------------------------
    // Memos
    // -------------------------------------------------------------------

    pub async fn create_memo(
        &self,
        user_book_id: EntityRef,
        content: String,
        page_number: Option<i32>,
        tags: Vec<String>,
        memo_start_time: DateTime<Utc>,
    ) -> FacadeResult<Memo> {
        let now = Utc::now();
        let memo = Memo {
            id: Uuid::new_v4(),
            server_id: None,
            user_book_id,
            content,
            page_number,
            tags,
            memo_start_time,
            sync_status: EntitySyncStatus::Pending,
            created_at: now,
            updated_at: now,
            sync_queue_id: None,
        };

        self.memos.create(&memo).await?;
        let payload = serde_json::to_string(&memo)?;
        let item = self.queue.enqueue(OutboxKind::Create, EntityKind::Memo, memo.id, payload).await?;
        self.dispatch(item).await;
        Ok(memo)
    }

    pub async fn update_memo(&self, id: Uuid, content: String, page_number: Option<i32>) -> FacadeResult<Memo> {
        self.memos.update_content(id, &content, page_number).await?;
        let memo = self.memos.get_by_local_id(id).await?.ok_or(FacadeError::MemoNotFound)?;

        let payload = serde_json::to_string(&memo)?;
        let item = self.queue.enqueue(OutboxKind::Update, EntityKind::Memo, memo.id, payload).await?;
        self.dispatch(item).await;
        Ok(memo)
    }

    pub async fn delete_memo(&self, id: Uuid) -> FacadeResult<()> {
        let memo = self.memos.get_by_local_id(id).await?.ok_or(FacadeError::MemoNotFound)?;
        let payload = serde_json::to_string(&memo)?;

        self.memos.delete_by_local_id(id).await?;
        let item = self.queue.enqueue(OutboxKind::Delete, EntityKind::Memo, id, payload).await?;
        self.dispatch(item).await;
        Ok(())
    }

    /// Today's reading flow: every memo dated today, server-first when
    /// online.
    pub async fn today_flow(&self) -> FacadeResult<Vec<Memo>> {
        let today = Utc::now().date_naive();

        match decide_read_list_policy(self.is_online().await) {
            ReadListPolicy::ServerFirstWithCacheFallback => match self.remote.today_flow().await {
                Ok(summaries) => {
                    for s in &summaries {
                        self.memos
                            .upsert_from_remote(s.id, s.user_book_id, &s.content, s.page_number, &s.tags, s.memo_start_time)
                            .await?;
                    }
                    Ok(self.memos.list_by_date(today).await?)
                }
                Err(e) => {
                    warn!(error = %e, "server-first today_flow failed, falling back to cache");
                    Ok(self.memos.list_by_date(today).await?)
                }
            },
            ReadListPolicy::StoreOnly => Ok(self.memos.list_by_date(today).await?),
        }
    }

    pub async fn memos_by_book(&self, user_book: EntityRef) -> FacadeResult<Vec<Memo>> {
        match decide_read_list_policy(self.is_online().await) {
            ReadListPolicy::ServerFirstWithCacheFallback => {
                if let Some(server_id) = user_book.as_server() {
                    match self.remote.memos_by_book(server_id).await {
                        Ok(summaries) => {
                            for s in &summaries {
                                self.memos
                                    .upsert_from_remote(s.id, s.user_book_id, &s.content, s.page_number, &s.tags, s.memo_start_time)
                                    .await?;
                            }
                            return Ok(self.memos.list_by_user_book(server_id).await?);
                        }
                        Err(e) => {
                            warn!(error = %e, "server-first memos_by_book failed, falling back to cache");
                        }
                    }
                }
                self.memos_by_book_local(user_book).await
            }
            ReadListPolicy::StoreOnly => self.memos_by_book_local(user_book).await,
        }
    }

    async fn memos_by_book_local(&self, user_book: EntityRef) -> FacadeResult<Vec<Memo>> {
        match user_book {
            EntityRef::Server(id) => Ok(self.memos.list_by_user_book(id).await?),
            EntityRef::Local(id) => Ok(self.memos.list_by_user_book_local(id).await?),
        }
    }

    pub async fn memo_dates(&self) -> FacadeResult<Vec<NaiveDate>> {
        match decide_read_list_policy(self.is_online().await) {
            ReadListPolicy::ServerFirstWithCacheFallback => match self.remote.memo_dates().await {
                Ok(dates) => Ok(dates),
                Err(e) => {
                    warn!(error = %e, "server-first memo_dates failed, falling back to cache");
                    Ok(self.memos.list_distinct_dates().await?)
                }
            },
            ReadListPolicy::StoreOnly => Ok(self.memos.list_distinct_dates().await?),
        }
    }

    // -------------------------------------------------------------------
    // Shelf
    // -------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_shelf_entry(
        &self,
        title: String,
        author: String,
        category: Category,
        purchase_type: PurchaseType,
        isbn: Option<String>,
        book_id: Option<i64>,
        total_pages: Option<i32>,
    ) -> FacadeResult<ShelfEntry> {
        let now = Utc::now();
        let entry = ShelfEntry {
            id: Uuid::new_v4(),
            server_id: None,
            book_id,
            isbn,
            title,
            author,
            publisher: None,
            pub_date: None,
            description: None,
            cover_url: None,
            total_pages,
            main_genre: None,
            category,
            expectation: None,
            last_read_page: None,
            last_read_at: None,
            reading_finished_date: None,
            purchase_type,
            rating: None,
            review: None,
            started_reading_at: None,
            sync_status: EntitySyncStatus::Pending,
            sync_queue_id: None,
            created_at: now,
            updated_at: now,
        };

        self.shelf.create(&entry).await?;
        let payload = serde_json::to_string(&entry)?;
        let item = self.queue.enqueue(OutboxKind::Create, EntityKind::Shelf, entry.id, payload).await?;
        self.dispatch(item).await;
        Ok(entry)
    }

    pub async fn update_shelf_category(&self, id: Uuid, category: Category) -> FacadeResult<ShelfEntry> {
        self.shelf.set_category(id, category).await?;
        let entry = self.shelf.get_by_local_id(id).await?.ok_or(FacadeError::ShelfEntryNotFound)?;

        let payload = serde_json::to_string(&entry)?;
        let item = self.queue.enqueue(OutboxKind::Update, EntityKind::Shelf, entry.id, payload).await?;
        self.dispatch(item).await;
        Ok(entry)
    }

    /// The local mirror of `updateBookDetail`'s `readingProgress`: advances
    /// `lastReadPage` and the shelf category together as one UPDATE.
    pub async fn update_reading_progress(
        &self,
        id: Uuid,
        category: Category,
        last_read_page: Option<i32>,
    ) -> FacadeResult<ShelfEntry> {
        self.shelf.update_reading_progress(id, category, last_read_page).await?;
        let entry = self.shelf.get_by_local_id(id).await?.ok_or(FacadeError::ShelfEntryNotFound)?;

        let payload = serde_json::to_string(&entry)?;
        let item = self.queue.enqueue(OutboxKind::Update, EntityKind::Shelf, entry.id, payload).await?;
        self.dispatch(item).await;
        Ok(entry)
    }

    /// Marks a shelf entry as currently being read. Modeled as an UPDATE
    /// outbox item like any other shelf mutation; the engine additionally
    /// calls the dedicated start-reading endpoint during replay whenever
    /// the replayed entry carries a `started_reading_at`.
    pub async fn start_reading(&self, id: Uuid) -> FacadeResult<ShelfEntry> {
        self.shelf.start_reading(id, Utc::now()).await?;
        let entry = self.shelf.get_by_local_id(id).await?.ok_or(FacadeError::ShelfEntryNotFound)?;

        let payload = serde_json::to_string(&entry)?;
        let item = self.queue.enqueue(OutboxKind::Update, EntityKind::Shelf, entry.id, payload).await?;
        self.dispatch(item).await;
        Ok(entry)
    }

    pub async fn delete_shelf_entry(&self, id: Uuid) -> FacadeResult<()> {
        let entry = self.shelf.get_by_local_id(id).await?.ok_or(FacadeError::ShelfEntryNotFound)?;
        let payload = serde_json::to_string(&entry)?;

        self.shelf.delete_by_local_id(id).await?;
        let item = self.queue.enqueue(OutboxKind::Delete, EntityKind::Shelf, id, payload).await?;
        self.dispatch(item).await;
        Ok(())
    }

    pub async fn list_shelf(&self) -> FacadeResult<Vec<ShelfEntry>> {
        match decide_read_list_policy(self.is_online().await) {
            ReadListPolicy::ServerFirstWithCacheFallback => match self.remote.list_shelf_entries().await {
                Ok(summaries) => {
                    for s in &summaries {
                        self.shelf
                            .upsert_from_remote(
                                s.id,
                                &s.title,
                                &s.author,
                                s.category,
                                s.purchase_type,
                                s.last_read_page,
                                s.started_reading_at,
                            )
                            .await?;
                    }
                    Ok(self.shelf.list_all().await?)
                }
                Err(e) => {
                    warn!(error = %e, "server-first shelf list failed, falling back to cache");
                    Ok(self.shelf.list_all().await?)
                }
            },
            ReadListPolicy::StoreOnly => Ok(self.shelf.list_all().await?),
        }
    }

    pub async fn get_shelf_entry(&self, entity: EntityRef) -> FacadeResult<ShelfEntry> {
        match decide_read_detail_policy(self.is_online().await) {
            ReadDetailPolicy::Server => {
                if let Some(server_id) = entity.as_server() {
                    match self.remote.get_shelf_entry(server_id).await {
                        Ok(s) => {
                            let local_id = self
                                .shelf
                                .upsert_from_remote(
                                    s.id,
                                    &s.title,
                                    &s.author,
                                    s.category,
                                    s.purchase_type,
                                    s.last_read_page,
                                    s.started_reading_at,
                                )
                                .await?;
                            return self
                                .shelf
                                .get_by_local_id(local_id)
                                .await?
                                .ok_or(FacadeError::ShelfEntryNotFound);
                        }
                        Err(e) => {
                            warn!(error = %e, "server-first shelf detail read failed, falling back to cache");
                        }
                    }
                }
                self.lookup_shelf_local(entity).await
            }
            ReadDetailPolicy::Store => self.lookup_shelf_local(entity).await,
        }
    }

    async fn lookup_shelf_local(&self, entity: EntityRef) -> FacadeResult<ShelfEntry> {
        let found = match entity {
            EntityRef::Local(id) => self.shelf.get_by_local_id(id).await?,
            EntityRef::Server(id) => self.shelf.get_by_server_id(id).await?,
        };
        found.ok_or(FacadeError::ShelfEntryNotFound)
    }
}
