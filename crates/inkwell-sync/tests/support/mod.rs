//! Shared fake `RemoteClient` for the integration test suite: records call
//! counts per endpoint, deduplicates CREATE calls by idempotency key (the
//! way a real server enforcing idempotency would), and can be told to fail
//! the next N memo creates with a transient error to exercise backoff.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use inkwell_core::{Memo, ShelfEntry};
use inkwell_sync::{MemoSummary, RemoteClient, RemoteErrorKind, ShelfEntrySummary, SyncError, SyncResult};
use uuid::Uuid;

fn require_server_id(entity: &str, server_id: Option<i64>) -> SyncResult<i64> {
    server_id.ok_or_else(|| SyncError::Remote {
        kind: RemoteErrorKind::InvariantViolation,
        message: format!("{entity} has no server id; cannot be synced remotely yet"),
    })
}

#[derive(Default)]
pub struct CallLog {
    pub memo_creates: AtomicUsize,
    pub memo_updates: AtomicUsize,
    pub memo_deletes: AtomicUsize,
    pub shelf_creates: AtomicUsize,
    pub shelf_updates: AtomicUsize,
    pub shelf_deletes: AtomicUsize,
    pub start_reading_calls: AtomicUsize,
}

pub struct FakeRemote {
    next_id: AtomicI64,
    memo_keys: Mutex<HashMap<Uuid, i64>>,
    shelf_keys: Mutex<HashMap<Uuid, i64>>,
    remaining_memo_create_failures: AtomicUsize,
    pub log: CallLog,
    pub last_memo_update_content: Mutex<Option<String>>,
    pub last_shelf_update_category: Mutex<Option<inkwell_core::Category>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        FakeRemote {
            next_id: AtomicI64::new(1),
            memo_keys: Mutex::new(HashMap::new()),
            shelf_keys: Mutex::new(HashMap::new()),
            remaining_memo_create_failures: AtomicUsize::new(0),
            log: CallLog::default(),
            last_memo_update_content: Mutex::new(None),
            last_shelf_update_category: Mutex::new(None),
        }
    }

    /// The next `count` calls to `create_memo` return a transient 503
    /// before the call is allowed to succeed.
    pub fn fail_next_memo_creates(&self, count: usize) {
        self.remaining_memo_create_failures.store(count, Ordering::SeqCst);
    }

    /// Distinct server ids ever handed out for memo creates, keyed by
    /// idempotency key. A retried create with the same key must not grow
    /// this map.
    pub fn distinct_memo_server_rows(&self) -> usize {
        let keys = self.memo_keys.lock().unwrap();
        keys.values().collect::<std::collections::HashSet<_>>().len()
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn create_memo(&self, memo: &Memo, idempotency_key: Uuid) -> SyncResult<i64> {
        self.log.memo_creates.fetch_add(1, Ordering::SeqCst);
        require_server_id("memo's shelf entry", memo.user_book_id.as_server())?;

        if self.remaining_memo_create_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_memo_create_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::Remote {
                kind: RemoteErrorKind::Server5xx,
                message: "503 service unavailable".to_string(),
            });
        }

        let mut keys = self.memo_keys.lock().unwrap();
        if let Some(existing) = keys.get(&idempotency_key) {
            return Ok(*existing);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        keys.insert(idempotency_key, id);
        Ok(id)
    }

    async fn update_memo(&self, _server_id: i64, memo: &Memo) -> SyncResult<()> {
        self.log.memo_updates.fetch_add(1, Ordering::SeqCst);
        *self.last_memo_update_content.lock().unwrap() = Some(memo.content.clone());
        Ok(())
    }

    async fn delete_memo(&self, _server_id: i64) -> SyncResult<()> {
        self.log.memo_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_shelf_entry(&self, _entry: &ShelfEntry, idempotency_key: Uuid) -> SyncResult<i64> {
        self.log.shelf_creates.fetch_add(1, Ordering::SeqCst);

        let mut keys = self.shelf_keys.lock().unwrap();
        if let Some(existing) = keys.get(&idempotency_key) {
            return Ok(*existing);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        keys.insert(idempotency_key, id);
        Ok(id)
    }

    async fn update_shelf_entry(&self, _server_id: i64, entry: &ShelfEntry) -> SyncResult<()> {
        self.log.shelf_updates.fetch_add(1, Ordering::SeqCst);
        *self.last_shelf_update_category.lock().unwrap() = Some(entry.category);
        Ok(())
    }

    async fn delete_shelf_entry(&self, _server_id: i64) -> SyncResult<()> {
        self.log.shelf_deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_reading(
        &self,
        _server_id: i64,
        _reading_start_date: chrono::DateTime<chrono::Utc>,
        _reading_progress: Option<i32>,
        _purchase_type: Option<inkwell_core::PurchaseType>,
    ) -> SyncResult<()> {
        self.log.start_reading_calls.fetch_add(1, Ordering::SeqCst);
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
            kind: RemoteErrorKind::NotFound,
            message: "not implemented in fake".to_string(),
        })
    }
}
