//! # Domain Types
//!
//! Core domain types for the reading journal: memos taken against a book,
//! shelf entries tracking reading progress, and the outbox items used to
//! replay local writes against the remote API.
//!
//! ## Dual-Key Identity Pattern
//! Every synced entity has:
//! - a local id (`Uuid`), assigned at creation time, used for local
//!   relations and outbox tracking
//! - an optional server id (`i64`), assigned once the entity's CREATE has
//!   been accepted by the remote API
//!
//! [`EntityRef`] makes this explicit: call sites reference an entity by
//! whichever id they have, instead of relying on a field that happens to be
//! `None` before first sync.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// EntityRef
// =============================================================================

/// A reference to a synced entity, tagged by which id is known.
///
/// Replaces duck-typed lookups ("try the server id, fall back to the local
/// id") with an explicit variant the caller must match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    /// Not yet synced; only a local identity exists.
    Local(Uuid),
    /// Synced; the remote service's identity.
    Server(i64),
}

impl EntityRef {
    pub fn as_local(&self) -> Option<Uuid> {
        match self {
            EntityRef::Local(id) => Some(*id),
            EntityRef::Server(_) => None,
        }
    }

    pub fn as_server(&self) -> Option<i64> {
        match self {
            EntityRef::Server(id) => Some(*id),
            EntityRef::Local(_) => None,
        }
    }
}

// =============================================================================
// Entity Sync Status
// =============================================================================

/// Lifecycle of a synced entity (a `Memo` or `ShelfEntry`), independent of
/// its outbox items. Mirrors the state diagram: a fresh local write starts
/// `Pending`, moves through a `Syncing*` state while its outbox item is
/// claimed, and lands on `Synced` or `Failed`. `Waiting` covers an entity
/// whose mutation is queued behind another still-unsynced mutation of the
/// same entity (see `OutboxStatus::Waiting`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySyncStatus {
    Pending,
    SyncingCreate,
    Synced,
    SyncingUpdate,
    Waiting,
    SyncingDelete,
    Failed,
}

impl EntitySyncStatus {
    /// Whether the entity has at least one in-flight or queued outbox item.
    pub fn is_unsettled(&self) -> bool {
        !matches!(self, EntitySyncStatus::Synced)
    }
}

// =============================================================================
// Category / PurchaseType
// =============================================================================

/// Shelf category describing reading progress on a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ToRead,
    Reading,
    AlmostFinished,
    Finished,
}

impl Default for Category {
    fn default() -> Self {
        Category::ToRead
    }
}

/// How the reader came to own the book (ambient shelf metadata, not tied to
/// any sync rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseType {
    Owned,
    Borrowed,
    Library,
    Digital,
}

// =============================================================================
// Memo
// =============================================================================

/// A reading note taken against a book on a given date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memo {
    /// Local identifier, assigned at creation (UUID v4).
    pub id: Uuid,
    /// Remote identifier, assigned once the CREATE has synced.
    pub server_id: Option<i64>,
    /// The shelf entry (book) this memo belongs to.
    pub user_book_id: EntityRef,
    pub content: String,
    pub page_number: Option<i32>,
    /// Ordered list of short string codes (e.g. `"summary"`, `"quote"`),
    /// author-assigned at write time.
    pub tags: Vec<String>,
    /// User-authored timestamp the memo is dated against; the key
    /// retention reads to decide whether a synced row has aged out.
    pub memo_start_time: DateTime<Utc>,
    pub sync_status: EntitySyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The outbox item currently governing this memo, if any. Set when a
    /// mutation is enqueued, cleared once that item settles.
    pub sync_queue_id: Option<String>,
}

impl Memo {
    pub fn entity_ref(&self) -> EntityRef {
        match self.server_id {
            Some(id) => EntityRef::Server(id),
            None => EntityRef::Local(self.id),
        }
    }
}

// =============================================================================
// ShelfEntry
// =============================================================================

/// A book on the reader's shelf, with reading-progress metadata.
///
/// Fields split into two groups: the immutable bibliographic payload
/// (`title` through `main_genre`), fixed at the moment the book is added,
/// and the mutable reading state (`category` through `review`), which
/// changes over the life of the shelf entry. Unlike a [`Memo`], a shelf
/// entry is never subject to retention — it is retained in full for the
/// life of the reader's library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelfEntry {
    pub id: Uuid,
    /// Remote identifier; the server calls this `userBookId`.
    pub server_id: Option<i64>,
    /// The catalog book this shelf entry points at, independent of
    /// `server_id` (which identifies the shelf entry itself).
    pub book_id: Option<i64>,
    pub isbn: Option<String>,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub total_pages: Option<i32>,
    pub main_genre: Option<String>,
    pub category: Category,
    pub expectation: Option<String>,
    pub last_read_page: Option<i32>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub reading_finished_date: Option<NaiveDate>,
    pub purchase_type: PurchaseType,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub started_reading_at: Option<DateTime<Utc>>,
    pub sync_status: EntitySyncStatus,
    /// The outbox item currently governing this shelf entry, if any.
    pub sync_queue_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShelfEntry {
    pub fn entity_ref(&self) -> EntityRef {
        match self.server_id {
            Some(id) => EntityRef::Server(id),
            None => EntityRef::Local(self.id),
        }
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// Kind of mutation an outbox item replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxKind {
    Create,
    Update,
    Delete,
}

/// Which entity family an outbox item targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Memo,
    Shelf,
}

/// Outbox item lifecycle. `Waiting` holds the id of the item it is queued
/// behind (`original_queue_id`) rather than an owning pointer, so that
/// arena-of-records style cyclic references never need `Rc`/`RefCell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Waiting,
    Syncing,
    Success,
    Failed,
}

/// An entry in the local sync outbox, replayed against the remote API by
/// the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxItem {
    /// Outbox-local identifier (UUID v4, stringified for storage).
    pub id: String,
    pub kind: OutboxKind,
    pub entity_kind: EntityKind,
    /// The entity this item mutates, by local id.
    pub local_ref: Uuid,
    /// Populated once the entity's CREATE has synced.
    pub server_id: Option<i64>,
    /// Full entity payload as JSON, as it stood when the item was enqueued.
    pub payload: String,
    pub status: OutboxStatus,
    pub retry_count: u32,
    /// Sent as the `Idempotency-Key` header on CREATE replay, so a retried
    /// request after a dropped response is a safe no-op on the server.
    pub idempotency_key: Uuid,
    /// Set when `status == Waiting`: the id of the outbox item this one is
    /// queued behind.
    pub original_queue_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Earliest time this item may be claimed again, set by backoff.
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
