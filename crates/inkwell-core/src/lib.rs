//! # inkwell-core: Domain Types for the Reading Journal Sync Engine
//!
//! This crate holds the pure domain model shared by the durable store, the
//! sync engine, and the public service facade. It performs no I/O: every
//! type here is `Serialize`/`Deserialize` data plus the small amount of
//! pure logic (validation, state-machine predicates) that doesn't need a
//! database connection or a network client to exercise.
//!
//! ## Module Organization
//!
//! - [`types`] - Memo, ShelfEntry, Outbox item and their enums
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation helpers

pub mod error;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::{
    Category, EntityKind, EntityRef, EntitySyncStatus, Memo, OutboxItem, OutboxKind,
    OutboxStatus, PurchaseType, ShelfEntry,
};

/// Maximum number of replay attempts before an outbox item is marked `Failed`.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between replay attempts, in milliseconds.
pub const BACKOFF_BASE_MS: u64 = 5_000;

/// Hybrid read policy: how long a locally cached read is trusted before a
/// fresh server round-trip is preferred, expressed in days.
pub const RETENTION_DAYS: i64 = 7;

/// Age, in days, past which a successfully synced outbox entry is swept from
/// the queue table.
pub const SWEEP_DAYS: i64 = 30;

/// Default timeout for `waitForComplete`, in seconds.
pub const DEFAULT_SYNC_WAIT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP client timeout for remote calls, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
