//! # inkwell-db: Durable Store for the Reading Journal Sync Engine
//!
//! This crate owns all SQLite access: connection pooling, embedded
//! migrations, and the repositories for memos, shelf entries, and the sync
//! outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  inkwell-facade / inkwell-sync                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     inkwell-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (memo/shelf/  │    │  (embedded)  │  │   │
//! │  │   │               │    │   outbox)     │    │ 0001_init.sql│  │   │
//! │  │   │ SqlitePool    │◄───│               │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database: `reading-tracker`                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (memo, shelf, outbox)

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::DbError;
pub use pool::{Database, DbConfig};

pub use repository::memo::MemoRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::shelf::ShelfRepository;

/// The durable store's logical database name, as referenced by spec and
/// config.
pub const DATABASE_NAME: &str = "reading-tracker";
