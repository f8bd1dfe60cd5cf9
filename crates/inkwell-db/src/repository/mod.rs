//! # Repository Module
//!
//! Database repository implementations for the durable store. Each
//! repository wraps a cloned `SqlitePool` and exposes a narrow, typed API;
//! all SQL is isolated here.
//!
//! Queries are written with sqlx's runtime-checked `query`/`query_as`
//! functions rather than the `query!`/`query_as!` macros, since there is no
//! `.sqlx` offline query cache checked into this repository (see
//! DESIGN.md) — correctness is verified by the repository tests against an
//! in-memory database, not by a compile-time cache.
//!
//! ## Available Repositories
//!
//! - [`memo`] - Memo CRUD and queries (today-flow, by book, by date)
//! - [`shelf`] - Shelf entry CRUD
//! - [`outbox`] - Outbox queue management (enqueue, claim, CAS transitions)

pub mod memo;
pub mod outbox;
pub mod shelf;
