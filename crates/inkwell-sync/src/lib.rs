//! # inkwell-sync: Offline Sync Engine for the Reading Journal
//!
//! This crate implements the write-behind sync engine: a durable outbox
//! queue, a dual-stage network probe, a sync-state coordinator, a FIFO
//! request gate, the replay engine itself, and the HTTP client that talks
//! to the remote reading-journal API.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 SyncEngine (core replay loop)                    │  │
//! │  │                                                                  │  │
//! │  │  Runs on a timer and can be kicked on-demand                    │  │
//! │  │  Drives OutboxQueue against RemoteClient                         │  │
//! │  └──────┬────────────────────┬─────────────────────┬───────────────┘  │
//! │         ▼                    ▼                     ▼                   │
//! │  ┌────────────┐      ┌───────────────┐     ┌──────────────────────┐   │
//! │  │OutboxQueue │      │ NetworkProbe  │     │ SyncStateCoordinator │   │
//! │  │            │      │               │     │                       │   │
//! │  │ enqueue/   │      │ HEAD /health  │     │ tracks in-flight vs.  │   │
//! │  │ claim/CAS  │      │ GET /health/* │     │ idle, waitForComplete │   │
//! │  └────────────┘      └───────────────┘     └──────────────────────┘   │
//! │                                                                         │
//! │  EVENTS (typed, via EventBus):                                         │
//! │  • SyncEvent::Online / Offline                                         │
//! │  • SyncEvent::SyncStarted / SyncComplete                               │
//! │  • SyncEvent::ItemFailedPermanently                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Sync engine configuration (base URL, timeouts, retries)
//! - [`error`] - Sync error types
//! - [`events`] - Typed event bus
//! - [`probe`] - Dual-stage network reachability probe
//! - [`coordinator`] - Sync cycle state tracking
//! - [`gate`] - FIFO request gate for writes issued mid-sync
//! - [`outbox`] - Outbox queue business logic (coalescing, backoff, promotion)
//! - [`remote`] - `RemoteClient` trait and the `reqwest`-backed implementation
//! - [`engine`] - The sync engine's core replay algorithm

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod gate;
pub mod outbox;
pub mod probe;
pub mod remote;

pub use config::SyncEngineConfig;
pub use coordinator::SyncStateCoordinator;
pub use engine::SyncEngine;
pub use error::{RemoteErrorKind, SyncError, SyncResult};
pub use events::{EventBus, SyncEvent};
pub use gate::RequestGate;
pub use outbox::OutboxQueue;
pub use probe::{NetworkProbe, ProbeState};
pub use remote::{HttpRemoteClient, MemoSummary, RemoteClient, ShelfEntrySummary};
