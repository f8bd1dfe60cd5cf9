//! # inkwell-facade: Public Service Facade
//!
//! The library surface a caller embeds: one [`JournalFacade`] wired up at
//! startup, exposing memo and shelf operations that read and write
//! through the local store and, depending on network and sync-cycle
//! state, the remote API. Callers never see the outbox, the gate, or the
//! engine directly.
//!
//! ## Module Organization
//!
//! - [`facade`] - `JournalFacade`, the public entry point
//! - [`policy`] - read/write dispatch decision tables
//! - [`error`] - facade-level error type

pub mod error;
pub mod facade;
pub mod policy;

pub use error::{FacadeError, FacadeResult};
pub use facade::JournalFacade;
