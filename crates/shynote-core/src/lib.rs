//! # shynote-core
//!
//! Core types, traits, and the offline sync protocol for shynote.
//!
//! Clients create notes and folders offline under ids they generate
//! themselves. This crate reconciles those writes against a shared record
//! store: it detects ids owned by another tenant, rejects stale updates by
//! version, derives stable share links, and merges backups additively.
//!
//! Storage is abstracted behind [`RecordStore`]; [`MemoryStore`] is the
//! in-process implementation and `shynote-db` provides PostgreSQL.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod memory;
pub mod models;
pub mod sync;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{ShareSalt, SyncConfig};
pub use error::{Error, RecordKind, Result};
pub use memory::{MemoryStore, MemoryTx};
pub use models::*;
pub use sync::{derive_share_id, Identity, SyncEngine, UpdatePlan};
pub use traits::*;
