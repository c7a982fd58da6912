//! Structured logging field name constants for shynote.
//!
//! Every crate logs with these field names so log queries work the same way
//! across the sync engine, the stores and the admin tooling.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Store failures that abort a request |
//! | WARN  | Rejected writes (identity or version conflicts) |
//! | INFO  | Completed mutations, backup merges, pool lifecycle |
//! | DEBUG | Decision points (fresh insert, idempotent retry, upsert, dropped reference) |
//! | TRACE | Per-record iteration inside backup merges |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "sync", "database", "admin"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "collision_guard", "version_arbiter", "share_link", "backup_merger", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create_note", "update_note", "toggle_share", "merge_backup"
pub const OPERATION: &str = "op";

/// Tenant the operation runs on behalf of.
pub const OWNER_ID: &str = "owner_id";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note id being operated on.
pub const NOTE_ID: &str = "note_id";

/// Folder id being operated on.
pub const FOLDER_ID: &str = "folder_id";

/// Record version after (or before) a write.
pub const VERSION: &str = "version";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of folders inserted by a backup merge.
pub const FOLDERS_ADDED: &str = "folders_added";

/// Number of notes inserted by a backup merge.
pub const NOTES_ADDED: &str = "notes_added";

/// Number of records returned by a listing.
pub const RESULT_COUNT: &str = "result_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
