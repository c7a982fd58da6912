//! Centralized default constants for shynote.
//!
//! Organized by domain area. Crates reference these instead of defining
//! their own magic numbers.

// =============================================================================
// RECORDS
// =============================================================================

/// Title given to a note created through upsert-on-update without a title.
pub const PLACEHOLDER_NOTE_TITLE: &str = "Untitled";

/// Name given to a folder created through upsert-on-update without a name.
pub const PLACEHOLDER_FOLDER_NAME: &str = "Untitled Folder";

/// Version assigned to every newly created note.
pub const INITIAL_VERSION: i64 = 1;

/// Maximum length of a client-generated record id, in characters.
pub const MAX_RECORD_ID_LEN: usize = 128;

// =============================================================================
// SHARING
// =============================================================================

/// Bytes of the SHA-256 digest used to build a share id (one UUID's worth).
pub const SHARE_ID_DIGEST_PREFIX: usize = 16;

/// Minimum accepted length of the share salt, in bytes.
pub const SHARE_SALT_MIN_LEN: usize = 16;

/// Environment variable holding the share salt.
pub const ENV_SHARE_SALT: &str = "SHYNOTE_SHARE_SALT";

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for note and folder listings.
pub const PAGE_LIMIT: i64 = 100;

/// Upper bound a caller may request for a single page.
pub const PAGE_LIMIT_MAX: i64 = 1_000;

/// Environment variable overriding the default page size.
pub const ENV_PAGE_LIMIT: &str = "SHYNOTE_PAGE_LIMIT";
