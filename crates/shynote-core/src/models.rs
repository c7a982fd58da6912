//! Core data models for shynote.
//!
//! These types are shared by the sync engine and every store implementation.
//! Record ids are generated by clients, so they are carried as opaque strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults::{INITIAL_VERSION, MAX_RECORD_ID_LEN, PAGE_LIMIT, PAGE_LIMIT_MAX};
use crate::error::{Error, RecordKind, Result};

// =============================================================================
// RECORD TYPES
// =============================================================================

/// A note as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// `None` means unfiled.
    pub folder_id: Option<String>,
    /// Sole conflict-detection signal. Starts at 1, +1 per accepted update.
    pub version: i64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_shared: bool,
    /// Set the first time sharing is enabled, never rotated afterwards.
    pub share_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A folder as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub owner_id: String,
    pub name: String,
}

/// A record that belongs to exactly one tenant.
pub trait Owned {
    fn owner_id(&self) -> &str;
}

impl Owned for Note {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl Owned for Folder {
    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Fields sent by a client creating a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNote {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

impl NewNote {
    /// Build the stored record for a first insert.
    pub fn into_note(self, owner_id: &str, now: DateTime<Utc>) -> Note {
        Note {
            id: self.id,
            owner_id: owner_id.to_string(),
            title: self.title,
            content: self.content,
            folder_id: self.folder_id,
            version: INITIAL_VERSION,
            is_pinned: self.is_pinned,
            is_shared: false,
            share_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields sent by a client creating a folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewFolder {
    pub id: String,
    pub name: String,
}

/// Partial update of a note. Only fields that are `Some` are applied.
///
/// `folder_id` is doubly optional: `None` leaves the folder untouched,
/// `Some(None)` moves the note to unfiled, `Some(Some(id))` refiles it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub folder_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

impl NotePatch {
    /// True if the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.folder_id.is_none()
            && self.is_pinned.is_none()
    }

    /// The folder the patch files the note into, if it names one.
    pub fn target_folder(&self) -> Option<&str> {
        match &self.folder_id {
            Some(Some(id)) => Some(id.as_str()),
            _ => None,
        }
    }
}

/// Partial update of a folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Maps a present JSON value (including `null`) to `Some`, so an absent
/// field and an explicit `null` stay distinguishable.
fn deserialize_present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Offset/limit pagination for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: PAGE_LIMIT,
        }
    }
}

impl Page {
    /// Create a page, clamping negative offsets to 0 and the limit to
    /// `1..=PAGE_LIMIT_MAX`.
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset: offset.max(0),
            limit: limit.clamp(1, PAGE_LIMIT_MAX),
        }
    }
}

/// Filter for listing a tenant's notes.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Restrict to one folder.
    pub folder_id: Option<String>,
    /// `None` uses the engine's configured page size.
    pub page: Option<Page>,
}

// =============================================================================
// RESPONSE TYPES
// =============================================================================

/// Sharing state returned by a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareState {
    pub is_shared: bool,
    pub share_id: String,
}

/// What an anonymous reader of a share link gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedNote {
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Note> for SharedNote {
    fn from(note: Note) -> Self {
        Self {
            title: note.title,
            content: note.content,
            updated_at: note.updated_at,
        }
    }
}

// =============================================================================
// BACKUP TYPES
// =============================================================================

/// Full export of one tenant's data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub folders: Vec<BackupFolder>,
    #[serde(default)]
    pub notes: Vec<BackupNote>,
}

/// Folder entry of a backup. Ownership is not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFolder {
    pub id: String,
    pub name: String,
}

impl From<Folder> for BackupFolder {
    fn from(folder: Folder) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
        }
    }
}

/// Note entry of a backup. Ownership and sharing state are not exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupNote {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default = "initial_version")]
    pub version: i64,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn initial_version() -> i64 {
    INITIAL_VERSION
}

impl From<Note> for BackupNote {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            title: note.title,
            content: note.content,
            folder_id: note.folder_id,
            version: note.version,
            is_pinned: note.is_pinned,
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}

impl BackupNote {
    /// Build the stored record restored under `owner_id`.
    ///
    /// Restored notes start unshared; a later toggle re-derives the same
    /// share id for the same owner.
    pub fn into_note(self, owner_id: &str, folder_id: Option<String>, now: DateTime<Utc>) -> Note {
        let created_at = self.created_at.unwrap_or(now);
        Note {
            id: self.id,
            owner_id: owner_id.to_string(),
            title: self.title,
            content: self.content,
            folder_id,
            version: self.version.max(INITIAL_VERSION),
            is_pinned: self.is_pinned,
            is_shared: false,
            share_id: None,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

/// Outcome of a backup merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub folders_added: u64,
    pub notes_added: u64,
    /// Already present for the tenant, owned by someone else, or malformed.
    pub folders_skipped: u64,
    pub notes_skipped: u64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check a client-generated record id.
pub fn validate_record_id(kind: RecordKind, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::Validation(format!("{} id must not be empty", kind)));
    }
    if id.chars().count() > MAX_RECORD_ID_LEN {
        return Err(Error::Validation(format!(
            "{} id exceeds {} characters",
            kind, MAX_RECORD_ID_LEN
        )));
    }
    Ok(())
}
