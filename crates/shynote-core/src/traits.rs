//! Record store traits.
//!
//! The sync engine never talks to a database directly; it opens a
//! [`StoreTx`] through a [`RecordStore`] and runs each operation as one
//! bounded read-modify-write inside it.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Folder, Note, Page};

// =============================================================================
// RECORD STORE TRAITS
// =============================================================================

/// A durable store of notes and folders keyed by globally unique ids.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Transaction handle type.
    type Tx: StoreTx;

    /// Open a transaction. Dropping it without [`StoreTx::commit`] discards
    /// every write made through it.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// Operations available inside one store transaction.
///
/// Inserts must report an id (or share id) that already exists anywhere in
/// the store as [`crate::Error::IdentityConflict`], not as a generic store
/// error.
#[async_trait]
pub trait StoreTx: Send {
    /// Look up a note by id regardless of owner.
    async fn find_note(&mut self, id: &str) -> Result<Option<Note>>;

    /// Look up a note by id within one owner's partition.
    async fn find_note_for_owner(&mut self, id: &str, owner_id: &str) -> Result<Option<Note>>;

    /// Look up a note by share id, whether or not it is currently shared.
    async fn find_shared_note(&mut self, share_id: &str) -> Result<Option<Note>>;

    /// Look up a folder by id regardless of owner.
    async fn find_folder(&mut self, id: &str) -> Result<Option<Folder>>;

    /// Look up a folder by id within one owner's partition.
    async fn find_folder_for_owner(&mut self, id: &str, owner_id: &str)
        -> Result<Option<Folder>>;

    /// List an owner's notes, most recently updated first.
    ///
    /// `page = None` returns every match.
    async fn list_notes(
        &mut self,
        owner_id: &str,
        folder_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Note>>;

    /// List an owner's folders ordered by name.
    async fn list_folders(&mut self, owner_id: &str, page: Option<Page>) -> Result<Vec<Folder>>;

    /// Ids of every note the owner has.
    async fn note_ids(&mut self, owner_id: &str) -> Result<HashSet<String>>;

    /// Ids of every folder the owner has.
    async fn folder_ids(&mut self, owner_id: &str) -> Result<HashSet<String>>;

    /// Insert a new note.
    async fn insert_note(&mut self, note: &Note) -> Result<()>;

    /// Insert a new folder.
    async fn insert_folder(&mut self, folder: &Folder) -> Result<()>;

    /// Overwrite a note's mutable fields with `note`, but only while the
    /// stored version still equals `read_version`.
    ///
    /// Returns `false` when no row matched (the version moved, or the note
    /// vanished) and nothing was written.
    async fn update_note(&mut self, note: &Note, read_version: i64) -> Result<bool>;

    /// Overwrite a folder's name. Returns `false` if the owner has no such folder.
    async fn update_folder(&mut self, folder: &Folder) -> Result<bool>;

    /// Delete one note. Returns `false` if the owner has no such note.
    async fn delete_note(&mut self, id: &str, owner_id: &str) -> Result<bool>;

    /// Delete every note the owner filed under `folder_id`.
    async fn delete_notes_in_folder(&mut self, folder_id: &str, owner_id: &str) -> Result<u64>;

    /// Delete one folder. Returns `false` if the owner has no such folder.
    async fn delete_folder(&mut self, id: &str, owner_id: &str) -> Result<bool>;

    /// Make every write of this transaction durable.
    async fn commit(self) -> Result<()>;
}
