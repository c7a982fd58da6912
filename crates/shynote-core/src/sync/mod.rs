//! Offline sync protocol.
//!
//! Every mutation goes through [`SyncEngine`], which runs it as a single
//! transaction against a [`RecordStore`]:
//!
//! 1. the collision guard resolves who owns the client-supplied id,
//! 2. for note updates, the version arbiter checks staleness,
//! 3. the write is committed, with the store's compare-and-swap on the
//!    version as the final race backstop.
//!
//! The owner id is always an explicit argument; the engine never reads an
//! ambient "current user".

pub mod backup;
pub mod collision;
pub mod share;
pub mod version;

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::defaults::PLACEHOLDER_FOLDER_NAME;
use crate::error::{Error, RecordKind, Result};
use crate::models::{
    validate_record_id, Backup, Folder, FolderPatch, MergeReport, NewFolder, NewNote, Note,
    NoteFilter, NotePatch, Page, ShareState, SharedNote,
};
use crate::traits::{RecordStore, StoreTx};

pub use collision::Identity;
pub use share::derive_share_id;
pub use version::{apply_update, UpdatePlan};

/// The sync core: create-or-get, versioned update, delete, sharing and
/// backup merge over one record store.
pub struct SyncEngine<S: RecordStore> {
    store: S,
    config: SyncConfig,
}

impl<S: RecordStore> SyncEngine<S> {
    pub fn new(store: S, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn default_page(&self) -> Page {
        Page::new(0, self.config.page_limit)
    }

    // =========================================================================
    // NOTES
    // =========================================================================

    /// Create a note, or return the caller's existing note with the same id
    /// untouched (idempotent retry).
    pub async fn create_or_get_note(&self, owner_id: &str, new: NewNote) -> Result<Note> {
        validate_record_id(RecordKind::Note, &new.id)?;
        if new.title.trim().is_empty() {
            return Err(Error::Validation("note title must not be empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let identity = collision::resolve_note(&mut tx, &new.id, owner_id).await?;
        if let Some(existing) = identity.into_owned(RecordKind::Note, &new.id)? {
            debug!(
                subsystem = "sync",
                op = "create_note",
                note_id = %existing.id,
                version = existing.version,
                "Create retried for existing note, returning it unchanged"
            );
            return Ok(existing);
        }

        if let Some(folder_id) = new.folder_id.as_deref() {
            collision::ensure_folder_owned(&mut tx, folder_id, owner_id).await?;
        }

        let note = new.into_note(owner_id, Utc::now());
        tx.insert_note(&note).await?;
        tx.commit().await?;

        info!(
            subsystem = "sync",
            op = "create_note",
            owner_id,
            note_id = %note.id,
            "Created note"
        );
        Ok(note)
    }

    /// Apply a partial update to a note, creating it when the caller has
    /// no note with this id yet.
    ///
    /// With `expected_version` set, the update is rejected with
    /// [`Error::VersionConflict`] unless it matches the stored version.
    pub async fn update_note(
        &self,
        owner_id: &str,
        id: &str,
        patch: NotePatch,
        expected_version: Option<i64>,
    ) -> Result<Note> {
        validate_record_id(RecordKind::Note, id)?;
        if matches!(&patch.title, Some(title) if title.trim().is_empty()) {
            return Err(Error::Validation("note title must not be empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let existing = collision::resolve_note(&mut tx, id, owner_id)
            .await?
            .into_owned(RecordKind::Note, id)?;

        if let Some(folder_id) = patch.target_folder() {
            let unchanged = existing
                .as_ref()
                .is_some_and(|n| n.folder_id.as_deref() == Some(folder_id));
            if !unchanged {
                collision::ensure_folder_owned(&mut tx, folder_id, owner_id).await?;
            }
        }

        let plan = version::apply_update(existing, id, owner_id, patch, expected_version, Utc::now())?;
        let note = match plan {
            UpdatePlan::Create(note) => {
                tx.insert_note(&note).await?;
                note
            }
            UpdatePlan::Apply { note, read_version } => {
                if !tx.update_note(&note, read_version).await? {
                    let current = tx
                        .find_note_for_owner(id, owner_id)
                        .await?
                        .map(|n| n.version)
                        .unwrap_or(read_version);
                    warn!(
                        subsystem = "sync",
                        component = "version_arbiter",
                        note_id = id,
                        read_version,
                        current,
                        "Lost update race, rejecting write"
                    );
                    return Err(Error::VersionConflict {
                        id: id.to_string(),
                        expected: expected_version.unwrap_or(read_version),
                        current,
                    });
                }
                note
            }
        };
        tx.commit().await?;

        info!(
            subsystem = "sync",
            op = "update_note",
            owner_id,
            note_id = %note.id,
            version = note.version,
            "Updated note"
        );
        Ok(note)
    }

    /// Fetch one of the caller's notes.
    pub async fn get_note(&self, owner_id: &str, id: &str) -> Result<Note> {
        let mut tx = self.store.begin().await?;
        tx.find_note_for_owner(id, owner_id)
            .await?
            .ok_or_else(|| Error::note_not_found(id))
    }

    /// List the caller's notes, optionally restricted to one folder.
    pub async fn list_notes(&self, owner_id: &str, filter: NoteFilter) -> Result<Vec<Note>> {
        let page = filter.page.unwrap_or_else(|| self.default_page());
        let mut tx = self.store.begin().await?;
        let notes = tx
            .list_notes(owner_id, filter.folder_id.as_deref(), Some(page))
            .await?;
        debug!(
            subsystem = "sync",
            op = "list_notes",
            owner_id,
            result_count = notes.len(),
            "Listed notes"
        );
        Ok(notes)
    }

    /// Delete one of the caller's notes.
    pub async fn delete_note(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_note(id, owner_id).await? {
            return Err(Error::note_not_found(id));
        }
        tx.commit().await?;
        info!(subsystem = "sync", op = "delete_note", owner_id, note_id = id, "Deleted note");
        Ok(())
    }

    // =========================================================================
    // FOLDERS
    // =========================================================================

    /// Create a folder, or return the caller's existing folder with the same
    /// id untouched.
    pub async fn create_or_get_folder(&self, owner_id: &str, new: NewFolder) -> Result<Folder> {
        validate_record_id(RecordKind::Folder, &new.id)?;
        if new.name.trim().is_empty() {
            return Err(Error::Validation("folder name must not be empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let identity = collision::resolve_folder(&mut tx, &new.id, owner_id).await?;
        if let Some(existing) = identity.into_owned(RecordKind::Folder, &new.id)? {
            debug!(
                subsystem = "sync",
                op = "create_folder",
                folder_id = %existing.id,
                "Create retried for existing folder, returning it unchanged"
            );
            return Ok(existing);
        }

        let folder = Folder {
            id: new.id,
            owner_id: owner_id.to_string(),
            name: new.name,
        };
        tx.insert_folder(&folder).await?;
        tx.commit().await?;

        info!(
            subsystem = "sync",
            op = "create_folder",
            owner_id,
            folder_id = %folder.id,
            "Created folder"
        );
        Ok(folder)
    }

    /// Rename one of the caller's folders, creating it when absent.
    pub async fn update_folder(&self, owner_id: &str, id: &str, patch: FolderPatch) -> Result<Folder> {
        validate_record_id(RecordKind::Folder, id)?;
        if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("folder name must not be empty".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let existing = collision::resolve_folder(&mut tx, id, owner_id)
            .await?
            .into_owned(RecordKind::Folder, id)?;

        let folder = match existing {
            Some(mut folder) => {
                if let Some(name) = patch.name {
                    folder.name = name;
                }
                if !tx.update_folder(&folder).await? {
                    return Err(Error::folder_not_found(id));
                }
                folder
            }
            None => {
                let folder = Folder {
                    id: id.to_string(),
                    owner_id: owner_id.to_string(),
                    name: patch
                        .name
                        .unwrap_or_else(|| PLACEHOLDER_FOLDER_NAME.to_string()),
                };
                tx.insert_folder(&folder).await?;
                folder
            }
        };
        tx.commit().await?;

        info!(
            subsystem = "sync",
            op = "update_folder",
            owner_id,
            folder_id = %folder.id,
            "Updated folder"
        );
        Ok(folder)
    }

    /// List the caller's folders.
    pub async fn list_folders(&self, owner_id: &str, page: Option<Page>) -> Result<Vec<Folder>> {
        let page = page.unwrap_or_else(|| self.default_page());
        let mut tx = self.store.begin().await?;
        tx.list_folders(owner_id, Some(page)).await
    }

    /// Delete one of the caller's folders and every note filed in it.
    ///
    /// Returns the number of notes removed with the folder.
    pub async fn delete_folder(&self, owner_id: &str, id: &str) -> Result<u64> {
        let mut tx = self.store.begin().await?;
        if tx.find_folder_for_owner(id, owner_id).await?.is_none() {
            return Err(Error::folder_not_found(id));
        }

        let removed = tx.delete_notes_in_folder(id, owner_id).await?;
        if !tx.delete_folder(id, owner_id).await? {
            return Err(Error::folder_not_found(id));
        }
        tx.commit().await?;

        info!(
            subsystem = "sync",
            op = "delete_folder",
            owner_id,
            folder_id = id,
            notes_removed = removed,
            "Deleted folder with its notes"
        );
        Ok(removed)
    }

    // =========================================================================
    // SHARING
    // =========================================================================

    /// Turn sharing of a note on or off.
    ///
    /// Sharing is not a content change, so the note's version is left alone.
    pub async fn toggle_share(&self, owner_id: &str, note_id: &str) -> Result<ShareState> {
        let mut tx = self.store.begin().await?;
        let mut note = tx
            .find_note_for_owner(note_id, owner_id)
            .await?
            .ok_or_else(|| Error::note_not_found(note_id))?;

        let read_version = note.version;
        let state = share::toggle(&mut note, &self.config.share_salt);
        note.updated_at = Utc::now();

        if !tx.update_note(&note, read_version).await? {
            return Err(Error::VersionConflict {
                id: note_id.to_string(),
                expected: read_version,
                current: tx
                    .find_note(note_id)
                    .await?
                    .map(|n| n.version)
                    .unwrap_or(read_version),
            });
        }
        tx.commit().await?;

        info!(
            subsystem = "sync",
            component = "share_link",
            owner_id,
            note_id,
            is_shared = state.is_shared,
            "Toggled note sharing"
        );
        Ok(state)
    }

    /// Public read path for a share link.
    ///
    /// Unknown ids and notes that were shared once but are not shared now
    /// both answer [`Error::NotFound`].
    pub async fn get_shared_note(&self, share_id: &str) -> Result<SharedNote> {
        let not_found = || Error::NotFound("shared note".to_string());
        if !share::is_well_formed(share_id) {
            return Err(not_found());
        }

        let mut tx = self.store.begin().await?;
        match tx.find_shared_note(share_id).await? {
            Some(note) if note.is_shared => Ok(note.into()),
            _ => Err(not_found()),
        }
    }

    // =========================================================================
    // BACKUP
    // =========================================================================

    /// Export everything the caller owns.
    pub async fn export_backup(&self, owner_id: &str) -> Result<Backup> {
        let mut tx = self.store.begin().await?;
        let backup = backup::export_from(&mut tx, owner_id).await?;
        info!(
            subsystem = "sync",
            component = "backup_merger",
            op = "export_backup",
            owner_id,
            folders = backup.folders.len(),
            notes = backup.notes.len(),
            "Exported backup"
        );
        Ok(backup)
    }

    /// Merge a backup into the caller's data, additively and atomically.
    pub async fn merge_backup(&self, owner_id: &str, backup: Backup) -> Result<MergeReport> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;
        let report = backup::merge_into(&mut tx, owner_id, backup, Utc::now()).await?;
        tx.commit().await?;

        info!(
            subsystem = "sync",
            component = "backup_merger",
            op = "merge_backup",
            owner_id,
            folders_added = report.folders_added,
            notes_added = report.notes_added,
            folders_skipped = report.folders_skipped,
            notes_skipped = report.notes_skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Merged backup"
        );
        Ok(report)
    }
}
