//! Backup merger: additive restore of a tenant export.
//!
//! Folders are merged before notes so notes can point at folders inserted by
//! the same backup. A record whose id is already taken is skipped, never
//! overwritten. A note whose folder is unknown is restored unfiled.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::error::{RecordKind, Result};
use crate::models::{validate_record_id, Backup, Folder, MergeReport};
use crate::traits::StoreTx;

/// Merge `backup` into `owner_id`'s data inside `tx`.
///
/// The caller owns the transaction; nothing is durable until it commits, so
/// a failure part-way leaves no partial restore behind.
pub async fn merge_into<T>(
    tx: &mut T,
    owner_id: &str,
    backup: Backup,
    now: DateTime<Utc>,
) -> Result<MergeReport>
where
    T: StoreTx + ?Sized,
{
    let mut report = MergeReport::default();
    let mut folder_ids = tx.folder_ids(owner_id).await?;
    let mut note_ids = tx.note_ids(owner_id).await?;

    for incoming in backup.folders {
        if !admit(tx, RecordKind::Folder, &incoming.id, owner_id, &folder_ids).await? {
            report.folders_skipped += 1;
            continue;
        }
        let folder = Folder {
            id: incoming.id,
            owner_id: owner_id.to_string(),
            name: incoming.name,
        };
        tx.insert_folder(&folder).await?;
        trace!(
            subsystem = "sync",
            component = "backup_merger",
            folder_id = %folder.id,
            "Restored folder"
        );
        folder_ids.insert(folder.id);
        report.folders_added += 1;
    }

    for incoming in backup.notes {
        if !admit(tx, RecordKind::Note, &incoming.id, owner_id, &note_ids).await? {
            report.notes_skipped += 1;
            continue;
        }
        let folder_id = match incoming.folder_id.clone() {
            Some(fid) if folder_ids.contains(&fid) => Some(fid),
            Some(fid) => {
                debug!(
                    subsystem = "sync",
                    component = "backup_merger",
                    note_id = %incoming.id,
                    folder_id = %fid,
                    "Dropping dangling folder reference"
                );
                None
            }
            None => None,
        };
        let note = incoming.into_note(owner_id, folder_id, now);
        tx.insert_note(&note).await?;
        trace!(
            subsystem = "sync",
            component = "backup_merger",
            note_id = %note.id,
            "Restored note"
        );
        note_ids.insert(note.id);
        report.notes_added += 1;
    }

    Ok(report)
}

/// Decide whether an incoming record may be inserted.
///
/// Malformed ids, ids the tenant already has, and ids owned by another
/// tenant are all skipped rather than failing the restore.
async fn admit<T>(
    tx: &mut T,
    kind: RecordKind,
    id: &str,
    owner_id: &str,
    known: &HashSet<String>,
) -> Result<bool>
where
    T: StoreTx + ?Sized,
{
    if let Err(e) = validate_record_id(kind, id) {
        warn!(
            subsystem = "sync",
            component = "backup_merger",
            kind = %kind,
            error = %e,
            "Skipping malformed backup record"
        );
        return Ok(false);
    }
    if known.contains(id) {
        return Ok(false);
    }

    let taken = match kind {
        RecordKind::Folder => tx.find_folder(id).await?.is_some(),
        RecordKind::Note => tx.find_note(id).await?.is_some(),
    };
    if taken {
        // The tenant's own ids are all in `known`, so this one is foreign.
        warn!(
            subsystem = "sync",
            component = "backup_merger",
            kind = %kind,
            record_id = id,
            owner_id,
            "Skipping backup record whose id belongs to another owner"
        );
        return Ok(false);
    }
    Ok(true)
}

/// Build a [`Backup`] of everything `owner_id` has.
pub async fn export_from<T>(tx: &mut T, owner_id: &str) -> Result<Backup>
where
    T: StoreTx + ?Sized,
{
    let folders = tx.list_folders(owner_id, None).await?;
    let notes = tx.list_notes(owner_id, None, None).await?;
    Ok(Backup {
        folders: folders.into_iter().map(Into::into).collect(),
        notes: notes.into_iter().map(Into::into).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{BackupFolder, BackupNote};
    use crate::traits::RecordStore;

    fn backup_note(id: &str, folder_id: Option<&str>) -> BackupNote {
        BackupNote {
            id: id.to_string(),
            title: format!("note {}", id),
            content: String::new(),
            folder_id: folder_id.map(str::to_string),
            version: 1,
            is_pinned: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_malformed_ids_are_skipped() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let backup = Backup {
            folders: vec![BackupFolder {
                id: " ".to_string(),
                name: "blank".to_string(),
            }],
            notes: vec![backup_note("", None), backup_note(&"x".repeat(200), None)],
        };

        let report = merge_into(&mut tx, "alice", backup, Utc::now()).await.unwrap();
        assert_eq!(report.folders_skipped, 1);
        assert_eq!(report.notes_skipped, 2);
        assert_eq!(report.notes_added, 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_within_one_backup_count_once() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let backup = Backup {
            folders: vec![],
            notes: vec![backup_note("n1", None), backup_note("n1", None)],
        };

        let report = merge_into(&mut tx, "alice", backup, Utc::now()).await.unwrap();
        assert_eq!(report.notes_added, 1);
        assert_eq!(report.notes_skipped, 1);
    }

    #[tokio::test]
    async fn test_notes_may_reference_folders_from_same_backup() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let backup = Backup {
            folders: vec![BackupFolder {
                id: "f1".to_string(),
                name: "Work".to_string(),
            }],
            notes: vec![backup_note("n1", Some("f1"))],
        };

        merge_into(&mut tx, "alice", backup, Utc::now()).await.unwrap();
        let note = tx.find_note("n1").await.unwrap().unwrap();
        assert_eq!(note.folder_id.as_deref(), Some("f1"));
        assert!(!note.is_shared);
    }

    #[tokio::test]
    async fn test_export_contains_only_the_owners_records() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let alice = Backup {
            folders: vec![],
            notes: vec![backup_note("a1", None)],
        };
        let bob = Backup {
            folders: vec![],
            notes: vec![backup_note("b1", None)],
        };
        merge_into(&mut tx, "alice", alice, Utc::now()).await.unwrap();
        merge_into(&mut tx, "bob", bob, Utc::now()).await.unwrap();

        let exported = export_from(&mut tx, "alice").await.unwrap();
        assert_eq!(exported.notes.len(), 1);
        assert_eq!(exported.notes[0].id, "a1");
    }
}
