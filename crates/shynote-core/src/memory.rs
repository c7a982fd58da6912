//! In-memory record store.
//!
//! Transactions are fully serialized: `begin` takes the store lock and works
//! on a private copy of the tables, `commit` swaps that copy in. Dropping a
//! transaction releases the lock and throws its copy away.
//!
//! Enforces the same uniqueness rules as the PostgreSQL schema: note ids,
//! folder ids and share ids are unique across all owners.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, RecordKind, Result};
use crate::models::{Folder, Note, Page};
use crate::traits::{RecordStore, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    notes: BTreeMap<String, Note>,
    folders: BTreeMap<String, Folder>,
}

impl Tables {
    fn share_id_taken(&self, note: &Note) -> bool {
        let Some(share_id) = note.share_id.as_deref() else {
            return false;
        };
        self.notes
            .values()
            .any(|n| n.id != note.id && n.share_id.as_deref() == Some(share_id))
    }
}

/// A [`RecordStore`] kept entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of notes across all owners.
    pub async fn note_count(&self) -> usize {
        self.tables.lock().await.notes.len()
    }

    /// Total number of folders across all owners.
    pub async fn folder_count(&self) -> usize {
        self.tables.lock().await.folders.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }
}

/// Transaction over a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    work: Tables,
}

fn paginate<T>(items: Vec<T>, page: Option<Page>) -> Vec<T> {
    match page {
        Some(page) => items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect(),
        None => items,
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_note(&mut self, id: &str) -> Result<Option<Note>> {
        Ok(self.work.notes.get(id).cloned())
    }

    async fn find_note_for_owner(&mut self, id: &str, owner_id: &str) -> Result<Option<Note>> {
        Ok(self
            .work
            .notes
            .get(id)
            .filter(|n| n.owner_id == owner_id)
            .cloned())
    }

    async fn find_shared_note(&mut self, share_id: &str) -> Result<Option<Note>> {
        Ok(self
            .work
            .notes
            .values()
            .find(|n| n.share_id.as_deref() == Some(share_id))
            .cloned())
    }

    async fn find_folder(&mut self, id: &str) -> Result<Option<Folder>> {
        Ok(self.work.folders.get(id).cloned())
    }

    async fn find_folder_for_owner(
        &mut self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<Folder>> {
        Ok(self
            .work
            .folders
            .get(id)
            .filter(|f| f.owner_id == owner_id)
            .cloned())
    }

    async fn list_notes(
        &mut self,
        owner_id: &str,
        folder_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Note>> {
        let mut notes: Vec<Note> = self
            .work
            .notes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .filter(|n| folder_id.is_none() || n.folder_id.as_deref() == folder_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(notes, page))
    }

    async fn list_folders(&mut self, owner_id: &str, page: Option<Page>) -> Result<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .work
            .folders
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(paginate(folders, page))
    }

    async fn note_ids(&mut self, owner_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .work
            .notes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .map(|n| n.id.clone())
            .collect())
    }

    async fn folder_ids(&mut self, owner_id: &str) -> Result<HashSet<String>> {
        Ok(self
            .work
            .folders
            .values()
            .filter(|f| f.owner_id == owner_id)
            .map(|f| f.id.clone())
            .collect())
    }

    async fn insert_note(&mut self, note: &Note) -> Result<()> {
        if self.work.notes.contains_key(&note.id) || self.work.share_id_taken(note) {
            return Err(Error::IdentityConflict {
                kind: RecordKind::Note,
                id: note.id.clone(),
            });
        }
        self.work.notes.insert(note.id.clone(), note.clone());
        Ok(())
    }

    async fn insert_folder(&mut self, folder: &Folder) -> Result<()> {
        if self.work.folders.contains_key(&folder.id) {
            return Err(Error::IdentityConflict {
                kind: RecordKind::Folder,
                id: folder.id.clone(),
            });
        }
        self.work.folders.insert(folder.id.clone(), folder.clone());
        Ok(())
    }

    async fn update_note(&mut self, note: &Note, read_version: i64) -> Result<bool> {
        if self.work.share_id_taken(note) {
            return Err(Error::IdentityConflict {
                kind: RecordKind::Note,
                id: note.id.clone(),
            });
        }
        match self.work.notes.get_mut(&note.id) {
            Some(stored) if stored.owner_id == note.owner_id && stored.version == read_version => {
                let created_at = stored.created_at;
                *stored = note.clone();
                stored.created_at = created_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_folder(&mut self, folder: &Folder) -> Result<bool> {
        match self.work.folders.get_mut(&folder.id) {
            Some(stored) if stored.owner_id == folder.owner_id => {
                stored.name = folder.name.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_note(&mut self, id: &str, owner_id: &str) -> Result<bool> {
        let owned = self
            .work
            .notes
            .get(id)
            .is_some_and(|n| n.owner_id == owner_id);
        if owned {
            self.work.notes.remove(id);
        }
        Ok(owned)
    }

    async fn delete_notes_in_folder(&mut self, folder_id: &str, owner_id: &str) -> Result<u64> {
        let before = self.work.notes.len();
        self.work
            .notes
            .retain(|_, n| !(n.owner_id == owner_id && n.folder_id.as_deref() == Some(folder_id)));
        Ok((before - self.work.notes.len()) as u64)
    }

    async fn delete_folder(&mut self, id: &str, owner_id: &str) -> Result<bool> {
        let owned = self
            .work
            .folders
            .get(id)
            .is_some_and(|f| f.owner_id == owner_id);
        if owned {
            self.work.folders.remove(id);
        }
        Ok(owned)
    }

    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn note(id: &str, owner: &str) -> Note {
        let at = Utc::now();
        Note {
            id: id.to_string(),
            owner_id: owner.to_string(),
            title: "t".to_string(),
            content: String::new(),
            folder_id: None,
            version: 1,
            is_pinned: false,
            is_shared: false,
            share_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_note(&note("n1", "alice")).await.unwrap();
        }
        assert_eq!(store.note_count().await, 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_note(&note("n1", "alice")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.note_count().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_identity_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_note(&note("n1", "alice")).await.unwrap();
        let err = tx.insert_note(&note("n1", "bob")).await.unwrap_err();
        assert!(matches!(err, Error::IdentityConflict { kind: RecordKind::Note, .. }));
    }

    #[tokio::test]
    async fn test_duplicate_share_id_is_identity_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut a = note("a", "alice");
        a.share_id = Some("s".to_string());
        tx.insert_note(&a).await.unwrap();

        let mut b = note("b", "bob");
        b.share_id = Some("s".to_string());
        assert!(tx.insert_note(&b).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_update_is_compare_and_swap() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_note(&note("n1", "alice")).await.unwrap();

        let mut next = note("n1", "alice");
        next.version = 2;
        assert!(tx.update_note(&next, 1).await.unwrap());
        // Stored version is now 2, a writer that read version 1 loses.
        assert!(!tx.update_note(&next, 1).await.unwrap());
        // Another owner never matches.
        let mut foreign = note("n1", "bob");
        foreign.version = 3;
        assert!(!tx.update_note(&foreign, 2).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_notes_pages_and_filters() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for i in 0..5 {
            let mut n = note(&format!("n{}", i), "alice");
            n.folder_id = (i % 2 == 0).then(|| "f".to_string());
            tx.insert_note(&n).await.unwrap();
        }
        tx.insert_note(&note("other", "bob")).await.unwrap();

        assert_eq!(tx.list_notes("alice", None, None).await.unwrap().len(), 5);
        assert_eq!(tx.list_notes("alice", Some("f"), None).await.unwrap().len(), 3);
        assert_eq!(
            tx.list_notes("alice", None, Some(Page::new(4, 10)))
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
