//! Version arbiter: optimistic concurrency for note updates.
//!
//! ```text
//! {nonexistent} --create--> {v=1} --update(match)--> {v=2} --> ...
//! {v=n} --update(stale)--> {v=n}  (VersionConflict)
//! {nonexistent} --update--> {v=1} (upsert)
//! ```

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::defaults::{INITIAL_VERSION, PLACEHOLDER_NOTE_TITLE};
use crate::error::{Error, Result};
use crate::models::{Note, NotePatch};

/// What the engine must write to apply an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePlan {
    /// No prior record: insert this one at version 1.
    Create(Note),
    /// Overwrite the stored record, guarded by the version it was read at.
    Apply { note: Note, read_version: i64 },
}

impl UpdatePlan {
    pub fn note(&self) -> &Note {
        match self {
            UpdatePlan::Create(note) => note,
            UpdatePlan::Apply { note, .. } => note,
        }
    }
}

/// Decide how `patch` lands on `existing`.
///
/// `existing` must already be scoped to the caller (see the collision guard).
/// A `client_version` that differs from the stored version rejects the whole
/// update; omitting it skips the check.
pub fn apply_update(
    existing: Option<Note>,
    id: &str,
    owner_id: &str,
    patch: NotePatch,
    client_version: Option<i64>,
    now: DateTime<Utc>,
) -> Result<UpdatePlan> {
    let Some(mut note) = existing else {
        debug!(
            subsystem = "sync",
            component = "version_arbiter",
            note_id = id,
            "Update targets unknown note, creating it"
        );
        return Ok(UpdatePlan::Create(Note {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            title: patch
                .title
                .unwrap_or_else(|| PLACEHOLDER_NOTE_TITLE.to_string()),
            content: patch.content.unwrap_or_default(),
            folder_id: patch.folder_id.flatten(),
            version: INITIAL_VERSION,
            is_pinned: patch.is_pinned.unwrap_or(false),
            is_shared: false,
            share_id: None,
            created_at: now,
            updated_at: now,
        }));
    };

    if let Some(expected) = client_version {
        if expected != note.version {
            warn!(
                subsystem = "sync",
                component = "version_arbiter",
                note_id = id,
                expected,
                current = note.version,
                "Rejected stale update"
            );
            return Err(Error::VersionConflict {
                id: id.to_string(),
                expected,
                current: note.version,
            });
        }
    }

    let read_version = note.version;
    if let Some(title) = patch.title {
        note.title = title;
    }
    if let Some(content) = patch.content {
        note.content = content;
    }
    if let Some(folder_id) = patch.folder_id {
        note.folder_id = folder_id;
    }
    if let Some(is_pinned) = patch.is_pinned {
        note.is_pinned = is_pinned;
    }
    note.version = read_version + 1;
    note.updated_at = now;

    Ok(UpdatePlan::Apply { note, read_version })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(version: i64) -> Note {
        let at = Utc::now();
        Note {
            id: "n1".to_string(),
            owner_id: "alice".to_string(),
            title: "Groceries".to_string(),
            content: "milk".to_string(),
            folder_id: Some("f1".to_string()),
            version,
            is_pinned: false,
            is_shared: false,
            share_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_missing_record_becomes_create_with_placeholder() {
        let patch = NotePatch {
            content: Some("body".to_string()),
            ..Default::default()
        };
        let plan = apply_update(None, "n9", "alice", patch, Some(5), Utc::now()).unwrap();
        match plan {
            UpdatePlan::Create(note) => {
                assert_eq!(note.title, PLACEHOLDER_NOTE_TITLE);
                assert_eq!(note.content, "body");
                assert_eq!(note.version, INITIAL_VERSION);
                assert_eq!(note.owner_id, "alice");
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_matching_version_increments_by_one() {
        let patch = NotePatch {
            title: Some("Groceries v2".to_string()),
            ..Default::default()
        };
        let plan = apply_update(Some(stored(3)), "n1", "alice", patch, Some(3), Utc::now()).unwrap();
        match plan {
            UpdatePlan::Apply { note, read_version } => {
                assert_eq!(read_version, 3);
                assert_eq!(note.version, 4);
                assert_eq!(note.title, "Groceries v2");
                assert_eq!(note.content, "milk");
                assert_eq!(note.folder_id.as_deref(), Some("f1"));
            }
            other => panic!("expected apply, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_version_is_rejected() {
        let err = apply_update(
            Some(stored(4)),
            "n1",
            "alice",
            NotePatch::default(),
            Some(3),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                expected: 3,
                current: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_omitted_version_is_last_write_wins() {
        let patch = NotePatch {
            content: Some("eggs".to_string()),
            ..Default::default()
        };
        let plan = apply_update(Some(stored(9)), "n1", "alice", patch, None, Utc::now()).unwrap();
        assert_eq!(plan.note().version, 10);
        assert_eq!(plan.note().content, "eggs");
    }

    #[test]
    fn test_explicit_null_folder_unfiles() {
        let patch = NotePatch {
            folder_id: Some(None),
            ..Default::default()
        };
        let plan = apply_update(Some(stored(1)), "n1", "alice", patch, None, Utc::now()).unwrap();
        assert_eq!(plan.note().folder_id, None);
    }
}
