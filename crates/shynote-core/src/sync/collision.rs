//! Collision guard: decides who owns a client-supplied record id.
//!
//! Lookups here are deliberately owner-agnostic. Filtering by owner in the
//! query would make another tenant's record invisible, and a write with the
//! same id would then either fail deep in the store or attach to the wrong
//! account.

use tracing::{debug, warn};

use crate::error::{Error, RecordKind, Result};
use crate::models::{Folder, Note, Owned};
use crate::traits::StoreTx;

/// Ownership of a record id as seen by one caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity<T> {
    /// No record with this id exists anywhere.
    Fresh,
    /// The caller already owns a record with this id.
    OwnedByCaller(T),
    /// Another tenant owns a record with this id.
    OwnedByOther,
}

impl<T> Identity<T> {
    /// Collapse to the caller's existing record, turning a foreign owner
    /// into [`Error::IdentityConflict`].
    pub fn into_owned(self, kind: RecordKind, id: &str) -> Result<Option<T>> {
        match self {
            Identity::Fresh => Ok(None),
            Identity::OwnedByCaller(record) => Ok(Some(record)),
            Identity::OwnedByOther => Err(Error::IdentityConflict {
                kind,
                id: id.to_string(),
            }),
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Identity::Fresh)
    }
}

fn classify<T: Owned>(kind: RecordKind, id: &str, owner_id: &str, found: Option<T>) -> Identity<T> {
    match found {
        None => {
            debug!(
                subsystem = "sync",
                component = "collision_guard",
                kind = %kind,
                record_id = id,
                "Record id is fresh"
            );
            Identity::Fresh
        }
        Some(record) if record.owner_id() == owner_id => Identity::OwnedByCaller(record),
        Some(_) => {
            warn!(
                subsystem = "sync",
                component = "collision_guard",
                kind = %kind,
                record_id = id,
                owner_id,
                "Record id already belongs to another owner"
            );
            Identity::OwnedByOther
        }
    }
}

/// Resolve the ownership of a note id for `owner_id`.
pub async fn resolve_note<T>(tx: &mut T, id: &str, owner_id: &str) -> Result<Identity<Note>>
where
    T: StoreTx + ?Sized,
{
    let found = tx.find_note(id).await?;
    Ok(classify(RecordKind::Note, id, owner_id, found))
}

/// Resolve the ownership of a folder id for `owner_id`.
pub async fn resolve_folder<T>(tx: &mut T, id: &str, owner_id: &str) -> Result<Identity<Folder>>
where
    T: StoreTx + ?Sized,
{
    let found = tx.find_folder(id).await?;
    Ok(classify(RecordKind::Folder, id, owner_id, found))
}

/// Check that `folder_id` names a folder the caller owns.
///
/// Used before filing a note; a missing or foreign folder is a validation
/// failure for the whole write.
pub async fn ensure_folder_owned<T>(tx: &mut T, folder_id: &str, owner_id: &str) -> Result<()>
where
    T: StoreTx + ?Sized,
{
    match tx.find_folder_for_owner(folder_id, owner_id).await? {
        Some(_) => Ok(()),
        None => Err(Error::Validation(format!(
            "folder {} does not exist for this owner",
            folder_id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_owned_maps_foreign_owner_to_conflict() {
        let identity: Identity<()> = Identity::OwnedByOther;
        let err = identity.into_owned(RecordKind::Note, "n1").unwrap_err();
        assert!(matches!(
            err,
            Error::IdentityConflict { kind: RecordKind::Note, ref id } if id == "n1"
        ));
    }

    #[test]
    fn test_into_owned_passes_through() {
        assert_eq!(
            Identity::<u8>::Fresh.into_owned(RecordKind::Folder, "f").unwrap(),
            None
        );
        assert_eq!(
            Identity::OwnedByCaller(7u8)
                .into_owned(RecordKind::Folder, "f")
                .unwrap(),
            Some(7)
        );
    }

    fn folder(owner: &str) -> Folder {
        Folder {
            id: "f".to_string(),
            owner_id: owner.to_string(),
            name: "Inbox".to_string(),
        }
    }

    #[test]
    fn test_classify_compares_owner() {
        assert!(classify::<Folder>(RecordKind::Folder, "f", "a", None).is_fresh());
        assert_eq!(
            classify(RecordKind::Folder, "f", "a", Some(folder("a"))),
            Identity::OwnedByCaller(folder("a"))
        );
        assert_eq!(
            classify(RecordKind::Folder, "f", "a", Some(folder("b"))),
            Identity::OwnedByOther
        );
    }
}
