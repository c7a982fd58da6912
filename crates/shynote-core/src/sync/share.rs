//! Share link derivation.
//!
//! A share id is `SHA-256(owner_id || note_id || salt)`, truncated to 16
//! bytes and laid out as a random (v4) UUID. The same owner, note and salt
//! always give the same id, so a retried toggle and a second server agree.

use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

use crate::config::ShareSalt;
use crate::defaults::SHARE_ID_DIGEST_PREFIX;
use crate::models::{Note, ShareState};

/// Derive the public share id of a note. Pure; touches no storage.
pub fn derive_share_id(owner_id: &str, note_id: &str, salt: &ShareSalt) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(note_id.as_bytes());
    hasher.update(salt.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; SHARE_ID_DIGEST_PREFIX];
    bytes.copy_from_slice(&digest[..SHARE_ID_DIGEST_PREFIX]);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// Flip the sharing flag of `note` in place.
///
/// Turning sharing off keeps the share id so a later toggle reuses the link.
pub fn toggle(note: &mut Note, salt: &ShareSalt) -> ShareState {
    if note.is_shared {
        note.is_shared = false;
    } else {
        if note.share_id.is_none() {
            note.share_id = Some(derive_share_id(&note.owner_id, &note.id, salt));
        }
        note.is_shared = true;
    }

    ShareState {
        is_shared: note.is_shared,
        share_id: note.share_id.clone().unwrap_or_default(),
    }
}

/// True if `share_id` has the shape of a derived id.
pub fn is_well_formed(share_id: &str) -> bool {
    Uuid::parse_str(share_id).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn salt() -> ShareSalt {
        ShareSalt::new("test-salt-0123456789").unwrap()
    }

    fn note() -> Note {
        let at = Utc::now();
        Note {
            id: "n1".to_string(),
            owner_id: "alice".to_string(),
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

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_share_id("alice", "n1", &salt());
        let b = derive_share_id("alice", "n1", &salt());
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_is_a_v4_uuid() {
        let id = derive_share_id("alice", "n1", &salt());
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert!(is_well_formed(&id));
    }

    #[test]
    fn test_derivation_depends_on_every_input() {
        let base = derive_share_id("alice", "n1", &salt());
        assert_ne!(base, derive_share_id("bob", "n1", &salt()));
        assert_ne!(base, derive_share_id("alice", "n2", &salt()));
        let other_salt = ShareSalt::new("another-secret-salt-value").unwrap();
        assert_ne!(base, derive_share_id("alice", "n1", &other_salt));
    }

    #[test]
    fn test_toggle_keeps_share_id() {
        let mut n = note();
        let on = toggle(&mut n, &salt());
        assert!(on.is_shared);

        let off = toggle(&mut n, &salt());
        assert!(!off.is_shared);
        assert_eq!(off.share_id, on.share_id);

        let again = toggle(&mut n, &salt());
        assert!(again.is_shared);
        assert_eq!(again.share_id, on.share_id);
    }

    #[test]
    fn test_toggle_never_rotates_existing_id() {
        let mut n = note();
        n.share_id = Some("legacy-id".to_string());
        let state = toggle(&mut n, &salt());
        assert_eq!(state.share_id, "legacy-id");
        assert!(!is_well_formed("legacy-id"));
    }
}
