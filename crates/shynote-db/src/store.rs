//! PostgreSQL implementation of the record store.
//!
//! Every engine operation maps to one database transaction. Owner-agnostic
//! lookups lock the row they find (`FOR UPDATE`) so a concurrent writer on
//! the same id waits for this transaction instead of racing it; the
//! versioned `UPDATE ... WHERE version = $n` is the final backstop.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::trace;

use shynote_core::{Error, Folder, Note, Page, RecordKind, RecordStore, Result, StoreTx};

const NOTE_COLUMNS: &str = "id, owner_id, title, content, folder_id, version, is_pinned, \
                            is_shared, share_id, created_at, updated_at";

const FOLDER_COLUMNS: &str = "id, owner_id, name";

/// PostgreSQL record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Pool<Postgres>,
}

impl PgRecordStore {
    /// Create a new PgRecordStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<PgStoreTx> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(PgStoreTx { tx })
    }
}

/// An open PostgreSQL transaction. Rolled back on drop unless committed.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

fn note_from_row(r: &PgRow) -> Note {
    Note {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        title: r.get("title"),
        content: r.get("content"),
        folder_id: r.get("folder_id"),
        version: r.get("version"),
        is_pinned: r.get("is_pinned"),
        is_shared: r.get("is_shared"),
        share_id: r.get("share_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn folder_from_row(r: &PgRow) -> Folder {
    Folder {
        id: r.get("id"),
        owner_id: r.get("owner_id"),
        name: r.get("name"),
    }
}

/// Map a unique violation (SQLSTATE 23505) on `id` or `share_id` to an
/// identity conflict; everything else stays a database error.
fn write_error(kind: RecordKind, id: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return Error::IdentityConflict {
                    kind,
                    id: id.to_string(),
                };
            }
        }
        Error::Database(e)
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn find_note(&mut self, id: &str) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn find_note_for_owner(&mut self, id: &str, owner_id: &str) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND owner_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn find_shared_note(&mut self, share_id: &str) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes WHERE share_id = $1"
        ))
        .bind(share_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(note_from_row))
    }

    async fn find_folder(&mut self, id: &str) -> Result<Option<Folder>> {
        let row = sqlx::query(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(folder_from_row))
    }

    async fn find_folder_for_owner(
        &mut self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<Folder>> {
        let row = sqlx::query(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE id = $1 AND owner_id = $2 FOR UPDATE"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(folder_from_row))
    }

    async fn list_notes(
        &mut self,
        owner_id: &str,
        folder_id: Option<&str>,
        page: Option<Page>,
    ) -> Result<Vec<Note>> {
        // LIMIT NULL is unbounded.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE owner_id = $1
              AND ($2::text IS NULL OR folder_id = $2)
            ORDER BY updated_at DESC, id ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(owner_id)
        .bind(folder_id)
        .bind(page.map(|p| p.limit))
        .bind(page.map(|p| p.offset).unwrap_or(0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn list_folders(&mut self, owner_id: &str, page: Option<Page>) -> Result<Vec<Folder>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {FOLDER_COLUMNS}
            FROM folders
            WHERE owner_id = $1
            ORDER BY name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(page.map(|p| p.limit))
        .bind(page.map(|p| p.offset).unwrap_or(0))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(folder_from_row).collect())
    }

    async fn note_ids(&mut self, owner_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM notes WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(ids.into_iter().collect())
    }

    async fn folder_ids(&mut self, owner_id: &str) -> Result<HashSet<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM folders WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_note(&mut self, note: &Note) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notes (id, owner_id, title, content, folder_id, version, is_pinned,
                               is_shared, share_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&note.id)
        .bind(&note.owner_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.folder_id)
        .bind(note.version)
        .bind(note.is_pinned)
        .bind(note.is_shared)
        .bind(&note.share_id)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error(RecordKind::Note, &note.id))?;

        trace!(
            subsystem = "database",
            component = "record_store",
            op = "insert_note",
            note_id = %note.id,
            "Inserted note row"
        );
        Ok(())
    }

    async fn insert_folder(&mut self, folder: &Folder) -> Result<()> {
        sqlx::query("INSERT INTO folders (id, owner_id, name) VALUES ($1, $2, $3)")
            .bind(&folder.id)
            .bind(&folder.owner_id)
            .bind(&folder.name)
            .execute(&mut *self.tx)
            .await
            .map_err(write_error(RecordKind::Folder, &folder.id))?;
        Ok(())
    }

    async fn update_note(&mut self, note: &Note, read_version: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notes
            SET title = $1, content = $2, folder_id = $3, version = $4, is_pinned = $5,
                is_shared = $6, share_id = $7, updated_at = $8
            WHERE id = $9 AND owner_id = $10 AND version = $11
            "#,
        )
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.folder_id)
        .bind(note.version)
        .bind(note.is_pinned)
        .bind(note.is_shared)
        .bind(&note.share_id)
        .bind(note.updated_at)
        .bind(&note.id)
        .bind(&note.owner_id)
        .bind(read_version)
        .execute(&mut *self.tx)
        .await
        .map_err(write_error(RecordKind::Note, &note.id))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_folder(&mut self, folder: &Folder) -> Result<bool> {
        let result = sqlx::query("UPDATE folders SET name = $1 WHERE id = $2 AND owner_id = $3")
            .bind(&folder.name)
            .bind(&folder.id)
            .bind(&folder.owner_id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_note(&mut self, id: &str, owner_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_notes_in_folder(&mut self, folder_id: &str, owner_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM notes WHERE folder_id = $1 AND owner_id = $2")
            .bind(folder_id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn delete_folder(&mut self, id: &str, owner_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(Error::Database)
    }
}
