//! Raw note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;

use notecurate_core::{Error, RawNote, RawNoteRepository, RawNoteSummary, Result};

/// SQLite implementation of RawNoteRepository.
#[derive(Debug, Clone)]
pub struct SqliteRawNoteRepository {
    pool: Pool<Sqlite>,
}

impl SqliteRawNoteRepository {
    /// Create a new SqliteRawNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

fn row_to_raw_note(row: &SqliteRow) -> RawNote {
    RawNote {
        id: row.get("id"),
        value: row.get("value"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl RawNoteRepository for SqliteRawNoteRepository {
    async fn insert_many(&self, values: Vec<String>) -> Result<Vec<i64>> {
        if values.is_empty() {
            return Ok(vec![]);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(values.len());

        for value in &values {
            let id = sqlx::query("INSERT INTO raw_note (value, created_at) VALUES (?1, ?2)")
                .bind(value)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?
                .last_insert_rowid();
            ids.push(id);
        }

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "raw_notes",
            op = "insert_many",
            result_count = ids.len(),
            "Inserted raw notes"
        );
        Ok(ids)
    }

    async fn get(&self, id: i64) -> Result<RawNote> {
        let row = sqlx::query(
            "SELECT id, value, created_at, updated_at FROM raw_note WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::RawNoteNotFound(id))?;

        Ok(row_to_raw_note(&row))
    }

    async fn list(&self) -> Result<Vec<RawNoteSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                r.id,
                r.value,
                r.created_at,
                EXISTS (SELECT 1 FROM raw_note_to_note l WHERE l.raw_note_id = r.id) AS enriched
            FROM raw_note r
            ORDER BY r.created_at DESC, r.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let notes = rows
            .into_iter()
            .map(|row| RawNoteSummary {
                id: row.get("id"),
                value: row.get("value"),
                created_at: row.get("created_at"),
                enriched: row.get::<i64, _>("enriched") != 0,
            })
            .collect();

        Ok(notes)
    }

    async fn list_unenriched(&self) -> Result<Vec<RawNote>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.value, r.created_at, r.updated_at
            FROM raw_note r
            LEFT JOIN raw_note_to_note l ON l.raw_note_id = r.id
            WHERE l.raw_note_id IS NULL
            ORDER BY r.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_raw_note).collect())
    }

    async fn is_enriched(&self, id: i64) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM raw_note_to_note WHERE raw_note_id = ?1")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count > 0)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM raw_note WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::RawNoteNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use notecurate_core::{NoteInput, NoteRepository};

    fn note(description: &str) -> NoteInput {
        NoteInput {
            description: description.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::connect_in_memory().await.unwrap();
        let ids = db
            .raw_notes
            .insert_many(vec!["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let raw = db.raw_notes.get(ids[1]).await.unwrap();
        assert_eq!(raw.value, "second");
        assert!(raw.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_insert_empty_batch() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(db.raw_notes.insert_many(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = Database::connect_in_memory().await.unwrap();
        let err = db.raw_notes.get(42).await.unwrap_err();
        assert!(matches!(err, Error::RawNoteNotFound(42)));
    }

    #[tokio::test]
    async fn test_enrichment_state() {
        let db = Database::connect_in_memory().await.unwrap();
        let ids = db
            .raw_notes
            .insert_many(vec!["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        db.notes.insert_for_raw(ids[0], note("a")).await.unwrap();

        assert!(db.raw_notes.is_enriched(ids[0]).await.unwrap());
        assert!(!db.raw_notes.is_enriched(ids[1]).await.unwrap());

        let pending: Vec<_> = db
            .raw_notes
            .list_unenriched()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(pending, vec![ids[1]]);

        let listed = db.raw_notes.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        let enriched: Vec<_> = listed.iter().filter(|r| r.enriched).map(|r| r.id).collect();
        assert_eq!(enriched, vec![ids[0]]);
    }

    #[tokio::test]
    async fn test_delete_cascades_links() {
        let db = Database::connect_in_memory().await.unwrap();
        let ids = db.raw_notes.insert_many(vec!["a".to_string()]).await.unwrap();
        let note_id = db.notes.insert_for_raw(ids[0], note("a")).await.unwrap();

        db.raw_notes.delete(ids[0]).await.unwrap();

        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_note_to_note")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(links, 0);
        assert!(db.notes.get(note_id).await.is_ok());
        assert!(matches!(
            db.raw_notes.delete(ids[0]).await,
            Err(Error::RawNoteNotFound(_))
        ));
    }
}
