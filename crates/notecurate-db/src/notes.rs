//! Structured note repository implementation.
//!
//! Notes are linked to the raw notes they were derived from through
//! `raw_note_to_note`; a link starts unconfirmed and is confirmed once a
//! human has reviewed the note.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite, Transaction};
use tracing::{debug, info};

use notecurate_core::defaults;
use notecurate_core::{
    Error, Note, NoteInput, NoteRepository, RawNote, Result, UnconfirmedNote, UnconfirmedPage,
};

const NOTE_COLUMNS: &str =
    "id, sector, location, lat, lng, date, time, description, event_type, created_at, updated_at";

/// SQLite implementation of NoteRepository.
#[derive(Debug, Clone)]
pub struct SqliteNoteRepository {
    pool: Pool<Sqlite>,
}

impl SqliteNoteRepository {
    /// Create a new SqliteNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn insert_tx(tx: &mut Transaction<'_, Sqlite>, input: &NoteInput) -> Result<i64> {
        let id = sqlx::query(
            r#"
            INSERT INTO note (sector, location, lat, lng, date, time, description, event_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&input.sector)
        .bind(&input.location)
        .bind(input.lat)
        .bind(input.lng)
        .bind(&input.date)
        .bind(&input.time)
        .bind(&input.description)
        .bind(&input.event_type)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .last_insert_rowid();
        Ok(id)
    }

    async fn update_tx(tx: &mut Transaction<'_, Sqlite>, id: i64, input: &NoteInput) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE note
            SET sector = ?1, location = ?2, lat = ?3, lng = ?4, date = ?5, time = ?6,
                description = ?7, event_type = ?8, updated_at = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&input.sector)
        .bind(&input.location)
        .bind(input.lat)
        .bind(input.lng)
        .bind(&input.date)
        .bind(&input.time)
        .bind(&input.description)
        .bind(&input.event_type)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    async fn exists(tx: &mut Transaction<'_, Sqlite>, table: &str, id: i64) -> Result<bool> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table);
        let count: i64 = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(count > 0)
    }
}

fn row_to_note(row: &SqliteRow) -> Note {
    Note {
        id: row.get("id"),
        sector: row.get("sector"),
        location: row.get("location"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        date: row.get("date"),
        time: row.get("time"),
        description: row.get("description"),
        event_type: row.get("event_type"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl NoteRepository for SqliteNoteRepository {
    async fn insert(&self, input: NoteInput) -> Result<i64> {
        input.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let id = Self::insert_tx(&mut tx, &input).await?;
        tx.commit().await.map_err(Error::Database)?;
        debug!(subsystem = "database", component = "notes", op = "insert", note_id = id, "Inserted note");
        Ok(id)
    }

    async fn insert_for_raw(&self, raw_note_id: i64, input: NoteInput) -> Result<i64> {
        input.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if !Self::exists(&mut tx, "raw_note", raw_note_id).await? {
            return Err(Error::RawNoteNotFound(raw_note_id));
        }
        let id = Self::insert_tx(&mut tx, &input).await?;
        sqlx::query(
            "INSERT INTO raw_note_to_note (raw_note_id, note_id, is_confirmed) VALUES (?1, ?2, 0)",
        )
        .bind(raw_note_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        debug!(
            subsystem = "database",
            component = "notes",
            op = "insert_for_raw",
            raw_note_id,
            note_id = id,
            "Inserted note for raw note"
        );
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Note> {
        let query = format!("SELECT {} FROM note WHERE id = ?1", NOTE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;
        Ok(row_to_note(&row))
    }

    async fn list(&self) -> Result<Vec<Note>> {
        let query = format!(
            "SELECT {} FROM note ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(rows.iter().map(row_to_note).collect())
    }

    async fn update(&self, id: i64, input: NoteInput) -> Result<()> {
        input.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        Self::update_tx(&mut tx, id, &input).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn link_raw(&self, raw_note_id: i64, note_id: i64, confirmed: bool) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        if !Self::exists(&mut tx, "raw_note", raw_note_id).await? {
            return Err(Error::RawNoteNotFound(raw_note_id));
        }
        if !Self::exists(&mut tx, "note", note_id).await? {
            return Err(Error::NoteNotFound(note_id));
        }

        sqlx::query(
            r#"
            INSERT INTO raw_note_to_note (raw_note_id, note_id, is_confirmed)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (raw_note_id, note_id) DO UPDATE SET is_confirmed = excluded.is_confirmed
            "#,
        )
        .bind(raw_note_id)
        .bind(note_id)
        .bind(confirmed)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn list_unconfirmed(&self, limit: i64, cursor: Option<i64>) -> Result<UnconfirmedPage> {
        let limit = limit.clamp(1, defaults::PAGE_LIMIT_MAX);

        // One row per note, paired with its lowest-id unconfirmed raw note.
        let rows = sqlx::query(
            r#"
            SELECT
                n.id, n.sector, n.location, n.lat, n.lng, n.date, n.time,
                n.description, n.event_type, n.created_at, n.updated_at,
                r.id AS raw_id,
                r.value AS raw_value,
                r.created_at AS raw_created_at,
                r.updated_at AS raw_updated_at
            FROM note n
            JOIN raw_note_to_note l ON l.note_id = n.id
            JOIN raw_note r ON r.id = l.raw_note_id
            WHERE l.is_confirmed = 0
              AND l.raw_note_id = (
                  SELECT MIN(l2.raw_note_id) FROM raw_note_to_note l2
                  WHERE l2.note_id = n.id AND l2.is_confirmed = 0
              )
              AND (?1 IS NULL OR n.id > ?1)
            ORDER BY n.id
            LIMIT ?2
            "#,
        )
        .bind(cursor)
        .bind(limit + 1)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let has_more = rows.len() as i64 > limit;
        let items: Vec<UnconfirmedNote> = rows
            .iter()
            .take(limit as usize)
            .map(|row| UnconfirmedNote {
                raw_note: RawNote {
                    id: row.get("raw_id"),
                    value: row.get("raw_value"),
                    created_at: row.get("raw_created_at"),
                    updated_at: row.get("raw_updated_at"),
                },
                note: row_to_note(row),
            })
            .collect();

        let next_cursor = if has_more {
            items.last().map(|item| item.note.id)
        } else {
            None
        };

        Ok(UnconfirmedPage {
            items,
            next_cursor,
            has_more,
        })
    }

    async fn update_and_confirm(&self, id: i64, input: NoteInput) -> Result<()> {
        input.validate()?;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        Self::update_tx(&mut tx, id, &input).await?;
        let confirmed = sqlx::query("UPDATE raw_note_to_note SET is_confirmed = 1 WHERE note_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?
            .rows_affected();

        tx.commit().await.map_err(Error::Database)?;
        info!(
            subsystem = "database",
            component = "notes",
            op = "update_and_confirm",
            note_id = id,
            result_count = confirmed,
            "Note confirmed"
        );
        Ok(())
    }
}
