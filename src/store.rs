//! Local record store and persisted settings.
//!
//! [`LocalRecordStore`] owns all reads and writes against the `records` and
//! `settings` tables. Records are returned in insertion order. The two
//! persisted settings (the debug-panel flag and the last-viewed pointer)
//! live under fixed keys in the `settings` table so callers get an injected
//! store rather than process-wide mutable state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{content_hash, AssessmentData, AssessmentRecord, LastViewed};

const KEY_DEBUG_PANEL: &str = "debug_panel_visible";
const KEY_LAST_VIEWED: &str = "last_viewed";

pub struct LocalRecordStore {
    pool: SqlitePool,
}

impl LocalRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create a new pending record from form data.
    ///
    /// Assigns a fresh local id and creation timestamp; the record starts
    /// with `synced = false` and no remote id.
    pub async fn create(&self, data: AssessmentData) -> Result<AssessmentRecord> {
        let record = AssessmentRecord {
            local_id: Uuid::new_v4().to_string(),
            remote_id: None,
            synced: false,
            created_at: Utc::now(),
            data,
        };

        sqlx::query(
            "INSERT INTO records (local_id, remote_id, synced, created_at, data_json, content_hash) \
             VALUES (?, NULL, 0, ?, ?, ?)",
        )
        .bind(&record.local_id)
        .bind(record.created_at.timestamp())
        .bind(serde_json::to_string(&record.data)?)
        .bind(content_hash(&record.data))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// All records, in insertion order.
    pub async fn get_all(&self) -> Result<Vec<AssessmentRecord>> {
        let rows = sqlx::query(
            "SELECT local_id, remote_id, synced, created_at, data_json \
             FROM records ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    /// Records not yet confirmed written to the remote store, in insertion order.
    pub async fn get_pending(&self) -> Result<Vec<AssessmentRecord>> {
        let rows = sqlx::query(
            "SELECT local_id, remote_id, synced, created_at, data_json \
             FROM records WHERE synced = 0 ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    pub async fn get(&self, local_id: &str) -> Result<Option<AssessmentRecord>> {
        let row = sqlx::query(
            "SELECT local_id, remote_id, synced, created_at, data_json \
             FROM records WHERE local_id = ?",
        )
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    /// Replace a record's form data.
    ///
    /// Idempotent: writing identical data changes nothing. When the content
    /// actually changed, the record drops back to pending so the next sync
    /// picks it up.
    pub async fn update_data(&self, local_id: &str, data: &AssessmentData) -> Result<()> {
        let new_hash = content_hash(data);

        let old_hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM records WHERE local_id = ?")
                .bind(local_id)
                .fetch_optional(&self.pool)
                .await?;

        match old_hash {
            None => anyhow::bail!("Record not found: {}", local_id),
            Some(h) if h == new_hash => Ok(()),
            Some(_) => {
                sqlx::query(
                    "UPDATE records SET data_json = ?, content_hash = ?, synced = 0 \
                     WHERE local_id = ?",
                )
                .bind(serde_json::to_string(data)?)
                .bind(new_hash)
                .bind(local_id)
                .execute(&self.pool)
                .await?;
                Ok(())
            }
        }
    }

    /// Record the remote document id without touching the synced flag.
    ///
    /// Used when a record's document was written but image uploads are
    /// still outstanding: the next sync must update that same document,
    /// not create a second one.
    pub async fn set_remote_id(&self, local_id: &str, remote_id: &str) -> Result<()> {
        sqlx::query("UPDATE records SET remote_id = ? WHERE local_id = ?")
            .bind(remote_id)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip a record to synced after a confirmed remote write.
    ///
    /// This is the only path that sets `synced = true`, and it always
    /// records the remote id alongside.
    pub async fn mark_synced(&self, local_id: &str, remote_id: &str) -> Result<()> {
        sqlx::query("UPDATE records SET synced = 1, remote_id = ? WHERE local_id = ?")
            .bind(remote_id)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a record, clearing the last-viewed pointer if it matched.
    ///
    /// The pointer matches by local id or by creation timestamp; either way
    /// it is cleared so it never dangles. Idempotent on repeated calls.
    pub async fn delete(&self, local_id: &str) -> Result<()> {
        let record = self.get(local_id).await?;

        sqlx::query("DELETE FROM records WHERE local_id = ?")
            .bind(local_id)
            .execute(&self.pool)
            .await?;

        if let Some(record) = record {
            if let Some(pointer) = self.last_viewed().await? {
                if pointer.local_id == record.local_id || pointer.created_at == record.created_at {
                    self.clear_last_viewed().await?;
                }
            }
        }

        Ok(())
    }

    // ─── Settings ───────────────────────────────────────────────────

    /// Whether the debug panel is shown. Defaults to hidden.
    pub async fn debug_panel_visible(&self) -> Result<bool> {
        Ok(self.get_setting(KEY_DEBUG_PANEL).await?.as_deref() == Some("true"))
    }

    pub async fn set_debug_panel_visible(&self, visible: bool) -> Result<()> {
        self.put_setting(KEY_DEBUG_PANEL, if visible { "true" } else { "false" })
            .await
    }

    pub async fn last_viewed(&self) -> Result<Option<LastViewed>> {
        // Tolerant parse: a corrupt pointer reads as absent.
        Ok(self
            .get_setting(KEY_LAST_VIEWED)
            .await?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    pub async fn set_last_viewed(&self, local_id: &str, created_at: DateTime<Utc>) -> Result<()> {
        let pointer = LastViewed {
            local_id: local_id.to_string(),
            created_at,
        };
        self.put_setting(KEY_LAST_VIEWED, &serde_json::to_string(&pointer)?)
            .await
    }

    pub async fn clear_last_viewed(&self) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(KEY_LAST_VIEWED)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AssessmentRecord> {
    let created_at_ts: i64 = row.get("created_at");
    let data_json: String = row.get("data_json");

    Ok(AssessmentRecord {
        local_id: row.get("local_id"),
        remote_id: row.get("remote_id"),
        synced: row.get::<i64, _>("synced") != 0,
        created_at: DateTime::from_timestamp(created_at_ts, 0).unwrap_or(DateTime::<Utc>::MIN_UTC),
        // Tolerant parse: a corrupt payload renders as an empty form
        // rather than wedging every listing.
        data: serde_json::from_str(&data_json).unwrap_or_default(),
    })
}
