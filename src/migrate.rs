use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Assessment records. The form payload lives in data_json as one JSON
    // object; content_hash lets updates detect real changes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            local_id TEXT PRIMARY KEY,
            remote_id TEXT,
            synced INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            data_json TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Key/value settings: debug panel flag, last-viewed pointer.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_synced ON records(synced)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
