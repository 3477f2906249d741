//! Record-level CLI commands: import, list, show, delete, settings,
//! drawing normalization.

use std::path::Path;

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::drawing::DrawingPayload;
use crate::models::AssessmentData;
use crate::store::LocalRecordStore;

/// `fieldval import <path>` — create pending records from captured JSON.
///
/// Accepts a single `.json` file or a directory, which is walked for
/// `*.json` files. Each file holds one record's form data. A file that
/// fails to parse fails the command: imports are explicit user actions and
/// silently skipping a capture would lose field work.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    let files: Vec<std::path::PathBuf> = if path.is_dir() {
        let mut found: Vec<_> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
            .collect();
        found.sort();
        found
    } else {
        vec![path.to_path_buf()]
    };

    if files.is_empty() {
        bail!("No .json files found under {}", path.display());
    }

    let mut imported = 0u64;
    for file in &files {
        let raw = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let data: AssessmentData = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid assessment data in {}", file.display()))?;

        let record = store.create(data).await?;
        println!("  {}  {}", record.local_id, file.display());
        imported += 1;
    }

    println!("imported: {} record(s)", imported);
    println!("ok");

    store.pool().close().await;
    Ok(())
}

/// `fieldval list` — every record with its sync status.
pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    let records = store.get_all().await?;
    if records.is_empty() {
        println!("No records.");
    } else {
        for record in &records {
            let status = if record.synced { "synced" } else { "pending" };
            let owner = &record.data.owner_details.owner;
            println!(
                "{}  {}  {}  {}",
                record.local_id,
                record.created_at.format("%Y-%m-%d %H:%M"),
                status,
                if owner.is_empty() { "(no owner)" } else { owner },
            );
        }
        let pending = records.iter().filter(|r| !r.synced).count();
        println!("{} record(s), {} pending", records.len(), pending);
    }

    store.pool().close().await;
    Ok(())
}

/// `fieldval show <local-id>` — print one record and remember it as last
/// viewed.
pub async fn run_show(config: &Config, local_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    let record = store
        .get(local_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Record not found: {}", local_id))?;

    store
        .set_last_viewed(&record.local_id, record.created_at)
        .await?;

    println!("Record {}", record.local_id);
    println!("  created: {}", record.created_at.to_rfc3339());
    println!("  synced: {}", record.synced);
    if let Some(remote_id) = &record.remote_id {
        println!("  remote id: {}", remote_id);
    }
    println!("{}", serde_json::to_string_pretty(&record.data)?);

    store.pool().close().await;
    Ok(())
}

/// `fieldval delete <local-id>`.
pub async fn run_delete(config: &Config, local_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    if store.get(local_id).await?.is_none() {
        bail!("Record not found: {}", local_id);
    }
    store.delete(local_id).await?;
    println!("deleted {}", local_id);
    println!("ok");

    store.pool().close().await;
    Ok(())
}

/// `fieldval settings debug [on|off|show]`.
pub async fn run_settings_debug(config: &Config, action: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    match action {
        "on" => {
            store.set_debug_panel_visible(true).await?;
            println!("debug panel: visible");
        }
        "off" => {
            store.set_debug_panel_visible(false).await?;
            println!("debug panel: hidden");
        }
        "show" => {
            let visible = store.debug_panel_visible().await?;
            println!(
                "debug panel: {}",
                if visible { "visible" } else { "hidden" }
            );
        }
        other => bail!("Unknown settings action: '{}'. Use on, off, or show", other),
    }

    store.pool().close().await;
    Ok(())
}

/// `fieldval drawing normalize <input> <output>` — load a drawing payload
/// in any accepted shape (canonical, bare array, legacy `paths`) and write
/// the canonical form.
pub fn run_drawing_normalize(input: &Path, output: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let payload = DrawingPayload::from_json(&raw);

    std::fs::write(output, payload.to_json())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("drawing normalize");
    println!("  shapes: {}", payload.drawings.len());
    println!("  images: {}", payload.images.len());
    println!("ok");
    Ok(())
}
