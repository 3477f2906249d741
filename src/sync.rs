//! Sync pipeline orchestration.
//!
//! Moves locally captured assessment records into the remote document store,
//! normalizing embedded image references (local path → uploaded URL) on the
//! way. The batch loop is strictly sequential and isolates failures per
//! record: one record's error is recorded and the loop moves on, leaving
//! that record pending for the next run.
//!
//! Two image policies live here:
//! - [`SyncManager::upload_images_only`] (the explicit "convert" action) is
//!   all-or-nothing: any single upload failure fails the call.
//! - [`SyncManager::sync_property_data`] is best-effort per image: an image
//!   that fails to upload keeps its original local reference untouched and
//!   the document is still written. The record stays pending in that case,
//!   so the failed uploads retry on the next run against the same remote
//!   document.

use anyhow::{bail, Result};
use chrono::Utc;

use crate::config::Config;
use crate::db;
use crate::models::{AssessmentData, AssessmentRecord, RecordSyncResult};
use crate::progress::{ProgressMode, SyncProgressEvent, SyncProgressReporter};
use crate::remote::{self, DocumentPayload, DocumentStore, FileStore, HttpBackend, RemoteDocument};
use crate::store::LocalRecordStore;

/// Is this reference already a durable remote URL?
fn is_remote_url(reference: &str) -> bool {
    reference.starts_with("http")
}

pub struct SyncManager<'a> {
    store: &'a LocalRecordStore,
    documents: &'a dyn DocumentStore,
    files: &'a dyn FileStore,
}

impl<'a> SyncManager<'a> {
    pub fn new(
        store: &'a LocalRecordStore,
        documents: &'a dyn DocumentStore,
        files: &'a dyn FileStore,
    ) -> Self {
        Self {
            store,
            documents,
            files,
        }
    }

    /// Upload every local image reference, passing remote URLs through.
    ///
    /// Output order and length match the input 1:1. Any single upload
    /// failure fails the whole call; this backs the explicit `convert`
    /// action where partial conversion would be surprising.
    pub async fn upload_images_only(&self, paths: &[String]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            if is_remote_url(path) {
                out.push(path.clone());
            } else {
                out.push(self.files.upload(path).await?);
            }
        }
        Ok(out)
    }

    /// Best-effort image normalization for one record's data.
    ///
    /// Each local reference is uploaded independently; on failure the
    /// original reference stays in place, so no image is ever dropped.
    /// Returns the normalized data and the number of failed uploads.
    async fn normalize_images(&self, data: &AssessmentData) -> (AssessmentData, usize) {
        let mut normalized = data.clone();
        let mut failures = 0;

        for image in normalized.building_location.building_images.iter_mut() {
            if !is_remote_url(image) {
                match self.files.upload(image).await {
                    Ok(url) => *image = url,
                    Err(_) => failures += 1,
                }
            }
        }

        for item in normalized.property_appraisal.gallery.iter_mut() {
            if !is_remote_url(&item.image) {
                match self.files.upload(&item.image).await {
                    Ok(url) => item.image = url,
                    Err(_) => failures += 1,
                }
            }
        }

        (normalized, failures)
    }

    /// Sync one record: normalize images, stamp `synced_at`, write the
    /// remote document (create on first sync, update after).
    ///
    /// Emits a stage event through `reporter` at each major step. Returns
    /// the remote document, the normalized data so the caller can persist
    /// the uploaded URLs locally, and the number of failed uploads.
    pub async fn sync_property_data(
        &self,
        record: &AssessmentRecord,
        user_id: &str,
        reporter: &dyn SyncProgressReporter,
    ) -> Result<(RemoteDocument, AssessmentData, usize)> {
        reporter.report(SyncProgressEvent::Stage {
            stage: "uploading images".to_string(),
            message: format!(
                "{} building, {} gallery",
                record.data.building_location.building_images.len(),
                record.data.property_appraisal.gallery.len()
            ),
        });
        let (normalized, upload_failures) = self.normalize_images(&record.data).await;
        if upload_failures > 0 {
            reporter.report(SyncProgressEvent::Stage {
                stage: "uploading images".to_string(),
                message: format!("{} upload(s) failed, keeping local paths", upload_failures),
            });
        }

        let payload = build_payload(record, &normalized, user_id)?;

        reporter.report(SyncProgressEvent::Stage {
            stage: "writing document".to_string(),
            message: record
                .remote_id
                .clone()
                .unwrap_or_else(|| "new document".to_string()),
        });
        let doc = match &record.remote_id {
            Some(remote_id) => self.documents.update(remote_id, &payload).await?,
            None => self.documents.create(&payload).await?,
        };

        Ok((doc, normalized, upload_failures))
    }

    /// Sync every pending record, sequentially and independently.
    ///
    /// Fails up front when `user_id` is empty — no write can succeed
    /// without an identity. Afterwards, one result entry per attempted
    /// record, in read order; a failed record keeps `synced = false` and
    /// stays eligible for the next run.
    pub async fn sync_pending(
        &self,
        user_id: &str,
        limit: Option<usize>,
        reporter: &dyn SyncProgressReporter,
    ) -> Result<Vec<RecordSyncResult>> {
        if user_id.trim().is_empty() {
            bail!("Not signed in: no user id configured (set sync.user_id or pass --user)");
        }

        let mut pending = self.store.get_pending().await?;
        if let Some(lim) = limit {
            pending.truncate(lim);
        }
        let total = pending.len() as u64;
        let mut results = Vec::with_capacity(pending.len());

        for (i, record) in pending.iter().enumerate() {
            reporter.report(SyncProgressEvent::RecordStarted {
                local_id: record.local_id.clone(),
                n: (i + 1) as u64,
                total,
            });

            let outcome = self.sync_one(record, user_id, reporter).await;

            let result = match outcome {
                Ok(()) => RecordSyncResult {
                    local_id: record.local_id.clone(),
                    ok: true,
                    error: None,
                },
                Err(e) => RecordSyncResult {
                    local_id: record.local_id.clone(),
                    ok: false,
                    error: Some(format!("{:#}", e)),
                },
            };

            reporter.report(SyncProgressEvent::RecordFinished {
                local_id: record.local_id.clone(),
                ok: result.ok,
            });
            results.push(result);
        }

        Ok(results)
    }

    /// One record's full sync: remote write, then persist normalized image
    /// URLs locally, then flip the synced flag.
    ///
    /// When any image upload failed, the remote id is recorded but the
    /// record is reported failed and left pending, so the next run retries
    /// the remaining uploads and updates the same document.
    async fn sync_one(
        &self,
        record: &AssessmentRecord,
        user_id: &str,
        reporter: &dyn SyncProgressReporter,
    ) -> Result<()> {
        let (doc, normalized, upload_failures) =
            self.sync_property_data(record, user_id, reporter).await?;

        if normalized != record.data {
            self.store.update_data(&record.local_id, &normalized).await?;
        }
        if upload_failures > 0 {
            self.store
                .set_remote_id(&record.local_id, &doc.remote_id)
                .await?;
            bail!(
                "{} image upload(s) failed; record kept pending",
                upload_failures
            );
        }
        self.store.mark_synced(&record.local_id, &doc.remote_id).await?;

        Ok(())
    }
}

/// Serialize each section to its JSON string field and stamp `synced_at`.
fn build_payload(
    record: &AssessmentRecord,
    data: &AssessmentData,
    user_id: &str,
) -> Result<DocumentPayload> {
    Ok(DocumentPayload {
        local_id: record.local_id.clone(),
        user_id: user_id.to_string(),
        created_at: record.created_at.to_rfc3339(),
        synced_at: Utc::now().to_rfc3339(),
        owner_details: serde_json::to_string(&data.owner_details)?,
        building_location: serde_json::to_string(&data.building_location)?,
        land_reference: serde_json::to_string(&data.land_reference)?,
        general_description: serde_json::to_string(&data.general_description)?,
        structural_materials: serde_json::to_string(&data.structural_materials)?,
        property_appraisal: serde_json::to_string(&data.property_appraisal)?,
        property_assessment: serde_json::to_string(&data.property_assessment)?,
        additional_items: serde_json::to_string(&data.additional_items)?,
    })
}

/// `fieldval sync` — push all pending records.
pub async fn run_sync(
    config: &Config,
    user: Option<String>,
    dry_run: bool,
    limit: Option<usize>,
    progress: ProgressMode,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    let user_id = match user.or_else(|| config.sync.user_id.clone()) {
        Some(u) if !u.trim().is_empty() => u,
        _ => bail!("Not signed in: no user id configured (set sync.user_id or pass --user)"),
    };

    let mut pending = store.get_pending().await?;
    if let Some(lim) = limit {
        pending.truncate(lim);
    }

    if dry_run {
        // Counts only; nothing is uploaded or written.
        println!("sync (dry-run)");
        println!("  pending records: {}", pending.len());
        let images: usize = pending
            .iter()
            .map(|r| {
                r.data.building_location.building_images.len()
                    + r.data.property_appraisal.gallery.len()
            })
            .sum();
        println!("  image references: {}", images);
        store.pool().close().await;
        return Ok(());
    }

    let remote = config.remote()?;
    let backend = HttpBackend::new(remote, &config.sync)?;
    let manager = SyncManager::new(&store, &backend, &backend);
    let reporter = progress.reporter();

    let results = manager
        .sync_pending(&user_id, limit, reporter.as_ref())
        .await?;

    let ok = results.iter().filter(|r| r.ok).count();
    let fail = results.len() - ok;

    println!("sync");
    println!("  attempted: {}", results.len());
    println!("  ok: {}", ok);
    println!("  failed: {}", fail);
    for result in results.iter().filter(|r| !r.ok) {
        println!(
            "  {}  {}",
            result.local_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("ok");

    store.pool().close().await;
    Ok(())
}

/// `fieldval remote show <remote-id>` — fetch one synced document and print
/// its reassembled form data.
pub async fn run_remote_show(config: &Config, remote_id: &str) -> Result<()> {
    let remote = config.remote()?;
    let backend = HttpBackend::new(remote, &config.sync)?;

    let doc = backend.get(remote_id).await?;
    let data = remote::document_data(&doc);

    println!("Document {}", doc.remote_id);
    println!("  created: {}", doc.created_at);
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// `fieldval remote list` — list synced documents with their owners.
///
/// Filters to the configured user (or `--user`); lists everything when
/// neither is set.
pub async fn run_remote_list(config: &Config, user: Option<String>) -> Result<()> {
    let remote = config.remote()?;
    let backend = HttpBackend::new(remote, &config.sync)?;

    let filter = user.or_else(|| config.sync.user_id.clone());
    let docs = backend.list(filter.as_deref()).await?;

    for doc in &docs {
        let data = remote::document_data(doc);
        let owner = &data.owner_details.owner;
        println!(
            "{}  {}  {}",
            doc.remote_id,
            doc.created_at,
            if owner.is_empty() { "(no owner)" } else { owner },
        );
    }
    println!("{} document(s)", docs.len());
    println!("ok");
    Ok(())
}

/// `fieldval convert <local-id>` — upload every local image reference of one
/// record, all-or-nothing, and persist the resulting URLs.
pub async fn run_convert(config: &Config, local_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = LocalRecordStore::new(pool);

    let record = store
        .get(local_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Record not found: {}", local_id))?;

    let remote = config.remote()?;
    let backend = HttpBackend::new(remote, &config.sync)?;
    let manager = SyncManager::new(&store, &backend, &backend);

    let mut data = record.data.clone();
    data.building_location.building_images = manager
        .upload_images_only(&data.building_location.building_images)
        .await?;
    let gallery_paths: Vec<String> = data
        .property_appraisal
        .gallery
        .iter()
        .map(|g| g.image.clone())
        .collect();
    let gallery_urls = manager.upload_images_only(&gallery_paths).await?;
    for (item, url) in data.property_appraisal.gallery.iter_mut().zip(gallery_urls) {
        item.image = url;
    }

    store.update_data(local_id, &data).await?;

    let converted = data.building_location.building_images.len()
        + data.property_appraisal.gallery.len();
    println!("convert {}", local_id);
    println!("  image references now remote: {}", converted);
    println!("ok");

    store.pool().close().await;
    Ok(())
}
