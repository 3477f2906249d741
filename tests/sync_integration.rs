//! Integration tests for the sync pipeline.
//!
//! These run the real [`SyncManager`] and [`LocalRecordStore`] against
//! in-memory document and file stores, proving the per-record isolation,
//! image normalization, and failure-handling invariants end to end.

use fieldval::config::Config;
use fieldval::migrate;
use fieldval::models::{AssessmentData, GalleryItem};
use fieldval::progress::NoProgress;
use fieldval::remote::{document_data, DocumentStore, InMemoryDocumentStore, InMemoryFileStore};
use fieldval::store::LocalRecordStore;
use fieldval::sync::SyncManager;
use fieldval::{db, sync};
use tempfile::TempDir;

async fn test_store(tmp: &TempDir) -> LocalRecordStore {
    let config = Config::minimal(tmp.path().join("data").join("fieldval.sqlite"));
    migrate::run_migrations(&config).await.unwrap();
    LocalRecordStore::new(db::connect(&config).await.unwrap())
}

fn record_data(owner: &str, images: &[&str]) -> AssessmentData {
    let mut data = AssessmentData::default();
    data.owner_details.owner = owner.to_string();
    data.building_location.building_images =
        images.iter().map(|s| s.to_string()).collect();
    data
}

// ─── upload_images_only ─────────────────────────────────────────────

#[tokio::test]
async fn upload_images_only_preserves_order_and_passes_urls_through() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();
    let manager = SyncManager::new(&store, &docs, &files);

    let input = vec![
        "file:///a.png".to_string(),
        "https://cdn/b.png".to_string(),
        "/captures/c.jpg".to_string(),
    ];
    let output = manager.upload_images_only(&input).await.unwrap();

    assert_eq!(output.len(), 3);
    assert!(output[0].starts_with("https://files.example.com/"));
    assert_eq!(output[1], "https://cdn/b.png");
    assert!(output[2].ends_with("/c.jpg"));
    // Only the two local references hit the file store, in input order.
    assert_eq!(files.uploaded(), vec!["file:///a.png", "/captures/c.jpg"]);
}

#[tokio::test]
async fn upload_images_only_is_all_or_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();
    files.fail_on("broken");
    let manager = SyncManager::new(&store, &docs, &files);

    let input = vec![
        "file:///ok.png".to_string(),
        "file:///broken.png".to_string(),
    ];
    assert!(manager.upload_images_only(&input).await.is_err());
}

// ─── sync_pending ───────────────────────────────────────────────────

#[tokio::test]
async fn batch_isolates_one_failing_record() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    // Third record's payload will trip the document store.
    store.create(record_data("Alice", &[])).await.unwrap();
    store.create(record_data("Bob", &[])).await.unwrap();
    store.create(record_data("Mallory", &[])).await.unwrap();
    docs.fail_on("Mallory");

    let manager = SyncManager::new(&store, &docs, &files);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].ok);
    assert!(results[1].ok);
    assert!(!results[2].ok);
    assert!(results[2].error.is_some());
    assert_eq!(docs.len(), 2);

    // Exactly the two successes flipped to synced; the failure stays
    // pending with its flag untouched.
    let all = store.get_all().await.unwrap();
    assert_eq!(all.iter().filter(|r| r.synced).count(), 2);
    let pending = store.get_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].data.owner_details.owner, "Mallory");
    assert!(pending[0].remote_id.is_none());
}

#[tokio::test]
async fn failed_record_retries_on_next_run() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    store.create(record_data("Mallory", &[])).await.unwrap();
    docs.fail_on("Mallory");

    let manager = SyncManager::new(&store, &docs, &files);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert!(!results[0].ok);

    // Backend recovers; the same record syncs on the next run.
    let docs_ok = InMemoryDocumentStore::new();
    let manager = SyncManager::new(&store, &docs_ok, &files);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].ok);
    assert_eq!(docs_ok.len(), 1);
    assert!(store.get_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_user_fails_before_any_record() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    store.create(record_data("Alice", &[])).await.unwrap();
    store.create(record_data("Bob", &[])).await.unwrap();

    let manager = SyncManager::new(&store, &docs, &files);
    let err = manager
        .sync_pending("  ", None, &NoProgress)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Not signed in"));

    assert!(docs.is_empty());
    assert_eq!(store.get_pending().await.unwrap().len(), 2);
}

#[tokio::test]
async fn sync_respects_limit() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    for name in ["a", "b", "c"] {
        store.create(record_data(name, &[])).await.unwrap();
    }

    let manager = SyncManager::new(&store, &docs, &files);
    let results = manager
        .sync_pending("user-1", Some(2), &NoProgress)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(store.get_pending().await.unwrap().len(), 1);
}

// ─── image normalization during sync ────────────────────────────────

#[tokio::test]
async fn sync_normalizes_local_references_only() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    let mut data = record_data("Alice", &["file:///a.png", "https://cdn/b.png"]);
    data.property_appraisal.gallery.push(GalleryItem {
        image: "/captures/front.jpg".to_string(),
        caption: "front elevation".to_string(),
    });
    let record = store.create(data).await.unwrap();

    let manager = SyncManager::new(&store, &docs, &files);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert!(results[0].ok);

    let synced = store.get(&record.local_id).await.unwrap().unwrap();
    assert!(synced.synced);
    let images = &synced.data.building_location.building_images;
    assert_eq!(images.len(), 2);
    assert!(images[0].starts_with("https://files.example.com/"));
    assert_eq!(images[1], "https://cdn/b.png");
    assert!(synced.data.property_appraisal.gallery[0]
        .image
        .starts_with("https://files.example.com/"));
    // Caption survives normalization
    assert_eq!(
        synced.data.property_appraisal.gallery[0].caption,
        "front elevation"
    );
}

#[tokio::test]
async fn failed_upload_keeps_reference_and_record_pending() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();
    files.fail_on("broken");

    let record = store
        .create(record_data(
            "Alice",
            &["file:///broken.png", "file:///ok.png"],
        ))
        .await
        .unwrap();

    let manager = SyncManager::new(&store, &docs, &files);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();

    // Best-effort: the document is written with the mixed references and
    // nothing is dropped, but the record reports failure and stays
    // pending so the bad upload gets another chance.
    assert!(!results[0].ok);
    assert!(results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("image upload"));
    assert_eq!(docs.len(), 1);

    let local = store.get(&record.local_id).await.unwrap().unwrap();
    assert!(!local.synced);
    let remote_id = local.remote_id.clone().unwrap();
    let images = &local.data.building_location.building_images;
    assert_eq!(images.len(), 2);
    assert_eq!(images[0], "file:///broken.png");
    assert!(images[1].starts_with("https://files.example.com/"));

    // File store recovers: the next run uploads only the kept reference,
    // updates the same document, and marks the record synced.
    let files_ok = InMemoryFileStore::new();
    let manager = SyncManager::new(&store, &docs, &files_ok);
    let results = manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].ok);
    assert_eq!(docs.len(), 1);
    assert_eq!(files_ok.uploaded(), vec!["file:///broken.png"]);

    let local = store.get(&record.local_id).await.unwrap().unwrap();
    assert!(local.synced);
    assert_eq!(local.remote_id.as_deref(), Some(remote_id.as_str()));
    assert!(local.data.building_location.building_images[0]
        .starts_with("https://files.example.com/"));
}

#[tokio::test]
async fn second_sync_updates_existing_document() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    let record = store.create(record_data("Alice", &[])).await.unwrap();
    let manager = SyncManager::new(&store, &docs, &files);
    manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);

    let remote_id = store
        .get(&record.local_id)
        .await
        .unwrap()
        .unwrap()
        .remote_id
        .unwrap();

    // Edit the record; it drops back to pending and re-syncs as an update,
    // not a second document.
    let mut edited = record.data.clone();
    edited.owner_details.owner = "Alice B.".to_string();
    store.update_data(&record.local_id, &edited).await.unwrap();
    assert_eq!(store.get_pending().await.unwrap().len(), 1);

    manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);

    let doc = docs.get(&remote_id).await.unwrap();
    let owner_section = doc.data.get("owner_details").unwrap().as_str().unwrap();
    assert!(owner_section.contains("Alice B."));
}

#[tokio::test]
async fn synced_document_round_trips_section_data() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    let mut data = record_data("Alice", &["https://cdn/a.png"]);
    data.property_appraisal.gallery.push(GalleryItem {
        image: "https://cdn/b.png".to_string(),
        caption: "rear elevation".to_string(),
    });
    let record = store.create(data).await.unwrap();

    let manager = SyncManager::new(&store, &docs, &files);
    manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();

    // Reading the document back through its JSON-string section fields
    // reproduces the local form data exactly.
    let local = store.get(&record.local_id).await.unwrap().unwrap();
    let doc = docs.get(&local.remote_id.unwrap()).await.unwrap();
    assert_eq!(document_data(&doc), local.data);

    // Listing filters by the stamped user id.
    assert_eq!(docs.list(Some("user-1")).await.unwrap().len(), 1);
    assert!(docs.list(Some("someone-else")).await.unwrap().is_empty());
}

// ─── local store invariants ─────────────────────────────────────────

#[tokio::test]
async fn delete_clears_matching_last_viewed_pointer() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;

    let a = store.create(record_data("Alice", &[])).await.unwrap();
    let b = store.create(record_data("Bob", &[])).await.unwrap();

    store.set_last_viewed(&a.local_id, a.created_at).await.unwrap();

    // Deleting an unrelated record leaves the pointer alone.
    store.delete(&b.local_id).await.unwrap();
    assert_eq!(
        store.last_viewed().await.unwrap().unwrap().local_id,
        a.local_id
    );

    // Deleting the pointed-at record clears it.
    store.delete(&a.local_id).await.unwrap();
    assert!(store.last_viewed().await.unwrap().is_none());

    // Idempotent on repeat.
    store.delete(&a.local_id).await.unwrap();
}

#[tokio::test]
async fn update_with_identical_data_keeps_synced_flag() {
    let tmp = TempDir::new().unwrap();
    let store = test_store(&tmp).await;
    let docs = InMemoryDocumentStore::new();
    let files = InMemoryFileStore::new();

    let record = store.create(record_data("Alice", &[])).await.unwrap();
    let manager = SyncManager::new(&store, &docs, &files);
    manager
        .sync_pending("user-1", None, &NoProgress)
        .await
        .unwrap();

    // Writing back the exact same data is a no-op.
    let current = store.get(&record.local_id).await.unwrap().unwrap();
    store
        .update_data(&record.local_id, &current.data)
        .await
        .unwrap();
    assert!(store.get(&record.local_id).await.unwrap().unwrap().synced);
}

#[tokio::test]
async fn dry_run_requires_user_but_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("fieldval.sqlite"));
    migrate::run_migrations(&config).await.unwrap();

    let store = LocalRecordStore::new(db::connect(&config).await.unwrap());
    store.create(record_data("Alice", &[])).await.unwrap();
    store.pool().close().await;

    // No user id anywhere: dry-run still refuses up front.
    let err = sync::run_sync(
        &config,
        None,
        true,
        None,
        fieldval::progress::ProgressMode::Off,
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Not signed in"));

    // With a user, dry-run succeeds without a [remote] section at all.
    sync::run_sync(
        &config,
        Some("user-1".to_string()),
        true,
        None,
        fieldval::progress::ProgressMode::Off,
    )
    .await
    .unwrap();
}
