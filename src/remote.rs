//! Remote backend adapters: document store and file bucket.
//!
//! The sync pipeline only ever sees the [`DocumentStore`] and [`FileStore`]
//! traits, keeping it free of backend-specific types. [`HttpBackend`] is the
//! production adapter, speaking a REST document API; the in-memory
//! implementations back the test suite.
//!
//! # Wire format
//!
//! Each form section travels as a JSON-serialized string field inside the
//! document (`owner_details`, `building_location`, ...). No schema is
//! enforced at this boundary; readers parse each string back with tolerant
//! defaults.
//!
//! # Retry strategy
//!
//! The HTTP adapter retries transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors → retry
//! - HTTP 401/403 → fail immediately as an authentication error
//! - Other 4xx → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{RemoteConfig, SyncConfig};
use crate::models::{parse_section_or_default, AssessmentData};

/// One synced assessment document as stored remotely.
///
/// Section fields are JSON strings; `data` holds the raw document body so
/// callers can pull sections out with tolerant parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub remote_id: String,
    pub created_at: String,
    pub data: Value,
}

/// The document payload written on sync. Every section is serialized to a
/// string before it goes on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub local_id: String,
    pub user_id: String,
    pub created_at: String,
    pub synced_at: String,
    pub owner_details: String,
    pub building_location: String,
    pub land_reference: String,
    pub general_description: String,
    pub structural_materials: String,
    pub property_appraisal: String,
    pub property_assessment: String,
    #[serde(rename = "additionalItems")]
    pub additional_items: String,
}

/// Reassemble form data from a document's JSON-string section fields.
///
/// Sections parse tolerantly: a malformed or missing string yields that
/// section's default rather than an error, so one bad field never takes
/// down a remote listing.
pub fn document_data(doc: &RemoteDocument) -> AssessmentData {
    let section = |key: &str| doc.data.get(key).and_then(|v| v.as_str()).unwrap_or("");

    AssessmentData {
        owner_details: parse_section_or_default(section("owner_details")),
        building_location: parse_section_or_default(section("building_location")),
        land_reference: parse_section_or_default(section("land_reference")),
        general_description: parse_section_or_default(section("general_description")),
        structural_materials: parse_section_or_default(section("structural_materials")),
        property_appraisal: parse_section_or_default(section("property_appraisal")),
        property_assessment: parse_section_or_default(section("property_assessment")),
        additional_items: parse_section_or_default(section("additionalItems")),
    }
}

/// Remote document store: CRUD keyed by remote id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document, returning its remote id and creation time.
    async fn create(&self, payload: &DocumentPayload) -> Result<RemoteDocument>;

    /// Replace an existing document's payload.
    async fn update(&self, remote_id: &str, payload: &DocumentPayload) -> Result<RemoteDocument>;

    async fn get(&self, remote_id: &str) -> Result<RemoteDocument>;

    /// List documents, optionally filtered to one user's.
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RemoteDocument>>;
}

/// Image upload service: accepts a local file, returns a public URL.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, local_path: &str) -> Result<String>;
}

// ─── HTTP adapter ───────────────────────────────────────────────────

/// Production adapter for a REST document backend.
pub struct HttpBackend {
    client: reqwest::Client,
    remote: RemoteConfig,
    api_key: String,
    max_retries: u32,
}

impl HttpBackend {
    /// Build the adapter, reading the API key from the configured
    /// environment variable.
    ///
    /// A missing key is an authentication error and is raised here, before
    /// any record is attempted.
    pub fn new(remote: &RemoteConfig, sync: &SyncConfig) -> Result<Self> {
        let api_key = std::env::var(&remote.api_key_env).map_err(|_| {
            anyhow::anyhow!(
                "Not signed in: {} environment variable not set",
                remote.api_key_env
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(sync.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            remote: remote.clone(),
            api_key,
            max_retries: sync.max_retries,
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.remote.endpoint, self.remote.database_id, self.remote.collection_id
        )
    }

    fn files_url(&self) -> String {
        format!(
            "{}/storage/buckets/{}/files",
            self.remote.endpoint, self.remote.bucket_id
        )
    }

    /// Public view URL for an uploaded file.
    fn file_view_url(&self, file_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.remote.endpoint, self.remote.bucket_id, file_id, self.remote.project
        )
    }

    /// Send a request built by `make_request`, retrying transient failures.
    ///
    /// The request is rebuilt on every attempt because bodies (multipart in
    /// particular) cannot be cloned.
    async fn send_with_retry<F>(&self, make_request: F) -> Result<Value>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = make_request(&self.client)
                .header("X-Project", &self.remote.project)
                .header("X-Key", &self.api_key)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .context("Invalid JSON in backend response");
                    }

                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        let body_text = response.text().await.unwrap_or_default();
                        bail!("Authentication failed ({}): {}", status, body_text);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Backend error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Backend error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn parse_document(json: Value) -> Result<RemoteDocument> {
    let remote_id = json
        .get("$id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Backend response missing $id"))?
        .to_string();
    let created_at = json
        .get("$createdAt")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Ok(RemoteDocument {
        remote_id,
        created_at,
        data: json,
    })
}

#[async_trait]
impl DocumentStore for HttpBackend {
    async fn create(&self, payload: &DocumentPayload) -> Result<RemoteDocument> {
        let url = self.documents_url();
        let body = serde_json::json!({
            "documentId": "unique()",
            "data": payload,
        });

        let json = self
            .send_with_retry(move |client| client.post(&url).json(&body))
            .await?;
        parse_document(json)
    }

    async fn update(&self, remote_id: &str, payload: &DocumentPayload) -> Result<RemoteDocument> {
        let url = format!("{}/{}", self.documents_url(), remote_id);
        let body = serde_json::json!({ "data": payload });

        let json = self
            .send_with_retry(move |client| client.patch(&url).json(&body))
            .await?;
        parse_document(json)
    }

    async fn get(&self, remote_id: &str) -> Result<RemoteDocument> {
        let url = format!("{}/{}", self.documents_url(), remote_id);

        let json = self.send_with_retry(move |client| client.get(&url)).await?;
        parse_document(json)
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RemoteDocument>> {
        let url = self.documents_url();
        let filter = user_id.map(|u| u.to_string());

        let json = self
            .send_with_retry(move |client| {
                let mut req = client.get(&url);
                if let Some(u) = &filter {
                    req = req.query(&[("user_id", u)]);
                }
                req
            })
            .await?;

        let documents = json
            .get("documents")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow::anyhow!("Backend response missing documents array"))?;

        documents
            .iter()
            .cloned()
            .map(parse_document)
            .collect::<Result<Vec<_>>>()
    }
}

#[async_trait]
impl FileStore for HttpBackend {
    async fn upload(&self, local_path: &str) -> Result<String> {
        // Strip a file:// scheme if present; field capture apps record
        // image references that way.
        let path_str = local_path.strip_prefix("file://").unwrap_or(local_path);
        let path = Path::new(path_str);

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let file_id = Uuid::new_v4().to_string();
        let url = self.files_url();

        let json = self
            .send_with_retry(move |client| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .text("fileId", file_id.clone())
                    .part("file", part);
                client.post(&url).multipart(form)
            })
            .await?;

        let id = json
            .get("$id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Upload response missing $id"))?;

        Ok(self.file_view_url(id))
    }
}

// ─── In-memory implementations ──────────────────────────────────────

/// In-memory document store for tests.
pub struct InMemoryDocumentStore {
    docs: RwLock<HashMap<String, RemoteDocument>>,
    fail_on: RwLock<Option<String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            fail_on: RwLock::new(None),
        }
    }

    /// Fail writes whose serialized payload contains this substring.
    /// An empty needle fails every write.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.write().unwrap() = Some(needle.to_string());
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().unwrap().is_empty()
    }

    fn check_failure(&self, payload: &DocumentPayload) -> Result<()> {
        if let Some(needle) = self.fail_on.read().unwrap().as_ref() {
            let json = serde_json::to_string(payload)?;
            if json.contains(needle.as_str()) {
                bail!("Remote write failed");
            }
        }
        Ok(())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, payload: &DocumentPayload) -> Result<RemoteDocument> {
        self.check_failure(payload)?;
        let doc = RemoteDocument {
            remote_id: Uuid::new_v4().to_string(),
            created_at: Utc::now().to_rfc3339(),
            data: serde_json::to_value(payload)?,
        };
        self.docs
            .write()
            .unwrap()
            .insert(doc.remote_id.clone(), doc.clone());
        Ok(doc)
    }

    async fn update(&self, remote_id: &str, payload: &DocumentPayload) -> Result<RemoteDocument> {
        self.check_failure(payload)?;
        let mut docs = self.docs.write().unwrap();
        let doc = docs
            .get_mut(remote_id)
            .ok_or_else(|| anyhow::anyhow!("Document not found: {}", remote_id))?;
        doc.data = serde_json::to_value(payload)?;
        Ok(doc.clone())
    }

    async fn get(&self, remote_id: &str) -> Result<RemoteDocument> {
        self.docs
            .read()
            .unwrap()
            .get(remote_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Document not found: {}", remote_id))
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RemoteDocument>> {
        let docs = self.docs.read().unwrap();
        let mut all: Vec<RemoteDocument> = docs
            .values()
            .filter(|d| match user_id {
                Some(u) => d.data.get("user_id").and_then(|v| v.as_str()) == Some(u),
                None => true,
            })
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

/// In-memory file store for tests: "uploads" a path to a fake URL.
pub struct InMemoryFileStore {
    uploaded: RwLock<Vec<String>>,
    fail_on: RwLock<Option<String>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self {
            uploaded: RwLock::new(Vec::new()),
            fail_on: RwLock::new(None),
        }
    }

    /// Fail uploads whose path contains this substring.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.write().unwrap() = Some(needle.to_string());
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.read().unwrap().clone()
    }
}

impl Default for InMemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload(&self, local_path: &str) -> Result<String> {
        if let Some(needle) = self.fail_on.read().unwrap().as_ref() {
            if local_path.contains(needle.as_str()) {
                bail!("Upload failed: {}", local_path);
            }
        }
        self.uploaded.write().unwrap().push(local_path.to_string());
        let name = local_path.rsplit('/').next().unwrap_or(local_path);
        Ok(format!("https://files.example.com/view/{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OwnerDetails;

    #[test]
    fn document_data_defaults_malformed_sections() {
        let doc = RemoteDocument {
            remote_id: "r1".to_string(),
            created_at: "2026-08-29T00:00:00Z".to_string(),
            data: serde_json::json!({
                "owner_details": "{broken",
                "building_location":
                    r#"{"street":"Rizal St","buildingImages":["https://cdn/a.png"]}"#,
            }),
        };

        let data = document_data(&doc);
        assert_eq!(data.owner_details, OwnerDetails::default());
        assert_eq!(data.building_location.street, "Rizal St");
        assert_eq!(
            data.building_location.building_images,
            vec!["https://cdn/a.png"]
        );
        // Missing sections read as defaults too
        assert!(data.property_appraisal.gallery.is_empty());
    }
}
