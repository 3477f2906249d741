//! Core data models for field assessments.
//!
//! An [`AssessmentRecord`] is the unit of local storage and sync: a locally
//! generated id, a `synced` flag, and the multi-section form payload. Section
//! structs are deliberately tolerant (every field defaults) because records
//! arrive from partially filled forms and from remote documents whose section
//! fields are free-form JSON strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A locally stored assessment record.
///
/// `local_id` is assigned at creation and never changes. `remote_id` is
/// absent until the first successful sync, and `synced` is only ever set
/// true after a confirmed remote write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub local_id: String,
    pub remote_id: Option<String>,
    pub synced: bool,
    pub created_at: DateTime<Utc>,
    pub data: AssessmentData,
}

/// The eight named form sections of an assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentData {
    pub owner_details: OwnerDetails,
    pub building_location: BuildingLocation,
    pub land_reference: LandReference,
    pub general_description: GeneralDescription,
    pub structural_materials: StructuralMaterials,
    pub property_appraisal: PropertyAppraisal,
    pub property_assessment: PropertyAssessment,
    #[serde(rename = "additionalItems")]
    pub additional_items: AdditionalItems,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerDetails {
    pub owner: String,
    pub address: String,
    pub tin: String,
    pub telephone: String,
    pub administrator: String,
    pub admin_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingLocation {
    pub street: String,
    pub barangay: String,
    pub municipality: String,
    pub province: String,
    /// Image references: local file paths before sync, remote URLs after.
    #[serde(rename = "buildingImages")]
    pub building_images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandReference {
    pub owner: String,
    pub title_number: String,
    pub lot_number: String,
    pub block_number: String,
    pub survey_number: String,
    pub area: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralDescription {
    pub building_kind: String,
    pub structural_type: String,
    pub building_permit: String,
    pub date_constructed: String,
    pub date_occupied: String,
    pub building_age: String,
    pub number_of_storeys: String,
    pub floor_area: String,
    pub total_floor_area: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralMaterials {
    pub roof: Vec<String>,
    pub flooring: Vec<String>,
    pub walls: Vec<String>,
    pub foundation: Vec<String>,
    pub columns: Vec<String>,
    pub beams: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyAppraisal {
    pub unit_value: String,
    pub smv: String,
    pub depreciation_rate: String,
    pub depreciation_cost: String,
    pub market_value: String,
    pub gallery: Vec<GalleryItem>,
}

/// One appraisal gallery entry: an image reference plus a caption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryItem {
    pub image: String,
    pub caption: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyAssessment {
    pub actual_use: String,
    pub market_value: String,
    pub assessment_level: String,
    pub assessed_value: String,
    pub taxable: bool,
    pub effectivity_quarter: String,
    pub effectivity_year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalItems {
    pub items: Vec<AdditionalItem>,
    pub total: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalItem {
    pub label: String,
    pub value: String,
}

/// Outcome of one record's sync attempt within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSyncResult {
    pub local_id: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// The persisted "last viewed" pointer, stored as a single JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastViewed {
    pub local_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Parse a JSON section string, falling back to the default on any failure.
///
/// Remote documents carry sections as free-form JSON strings with no schema
/// enforcement; a malformed one must not take down rendering or sync.
pub fn parse_section_or_default<T: Default + for<'de> Deserialize<'de>>(raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Content hash over the serialized form data.
///
/// Used to detect whether an update actually changed anything and to reset
/// the `synced` flag only when it did.
pub fn content_hash(data: &AssessmentData) -> String {
    let json = serde_json::to_string(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
