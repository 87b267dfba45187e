//! Wire and domain types for the analysis service.
//!
//! The status endpoint returns `{ status, analyzeResult?, error? }`. Only the
//! parts of `analyzeResult` the overlay needs are modelled here; unknown keys
//! are ignored so newer API versions keep deserialising.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One submitted analysis request, tracked by its opaque operation handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// URL returned in the `Operation-Location` header of the submit call.
    pub operation_handle: String,
    pub submitted_at: DateTime<Utc>,
}

impl AnalysisJob {
    pub fn new(operation_handle: impl Into<String>) -> Self {
        Self {
            operation_handle: operation_handle.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Status of a long-running analysis operation.
///
/// The service reports `notStarted` before the job is picked up; it is as
/// non-terminal as `running` and collapses into [`AnalysisStatus::Running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisStatus {
    #[serde(alias = "notStarted")]
    Running,
    Succeeded,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AnalysisStatus::Running)
    }
}

/// Body of a status poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze_result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

/// Diagnostic attached to a failed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Terminal payload of a successful analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Unit the page's width, height and polygons are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LengthUnit {
    Inch,
    Pixel,
    #[serde(other)]
    Unknown,
}

/// Coordinate space of every polygon on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based page number.
    #[serde(default = "first_page")]
    pub page_number: u32,
    pub width: f64,
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<LengthUnit>,
}

fn first_page() -> u32 {
    1
}

impl Page {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            page_number: 1,
            width,
            height,
            unit: None,
        }
    }
}

/// One extracted document: field name → field, in service order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub bounding_regions: Vec<Region>,
}

/// A quadrilateral locating a field on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// 1-based page number, as on the wire.
    pub page_number: u32,
    /// `[x1, y1, x2, y2, x3, y3, x4, y4]` in page units.
    pub polygon: Vec<f64>,
}

impl Region {
    /// 0-based index of the page this region lies on.
    pub fn page_index(&self) -> usize {
        (self.page_number as usize).saturating_sub(1)
    }
}
