//! Backend data model
//!
//! Wire shapes of the inventory-reconciliation service. The backend is the
//! source of truth for every type here: local code replaces these values
//! wholesale and never patches them field by field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{flexible, flexible_option};

/// Backend primary key of a scan session
pub type SessionId = i64;

/// Backend primary key of a scan record
pub type RecordId = i64;

/// Backend primary key of a bill of materials
pub type BomId = i64;

// ============================================================================
// Enumerations
// ============================================================================

/// Product category a BOM-mode session is scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "CCTV")]
    Cctv,
    #[serde(rename = "CX")]
    Cx,
    #[serde(rename = "FIRE & BURG ALARM")]
    FireAlarm,
    /// Category added on the backend after this build
    #[serde(other)]
    Unknown,
}

impl Category {
    /// Categories an operator can pick from
    pub const ALL: [Category; 3] = [Category::Cctv, Category::Cx, Category::FireAlarm];

    /// Wire value, also used as query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cctv => "CCTV",
            Category::Cx => "CX",
            Category::FireAlarm => "FIRE & BURG ALARM",
            Category::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CCTV" => Ok(Category::Cctv),
            "CX" => Ok(Category::Cx),
            "FIRE & BURG ALARM" | "FIRE" | "FIRE_ALARM" => Ok(Category::FireAlarm),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Scanning mode of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanMode {
    /// Free counting, no expected quantities
    Inventory,
    /// Reconciliation against an uploaded bill of materials
    Bom,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Inventory => f.pad("INVENTORY"),
            ScanMode::Bom => f.pad("BOM"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INVENTORY" => Ok(ScanMode::Inventory),
            "BOM" => Ok(ScanMode::Bom),
            other => Err(format!("unknown scan mode: {other}")),
        }
    }
}

/// Server-computed comparison of scanned against expected quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconciliationStatus {
    Match,
    Over,
    Under,
    /// Expected quantity not known yet
    Pending,
    /// Summary-only: counted without an expected quantity
    Counted,
}

impl ReconciliationStatus {
    /// Over and under counts are the statuses an operator may dispute
    pub fn is_discrepancy(&self) -> bool {
        matches!(self, ReconciliationStatus::Over | ReconciliationStatus::Under)
    }
}

// ============================================================================
// Sessions and records
// ============================================================================

/// A bounded scanning activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: SessionId,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub mode: ScanMode,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub bom_id: Option<BomId>,
    #[serde(default)]
    pub bom_name: Option<String>,
    #[serde(default)]
    pub bom_items_count: Option<i64>,
    #[serde(default)]
    pub scanned_items_count: Option<i64>,
    #[serde(with = "flexible")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "flexible_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Canonical server representation of one submitted scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: RecordId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Inventory article number
    #[serde(rename = "sap_article")]
    pub identifier: String,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub po_number: Option<String>,
    pub quantity: f64,
    #[serde(default, with = "flexible_option")]
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual_entry: bool,
    #[serde(default)]
    pub expected_quantity: Option<f64>,
    #[serde(default)]
    pub status: Option<ReconciliationStatus>,
    #[serde(default)]
    pub detected_category: Option<String>,
}

/// Partial record carried by `record_updated` events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub id: RecordId,
    #[serde(rename = "sap_article", default)]
    pub identifier: Option<String>,
    pub quantity: f64,
    #[serde(default)]
    pub status: Option<ReconciliationStatus>,
}

/// Uploaded bill of materials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bom {
    pub id: BomId,
    pub name: String,
    pub category: Category,
    #[serde(with = "flexible")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub items_count: i64,
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Requests
// ============================================================================

/// Scope for session discovery
///
/// `active_only` is evaluated by the backend; `mode` and `category` narrow
/// the returned list locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionFilter {
    pub active_only: bool,
    pub mode: Option<ScanMode>,
    pub category: Option<Category>,
}

impl SessionFilter {
    /// Active sessions of any mode or category
    pub fn active() -> Self {
        Self {
            active_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, session: &ScanSession) -> bool {
        if self.active_only && !session.is_active {
            return false;
        }
        if let Some(mode) = self.mode {
            if session.mode != mode {
                return false;
            }
        }
        if let Some(category) = self.category {
            if session.category != Some(category) {
                return false;
            }
        }
        true
    }
}

/// Parameters for creating a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSession {
    pub mode: ScanMode,
    pub category: Option<Category>,
    pub bom_id: Option<BomId>,
}

impl NewSession {
    pub fn inventory() -> Self {
        Self {
            mode: ScanMode::Inventory,
            category: None,
            bom_id: None,
        }
    }

    pub fn bom(category: Category, bom_id: BomId) -> Self {
        Self {
            mode: ScanMode::Bom,
            category: Some(category),
            bom_id: Some(bom_id),
        }
    }
}

/// Body of `POST /scan/records`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRecordRequest {
    pub session_id: SessionId,
    #[serde(rename = "sap_article")]
    pub identifier: String,
    pub po_number: Option<String>,
    pub quantity: f64,
    pub manual_entry: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_category: Option<String>,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

// ============================================================================
// Overview projection
// ============================================================================

/// Progress of one category across BOM and inventory sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Response of `GET /scan/overview`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub categories: Vec<CategoryOverview>,
    pub inventory: InventoryOverview,
}

impl Overview {
    /// Total number of active sessions across categories and inventory
    pub fn active_session_count(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.active_sessions.len())
            .sum::<usize>()
            + self.inventory.active_sessions.len()
    }

    /// Find an active session anywhere in the overview
    pub fn find_active_session(&self, id: SessionId) -> Option<&ActiveSessionStats> {
        self.categories
            .iter()
            .flat_map(|c| c.active_sessions.iter())
            .chain(self.inventory.active_sessions.iter())
            .find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOverview {
    pub category: Category,
    pub status: CategoryStatus,
    #[serde(default)]
    pub bom: Option<BomInfo>,
    #[serde(default)]
    pub active_sessions: Vec<ActiveSessionStats>,
    #[serde(default)]
    pub last_session: Option<LastSession>,
    #[serde(default)]
    pub progress: Option<Progress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryOverview {
    pub status: CategoryStatus,
    #[serde(default)]
    pub active_sessions: Vec<ActiveSessionStats>,
    #[serde(default)]
    pub last_session: Option<LastSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomInfo {
    pub id: BomId,
    pub name: String,
    #[serde(default)]
    pub items_count: i64,
    #[serde(default, with = "flexible_option")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSessionStats {
    pub id: SessionId,
    pub mode: ScanMode,
    #[serde(with = "flexible")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub bom_name: Option<String>,
    #[serde(default)]
    pub scanned_items: i64,
    #[serde(default)]
    pub expected_items: Option<i64>,
    #[serde(default)]
    pub match_count: i64,
    #[serde(default)]
    pub over_count: i64,
    #[serde(default)]
    pub under_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSession {
    pub id: SessionId,
    pub mode: ScanMode,
    #[serde(with = "flexible")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "flexible_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub scanned_items: i64,
    #[serde(default)]
    pub expected_items: Option<i64>,
    #[serde(default)]
    pub match_count: i64,
    #[serde(default)]
    pub over_count: i64,
    #[serde(default)]
    pub under_count: i64,
}

// ============================================================================
// Session detail projections
// ============================================================================

/// Response of `GET /scan/sessions/{id}/summary` (reconciliation view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: ScanSession,
    pub items: Vec<SummaryItem>,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub match_count: i64,
    #[serde(default)]
    pub over_count: i64,
    #[serde(default)]
    pub under_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryItem {
    #[serde(default)]
    pub record_id: Option<RecordId>,
    #[serde(rename = "sap_article")]
    pub identifier: String,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub scanned_quantity: f64,
    pub status: ReconciliationStatus,
    #[serde(default)]
    pub detected_category: Option<String>,
    #[serde(default)]
    pub expected_quantity: Option<f64>,
    #[serde(default)]
    pub difference: Option<f64>,
}

/// Response of `GET /scan/sessions/{id}/inventory-summary` (counting view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub session: InventorySessionInfo,
    pub summary: InventoryTotals,
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySessionInfo {
    pub id: SessionId,
    pub mode: ScanMode,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(with = "flexible")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "flexible_option")]
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTotals {
    pub total_unique_items: i64,
    pub total_scans: i64,
    pub total_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "sap_article")]
    pub identifier: String,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub detected_category: Option<String>,
    pub total_quantity: f64,
    pub scan_count: i64,
    #[serde(default, with = "flexible_option")]
    pub first_scan: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_option")]
    pub last_scan: Option<DateTime<Utc>>,
}

/// Detail view of one selected session, shaped by its mode
#[derive(Debug, Clone, PartialEq)]
pub enum SessionDetail {
    Reconciliation(SessionSummary),
    Inventory(InventorySummary),
}

impl SessionDetail {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionDetail::Reconciliation(s) => s.session.id,
            SessionDetail::Inventory(s) => s.session.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_with_naive_timestamp() {
        let session: ScanSession = serde_json::from_value(json!({
            "id": 7,
            "user_id": 1,
            "mode": "BOM",
            "category": "FIRE & BURG ALARM",
            "bom_id": 3,
            "bom_name": "Tower B",
            "started_at": "2024-03-01T09:15:00",
            "ended_at": null,
            "is_active": true
        }))
        .unwrap();

        assert_eq!(session.mode, ScanMode::Bom);
        assert_eq!(session.category, Some(Category::FireAlarm));
        assert!(session.ended_at.is_none());
        assert_eq!(session.started_at.to_rfc3339(), "2024-03-01T09:15:00+00:00");
    }

    #[test]
    fn test_unknown_category_tolerated() {
        let cat: Category = serde_json::from_value(json!("ACCESS CONTROL")).unwrap();
        assert_eq!(cat, Category::Unknown);
    }

    #[test]
    fn test_record_identifier_uses_wire_name() {
        let record: ScanRecord = serde_json::from_value(json!({
            "id": 42,
            "sap_article": "8765432109",
            "quantity": 2.0,
            "status": "OVER",
            "expected_quantity": 1.0
        }))
        .unwrap();

        assert_eq!(record.identifier, "8765432109");
        assert_eq!(record.status, Some(ReconciliationStatus::Over));
        assert!(!record.manual_entry);
        assert!(record.scanned_at.is_none());
    }

    #[test]
    fn test_create_record_request_wire_shape() {
        let req = CreateRecordRequest {
            session_id: 5,
            identifier: "1234567890".into(),
            po_number: None,
            quantity: 3.0,
            manual_entry: false,
            detected_category: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["sap_article"], "1234567890");
        assert_eq!(value["po_number"], serde_json::Value::Null);
        assert!(value.get("detected_category").is_none());
    }

    #[test]
    fn test_discrepancy_statuses() {
        assert!(ReconciliationStatus::Over.is_discrepancy());
        assert!(ReconciliationStatus::Under.is_discrepancy());
        assert!(!ReconciliationStatus::Match.is_discrepancy());
        assert!(!ReconciliationStatus::Pending.is_discrepancy());
        assert!(!ReconciliationStatus::Counted.is_discrepancy());
    }

    #[test]
    fn test_filter_narrows_by_mode_and_category() {
        let session: ScanSession = serde_json::from_value(json!({
            "id": 1, "mode": "BOM", "category": "CCTV",
            "started_at": "2024-03-01T09:15:00", "is_active": true
        }))
        .unwrap();

        assert!(SessionFilter::active().matches(&session));
        let by_cat = SessionFilter { category: Some(Category::Cx), ..SessionFilter::active() };
        assert!(!by_cat.matches(&session));
        let by_mode = SessionFilter { mode: Some(ScanMode::Inventory), ..SessionFilter::default() };
        assert!(!by_mode.matches(&session));
    }

    #[test]
    fn test_overview_counts_active_sessions() {
        let overview: Overview = serde_json::from_value(json!({
            "categories": [{
                "category": "CCTV",
                "status": "in_progress",
                "active_sessions": [{
                    "id": 4, "mode": "BOM", "started_at": "2024-03-01T09:15:00",
                    "scanned_items": 3, "expected_items": 10,
                    "match_count": 1, "over_count": 1, "under_count": 1
                }],
                "progress": {"scanned_items": 3, "expected_items": 10,
                             "match_count": 1, "over_count": 1, "under_count": 1}
            }],
            "inventory": {"status": "not_started", "active_sessions": [], "last_session": null}
        }))
        .unwrap();

        assert_eq!(overview.active_session_count(), 1);
        assert_eq!(overview.find_active_session(4).map(|s| s.scanned_items), Some(3));
        assert!(overview.find_active_session(5).is_none());
    }
}
